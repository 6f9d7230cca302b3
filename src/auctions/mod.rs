//! Auction house queries.
//!
//! [`AuctionFetchOptions`] is the permissive input accepted by
//! [`Client::fetch_auctions`](crate::Client::fetch_auctions); it becomes an [`AuctionsRequest`]
//! with defaults filled and unknown filter values dropped. The matching `Auctions` response is
//! turned into [`AuctionListing`]s with their item payloads decoded.

pub mod types;

pub use types::request::{
    AuctionCategory, AuctionFetchOptions, AuctionFilter, AuctionSortOrder, AuctionType,
    AuctionsRequest, FilterKind, ItemRarity,
};
pub use types::response::{Auction, AuctionListing, AuctionsResponse, decode_item_bytes};

use crate::Result;
use crate::error::Error;
use crate::types::Response;

/// Turns the awaited response of an auction query into decoded listings.
///
/// An absent response, a response of another type, or a response without listings is an error.
pub(crate) fn into_listings(response: Option<Response>) -> Result<Vec<AuctionListing>> {
    let Some(response) = response else {
        return Err(Error::query("no auctions response received"));
    };

    let auctions = response
        .into_auctions()
        .and_then(|body| body.auctions)
        .filter(|auctions| !auctions.is_empty())
        .ok_or_else(|| Error::query("no auctions returned"))?;

    auctions.into_iter().map(Auction::decode).collect()
}
