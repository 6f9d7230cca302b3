use std::io::Read as _;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use flate2::read::GzDecoder;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::Result;

/// Body of an `Auctions` response.
///
/// `auctions` is absent when the server has nothing to report for the query.
#[non_exhaustive]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuctionsResponse {
    #[serde(default)]
    pub auctions: Option<Vec<Auction>>,
}

impl AuctionsResponse {
    #[must_use]
    pub fn new(auctions: Option<Vec<Auction>>) -> Self {
        Self { auctions }
    }
}

/// An auction listing as it appears on the wire, with its item still encoded.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Auction {
    pub uuid: String,
    /// UUID of the seller
    pub auctioneer: String,
    pub item_name: String,
    #[serde(default)]
    pub tier: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    pub starting_bid: u64,
    #[serde(default)]
    pub highest_bid_amount: u64,
    #[serde(default)]
    pub bin: bool,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub start: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub end: DateTime<Utc>,
    /// Base64 of the gzip-compressed item description
    pub item_bytes: String,
}

impl Auction {
    /// Decodes [`Auction::item_bytes`] and returns the listing with its structured item.
    pub fn decode(self) -> Result<AuctionListing> {
        let item = decode_item_bytes(&self.item_bytes)?;

        Ok(AuctionListing {
            uuid: self.uuid,
            auctioneer: self.auctioneer,
            item_name: self.item_name,
            tier: self.tier,
            category: self.category,
            starting_bid: self.starting_bid,
            highest_bid_amount: self.highest_bid_amount,
            bin: self.bin,
            start: self.start,
            end: self.end,
            item,
        })
    }
}

/// An auction listing with its item description decoded.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuctionListing {
    pub uuid: String,
    pub auctioneer: String,
    pub item_name: String,
    pub tier: Option<String>,
    pub category: Option<String>,
    pub starting_bid: u64,
    pub highest_bid_amount: u64,
    pub bin: bool,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub item: Value,
}

/// Decodes a base64, gzip-compressed JSON item description.
pub fn decode_item_bytes(encoded: &str) -> Result<Value> {
    let compressed = STANDARD.decode(encoded.trim())?;

    let mut json = Vec::new();
    GzDecoder::new(compressed.as_slice()).read_to_end(&mut json)?;

    Ok(serde_json::from_slice(&json)?)
}

#[cfg(test)]
mod tests {
    use std::io::Write as _;

    use flate2::Compression;
    use flate2::write::GzEncoder;
    use serde_json::json;

    use super::*;
    use crate::error::Kind;

    fn encode_item(item: &Value) -> String {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(item.to_string().as_bytes()).unwrap();
        STANDARD.encode(encoder.finish().unwrap())
    }

    #[test]
    fn decode_item_bytes_should_succeed() {
        let item = json!({ "id": "HYPERION", "count": 1, "enchantments": { "ultimate_wise": 5 } });

        assert_eq!(decode_item_bytes(&encode_item(&item)).unwrap(), item);
    }

    #[test]
    fn decode_item_bytes_rejects_plain_base64() {
        let err = decode_item_bytes(&STANDARD.encode(b"{}")).unwrap_err();

        assert_eq!(err.kind(), Kind::Codec);
    }

    #[test]
    fn auction_decode_keeps_listing_fields() {
        let item = json!({ "id": "ASPECT_OF_THE_END" });
        let auction: Auction = serde_json::from_value(json!({
            "uuid": "409a1e0f261a49849493278d6cd9305a",
            "auctioneer": "347ef6c1daac45ed9d1fa02818cf0fb6",
            "itemName": "Aspect of the End",
            "tier": "RARE",
            "startingBid": 100_000,
            "bin": true,
            "start": 1_700_000_000_000_i64,
            "end": 1_700_086_400_000_i64,
            "itemBytes": encode_item(&item),
        }))
        .unwrap();

        let listing = auction.decode().unwrap();

        assert_eq!(listing.item_name, "Aspect of the End");
        assert_eq!(listing.highest_bid_amount, 0);
        assert!(listing.bin, "listing should be buy-it-now");
        assert_eq!(listing.start.timestamp_millis(), 1_700_000_000_000);
        assert_eq!(listing.item, item);
    }

    #[test]
    fn missing_auctions_field_deserializes_to_none() {
        let response: AuctionsResponse = serde_json::from_value(json!({})).unwrap();

        assert_eq!(response.auctions, None);
    }
}
