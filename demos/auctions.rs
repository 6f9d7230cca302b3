//! Auction query example: connects, waits for a session, and lists matching auctions.
//!
//! Run with tracing enabled:
//! ```sh
//! PLAYER_UUID=... PLAYER_NAME=... HYPIXEL_API_KEY=... RUST_LOG=info,rustls=off cargo run --example auctions --features tracing
//! ```
//!
//! Optionally log to a file:
//! ```sh
//! LOG_FILE=auctions.log RUST_LOG=debug cargo run --example auctions --features tracing
//! ```

use std::env;
use std::fs::File;
use std::time::Duration;

use skyblock_client_sdk::Client;
use skyblock_client_sdk::auctions::AuctionFetchOptions;
use skyblock_client_sdk::ws::config::Config;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Ok(path) = env::var("LOG_FILE") {
        let file = File::create(path)?;
        tracing_subscriber::registry()
            .with(EnvFilter::from_default_env())
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(file)
                    .with_ansi(false),
            )
            .init();
    } else {
        tracing_subscriber::fmt::init();
    }

    let client = Client::new(
        &env::var("PLAYER_UUID")?,
        &env::var("PLAYER_NAME")?,
        &env::var("HYPIXEL_API_KEY")?,
        Config::default(),
    )?;

    client.connect().await?;
    client.ready().await?;
    info!(session = ?client.session(), "session established");

    let options = AuctionFetchOptions::builder()
        .query("Hyperion".to_owned())
        .order("low_price".to_owned())
        .amount(20)
        .rarity("legendary".to_owned())
        .auction_type("bin".to_owned())
        .build();

    match client
        .fetch_auctions_with_timeout(options, Some(Duration::from_secs(30)))
        .await
    {
        Ok(listings) => {
            info!(count = listings.len(), "auctions");
            for listing in &listings {
                info!(
                    name = %listing.item_name,
                    price = listing.starting_bid,
                    ends = %listing.end,
                    item = %listing.item
                );
            }
        }
        Err(e) => warn!(error = %e, "auction query failed"),
    }

    client.close();
    client.wait_closed().await?;

    Ok(())
}
