#![allow(
    clippy::unwrap_used,
    clippy::missing_panics_doc,
    reason = "Do not need additional syntax for setting up tests"
)]

mod common;

use std::io::Write as _;
use std::time::Duration;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use flate2::Compression;
use flate2::write::GzEncoder;
use serde_json::{Value, json};
use skyblock_client_sdk::auctions::AuctionFetchOptions;
use skyblock_client_sdk::error::Kind;
use skyblock_client_sdk::ws::DebugLevel;
use tokio::time::timeout;

use crate::common::{MockWsServer, WAIT, client, frames};

fn item_bytes(item: &Value) -> String {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(serde_json::to_string(item).unwrap().as_bytes())
        .unwrap();
    STANDARD.encode(encoder.finish().unwrap())
}

fn listing(item: &Value) -> Value {
    json!({
        "uuid": "409a1e0f261a49849493278d6cd9305a",
        "auctioneer": "0f1b7c3e2e634d3a9a552b7d1c5c8f10",
        "itemName": "Hyperion",
        "tier": "LEGENDARY",
        "category": "weapon",
        "startingBid": 850_000_000_u64,
        "highestBidAmount": 0,
        "bin": true,
        "start": 1_700_000_000_000_i64,
        "end": 1_700_086_400_000_i64,
        "itemBytes": item_bytes(item)
    })
}

#[tokio::test]
async fn fetch_sends_normalized_request_and_decodes_items() {
    let mut server = MockWsServer::start().await;
    let client = client(&server);
    client.connect().await.unwrap();
    server.next_frame_with_id(0).await.unwrap();

    let options = AuctionFetchOptions::builder()
        .query("hyperion".to_owned())
        .order("high_price".to_owned())
        .amount(10)
        .rarity("very special".to_owned())
        .auction_type("BIN".to_owned())
        .category("not-a-category".to_owned())
        .build();

    let fetch = tokio::spawn({
        let client = client.clone();
        async move { client.fetch_auctions(options).await }
    });

    let request = server.next_frame_with_id(2).await.unwrap();
    assert_eq!(
        request["data"],
        json!({
            "query": "hyperion",
            "order": "high_price",
            "start": 0,
            "amount": 10,
            "filters": [
                { "type": "rarity", "value": "VERY_SPECIAL" },
                { "type": "type", "value": "bin" }
            ]
        })
    );

    let item = json!({ "id": "HYPERION", "count": 1, "tag": { "modifier": "heroic" } });
    server.send(frames::auctions(json!([listing(&item)])));

    let listings = timeout(WAIT, fetch).await.unwrap().unwrap().unwrap();

    assert_eq!(listings.len(), 1);
    let hyperion = &listings[0];
    assert_eq!(hyperion.item_name, "Hyperion");
    assert_eq!(hyperion.starting_bid, 850_000_000);
    assert!(hyperion.bin);
    assert_eq!(hyperion.end.timestamp_millis(), 1_700_086_400_000);
    assert_eq!(hyperion.item, item);
}

#[tokio::test]
async fn loose_options_fall_back_to_defaults() {
    let mut server = MockWsServer::start().await;
    let client = client(&server);
    client.connect().await.unwrap();
    server.next_frame_with_id(0).await.unwrap();

    let options = AuctionFetchOptions::from_value(&json!({
        "query": 42,
        "order": "cheapest",
        "start": "ten",
        "rarity": "not-a-rarity",
        "type": "auction"
    }));

    let fetch = tokio::spawn({
        let client = client.clone();
        async move { client.fetch_auctions(options).await }
    });

    let request = server.next_frame_with_id(2).await.unwrap();
    assert_eq!(
        request["data"],
        json!({
            "query": "",
            "order": "random",
            "start": 0,
            "amount": 100,
            "filters": [{ "type": "type", "value": "auction" }]
        })
    );

    server.send(frames::auctions(json!([listing(&json!({}))])));
    assert_eq!(timeout(WAIT, fetch).await.unwrap().unwrap().unwrap().len(), 1);
}

#[tokio::test]
async fn empty_response_is_a_query_error() {
    let mut server = MockWsServer::start().await;
    let client = client(&server);
    let mut debug = client.subscribe_debug();
    client.connect().await.unwrap();
    server.next_frame_with_id(0).await.unwrap();

    let fetch = tokio::spawn({
        let client = client.clone();
        async move { client.fetch_auctions(AuctionFetchOptions::default()).await }
    });

    server.next_frame_with_id(2).await.unwrap();
    server.send(json!({ "id": 2, "data": {} }));

    let err = timeout(WAIT, fetch).await.unwrap().unwrap().unwrap_err();
    assert_eq!(err.kind(), Kind::Query);

    let reported = std::iter::from_fn(|| debug.try_recv().ok())
        .any(|event| event.level == DebugLevel::Error && event.message.contains("query failed"));
    assert!(reported, "query failure should be reported before it propagates");
}

#[tokio::test]
async fn missing_response_times_out_as_query_error() {
    let mut server = MockWsServer::start().await;
    let client = client(&server);
    client.connect().await.unwrap();
    server.next_frame_with_id(0).await.unwrap();

    let err = client
        .fetch_auctions_with_timeout(
            AuctionFetchOptions::default(),
            Some(Duration::from_millis(50)),
        )
        .await
        .unwrap_err();

    assert_eq!(err.kind(), Kind::Query);
}

#[tokio::test]
async fn corrupt_item_bytes_fail_decoding() {
    let mut server = MockWsServer::start().await;
    let client = client(&server);
    client.connect().await.unwrap();
    server.next_frame_with_id(0).await.unwrap();

    let fetch = tokio::spawn({
        let client = client.clone();
        async move { client.fetch_auctions(AuctionFetchOptions::default()).await }
    });

    server.next_frame_with_id(2).await.unwrap();
    let mut broken = listing(&json!({}));
    broken["itemBytes"] = json!("not base64!");
    server.send(frames::auctions(json!([broken])));

    let err = timeout(WAIT, fetch).await.unwrap().unwrap().unwrap_err();
    assert_eq!(err.kind(), Kind::Codec);
}
