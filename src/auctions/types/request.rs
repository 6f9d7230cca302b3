use std::str::FromStr as _;

use bon::Builder;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Default number of listings requested per page.
pub const DEFAULT_AMOUNT: u64 = 100;

/// Sort order applied by the server to auction results.
#[non_exhaustive]
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum_macros::Display,
    strum_macros::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AuctionSortOrder {
    HighPrice,
    LowPrice,
    EndNear,
    EndFar,
    #[default]
    Random,
}

/// Auction house category.
#[non_exhaustive]
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum_macros::Display,
    strum_macros::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum AuctionCategory {
    Weapon,
    Armor,
    Accessories,
    Consumables,
    Blocks,
    Misc,
}

/// Item rarity tier.
#[non_exhaustive]
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum_macros::Display,
    strum_macros::EnumString,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ItemRarity {
    Common,
    Uncommon,
    Rare,
    Epic,
    Legendary,
    Mythic,
    Divine,
    Special,
    VerySpecial,
}

/// Auction format: timed auction, buy-it-now, or either.
#[non_exhaustive]
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum_macros::Display,
    strum_macros::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum AuctionType {
    Any,
    Auction,
    Bin,
}

/// Which field an [`AuctionFilter`] constrains.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterKind {
    Category,
    Rarity,
    Type,
}

/// A single `{type, value}` filter entry of an [`AuctionsRequest`].
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuctionFilter {
    #[serde(rename = "type")]
    pub kind: FilterKind,
    pub value: String,
}

impl AuctionFilter {
    #[must_use]
    pub fn new(kind: FilterKind, value: String) -> Self {
        Self { kind, value }
    }
}

/// Partial, loosely validated auction query options.
///
/// Every field is optional. Turning the options into an [`AuctionsRequest`] fills defaults and
/// normalizes the filters: a filter whose value is not a known member of its enumeration is
/// dropped rather than rejected.
///
/// # Example
///
/// ```
/// use skyblock_client_sdk::auctions::{AuctionFetchOptions, AuctionsRequest};
///
/// let options = AuctionFetchOptions::builder()
///     .query("hyperion".to_owned())
///     .rarity("legendary".to_owned())
///     .build();
/// let request = AuctionsRequest::from(options);
///
/// assert_eq!(request.amount, 100);
/// assert_eq!(request.filters.len(), 1);
/// ```
#[non_exhaustive]
#[derive(Debug, Clone, Default, PartialEq, Eq, Builder)]
pub struct AuctionFetchOptions {
    /// Free-text search query
    pub query: Option<String>,
    /// Sort order name, e.g. `high_price`
    pub order: Option<String>,
    /// Index of the first listing to return
    pub start: Option<u64>,
    /// Number of listings to return
    pub amount: Option<u64>,
    /// Auction house category, e.g. `Weapon`
    pub category: Option<String>,
    /// Item rarity, e.g. `very special`
    pub rarity: Option<String>,
    /// Auction type, e.g. `BIN`
    pub auction_type: Option<String>,
}

impl AuctionFetchOptions {
    /// Reads options from an untyped JSON object.
    ///
    /// Values of the wrong JSON type are treated as absent, so `{"start": "ten"}` yields the
    /// default start index rather than an error. `start` and `amount` only accept
    /// non-negative integers: `5.0` or `-1` also fall back to the defaults.
    #[must_use]
    pub fn from_value(value: &Value) -> Self {
        let string = |key: &str| value.get(key).and_then(Value::as_str).map(str::to_owned);
        let number = |key: &str| value.get(key).and_then(Value::as_u64);

        Self {
            query: string("query"),
            order: string("order"),
            start: number("start"),
            amount: number("amount"),
            category: string("category"),
            rarity: string("rarity"),
            auction_type: string("type"),
        }
    }
}

/// A fully formed auction query, as sent to the server.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuctionsRequest {
    pub query: String,
    pub order: AuctionSortOrder,
    pub start: u64,
    pub amount: u64,
    pub filters: Vec<AuctionFilter>,
}

impl Default for AuctionsRequest {
    fn default() -> Self {
        Self {
            query: String::new(),
            order: AuctionSortOrder::default(),
            start: 0,
            amount: DEFAULT_AMOUNT,
            filters: Vec::new(),
        }
    }
}

impl From<AuctionFetchOptions> for AuctionsRequest {
    fn from(options: AuctionFetchOptions) -> Self {
        let mut filters = Vec::new();

        if let Some(category) = options.category.as_deref().and_then(normalize_category) {
            filters.push(AuctionFilter::new(FilterKind::Category, category.to_string()));
        }
        if let Some(rarity) = options.rarity.as_deref().and_then(normalize_rarity) {
            filters.push(AuctionFilter::new(FilterKind::Rarity, rarity.to_string()));
        }
        if let Some(kind) = options.auction_type.as_deref().and_then(normalize_type) {
            filters.push(AuctionFilter::new(FilterKind::Type, kind.to_string()));
        }

        Self {
            query: options.query.unwrap_or_default(),
            order: options
                .order
                .as_deref()
                .and_then(|order| AuctionSortOrder::from_str(order).ok())
                .unwrap_or_default(),
            start: options.start.unwrap_or(0),
            amount: options.amount.unwrap_or(DEFAULT_AMOUNT),
            filters,
        }
    }
}

/// Lower-cases and trims a raw category.
#[must_use]
pub fn normalize_category(raw: &str) -> Option<AuctionCategory> {
    AuctionCategory::from_str(&raw.trim().to_lowercase()).ok()
}

/// Upper-cases, trims and replaces spaces with underscores in a raw rarity.
#[must_use]
pub fn normalize_rarity(raw: &str) -> Option<ItemRarity> {
    ItemRarity::from_str(&raw.trim().to_uppercase().replace(' ', "_")).ok()
}

/// Lower-cases and trims a raw auction type.
#[must_use]
pub fn normalize_type(raw: &str) -> Option<AuctionType> {
    AuctionType::from_str(&raw.trim().to_lowercase()).ok()
}
