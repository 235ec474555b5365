//! Alpaca API response types.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use model::{Bar, OrderBook, PriceLevel};
use rust_decimal::Decimal;
use serde::Deserialize;

/// A bar as returned by the market data API.
#[derive(Debug, Clone, Deserialize)]
pub struct RawBar {
    #[serde(rename = "o")]
    pub open: Decimal,
    #[serde(rename = "h")]
    pub high: Decimal,
    #[serde(rename = "l")]
    pub low: Decimal,
    #[serde(rename = "c")]
    pub close: Decimal,
    #[serde(rename = "v")]
    pub volume: Decimal,
    #[serde(rename = "t")]
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "n", default)]
    pub trade_count: Option<u64>,
    #[serde(rename = "vw", default)]
    pub vwap: Option<Decimal>,
}

impl From<RawBar> for Bar {
    fn from(raw: RawBar) -> Self {
        Bar {
            open: raw.open,
            high: raw.high,
            low: raw.low,
            close: raw.close,
            volume: raw.volume,
            timestamp: raw.timestamp,
            trade_count: raw.trade_count,
            vwap: raw.vwap,
        }
    }
}

/// Response from GET /v1beta3/crypto/us/latest/bars.
#[derive(Debug, Clone, Deserialize)]
pub struct LatestBarsResponse {
    #[serde(default)]
    pub bars: HashMap<String, RawBar>,
}

impl LatestBarsResponse {
    pub fn into_bars(self) -> HashMap<String, Bar> {
        self.bars
            .into_iter()
            .map(|(symbol, raw)| (symbol, raw.into()))
            .collect()
    }
}

#[derive(Debug, Deserialize)]
struct RawLevel {
    p: Decimal,
    s: Decimal,
}

/// An order book as returned by the market data API.
///
/// Levels are kept as raw JSON so a single malformed level is dropped on its own
/// instead of failing the whole snapshot.
#[derive(Debug, Clone, Deserialize)]
pub struct RawOrderBook {
    #[serde(rename = "t")]
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "b", default)]
    pub bids: Vec<serde_json::Value>,
    #[serde(rename = "a", default)]
    pub asks: Vec<serde_json::Value>,
}

fn parse_levels(levels: Vec<serde_json::Value>) -> Vec<PriceLevel> {
    levels
        .into_iter()
        .filter_map(|value| {
            let level: RawLevel = serde_json::from_value(value).ok()?;
            Some(PriceLevel::new(level.p, level.s))
        })
        .collect()
}

impl RawOrderBook {
    /// Convert into a snapshot with bids sorted descending and asks ascending.
    pub fn into_order_book(self, symbol: String) -> OrderBook {
        let mut bids = parse_levels(self.bids);
        let mut asks = parse_levels(self.asks);
        bids.sort_by(|a, b| b.price.cmp(&a.price));
        asks.sort_by(|a, b| a.price.cmp(&b.price));

        OrderBook {
            symbol,
            timestamp: self.timestamp,
            bids,
            asks,
        }
    }
}

/// Response from GET /v1beta3/crypto/us/latest/orderbooks.
#[derive(Debug, Clone, Deserialize)]
pub struct LatestOrderBooksResponse {
    #[serde(default)]
    pub orderbooks: HashMap<String, RawOrderBook>,
}

impl LatestOrderBooksResponse {
    pub fn into_order_books(self) -> HashMap<String, OrderBook> {
        self.orderbooks
            .into_iter()
            .map(|(symbol, raw)| {
                let book = raw.into_order_book(symbol.clone());
                (symbol, book)
            })
            .collect()
    }
}

/// Response from GET /v1beta3/crypto/us/bars.
#[derive(Debug, Clone, Deserialize)]
pub struct HistoricalBarsResponse {
    #[serde(default)]
    pub bars: HashMap<String, Vec<RawBar>>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

/// An entry of GET /v2/assets.
#[derive(Debug, Clone, Deserialize)]
pub struct Asset {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "class", default)]
    pub asset_class: String,
    #[serde(default)]
    pub exchange: String,
    pub symbol: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub tradable: bool,
    #[serde(default)]
    pub marginable: bool,
    #[serde(default)]
    pub shortable: bool,
}
