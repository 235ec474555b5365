use auth::ApiCredentials;
use chrono::{DateTime, Utc};
use model::{TakerSide, TradeTick};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{json, Value};

/// Event tag carried by trade messages.
const TRADE_TAG: &str = "t";

/// Event tag carried by server-side error messages.
const ERROR_TAG: &str = "error";

/// Raw Alpaca crypto trade event.
#[derive(Debug, Deserialize)]
pub struct AlpacaTradeRaw {
    #[serde(rename = "S")]
    pub symbol: String,
    #[serde(rename = "p")]
    pub price: Decimal,
    #[serde(rename = "s")]
    pub size: Decimal,
    #[serde(rename = "t")]
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "i", default)]
    pub trade_id: u64,
    #[serde(rename = "tks", default)]
    pub taker_side: Option<String>,
}

impl From<AlpacaTradeRaw> for TradeTick {
    fn from(raw: AlpacaTradeRaw) -> Self {
        TradeTick {
            symbol: raw.symbol,
            price: raw.price,
            size: raw.size,
            timestamp: raw.timestamp,
            trade_id: raw.trade_id,
            taker_side: match raw.taker_side.as_deref() {
                Some("B") => TakerSide::Buy,
                Some("S") => TakerSide::Sell,
                _ => TakerSide::Unknown,
            },
        }
    }
}

/// One decoded event from a stream payload.
#[derive(Debug)]
pub enum ParsedEvent {
    Trade(TradeTick),
    /// Server-reported error (bad auth, invalid subscription, ...).
    Error { code: Option<i64>, message: String },
    /// A trade-tagged event whose body did not decode.
    Malformed(String),
    /// Any other tag (`success`, `subscription`, quotes, bars, ...).
    Other(String),
}

fn parse_event(value: Value) -> ParsedEvent {
    let tag = value
        .get("T")
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string();

    match tag.as_str() {
        TRADE_TAG => match serde_json::from_value::<AlpacaTradeRaw>(value) {
            Ok(raw) => ParsedEvent::Trade(raw.into()),
            Err(e) => ParsedEvent::Malformed(e.to_string()),
        },
        ERROR_TAG => ParsedEvent::Error {
            code: value.get("code").and_then(|v| v.as_i64()),
            message: value
                .get("msg")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string(),
        },
        _ => ParsedEvent::Other(tag),
    }
}

/// Decode one stream payload into its events, preserving order.
///
/// The server sends arrays of tagged objects; a bare object is accepted as a
/// single-event payload. Only a payload that is not JSON at all fails as a whole.
pub fn parse_message(text: &str) -> Result<Vec<ParsedEvent>, serde_json::Error> {
    let payload: Value = serde_json::from_str(text)?;

    let events = match payload {
        Value::Array(items) => items.into_iter().map(parse_event).collect(),
        other @ Value::Object(_) => vec![parse_event(other)],
        other => vec![ParsedEvent::Other(other.to_string())],
    };

    Ok(events)
}

/// The authentication message sent right after connecting.
pub fn auth_message(credentials: &ApiCredentials) -> String {
    json!({
        "action": "auth",
        "key": credentials.api_key(),
        "secret": credentials.expose_secret(),
    })
    .to_string()
}

/// The subscription message for the trade channel of `symbols`.
pub fn subscribe_message(symbols: &[String]) -> String {
    json!({
        "action": "subscribe",
        "trades": symbols,
    })
    .to_string()
}
