//! Market data and signal types shared across the workspace.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Venue symbol, kept exactly as the venue reports it (e.g. `BTC/USD`).
pub type Symbol = String;

/// One OHLCV observation for a symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
    pub timestamp: DateTime<Utc>,
    /// Number of trades in the bar, when the venue reports it.
    pub trade_count: Option<u64>,
    /// Volume-weighted average price, when the venue reports it.
    pub vwap: Option<Decimal>,
}

/// A single price level in an order book snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceLevel {
    /// The price at this level.
    pub price: Decimal,
    /// The total size resting at this price.
    pub size: Decimal,
}

impl PriceLevel {
    /// Creates a new price level.
    pub fn new(price: Decimal, size: Decimal) -> Self {
        Self { price, size }
    }
}

/// A full order book snapshot. Bids are best (highest) first, asks are best (lowest) first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderBook {
    pub symbol: Symbol,
    pub timestamp: DateTime<Utc>,
    pub bids: Vec<PriceLevel>,
    pub asks: Vec<PriceLevel>,
}

impl OrderBook {
    /// Total size across all bid levels.
    pub fn total_bid_size(&self) -> Decimal {
        self.bids.iter().map(|l| l.size).sum()
    }

    /// Total size across all ask levels.
    pub fn total_ask_size(&self) -> Decimal {
        self.asks.iter().map(|l| l.size).sum()
    }

    pub fn best_bid(&self) -> Option<PriceLevel> {
        self.bids.first().copied()
    }

    pub fn best_ask(&self) -> Option<PriceLevel> {
        self.asks.first().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.bids.is_empty() && self.asks.is_empty()
    }
}

/// Side of the aggressor in a trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TakerSide {
    Buy,
    Sell,
    Unknown,
}

/// A single executed trade from the stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeTick {
    pub symbol: Symbol,
    pub price: Decimal,
    pub size: Decimal,
    pub timestamp: DateTime<Utc>,
    pub trade_id: u64,
    pub taker_side: TakerSide,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignalType {
    Buy,
    Sell,
    Hold,
}

impl fmt::Display for SignalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Buy => write!(f, "BUY"),
            Self::Sell => write!(f, "SELL"),
            Self::Hold => write!(f, "HOLD"),
        }
    }
}

/// A market classification produced by the signal engine.
///
/// Carries the indicator values that produced it so every decision can be audited,
/// including `Hold`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategySignal {
    pub symbol: Symbol,
    pub timestamp: DateTime<Utc>,
    pub signal_type: SignalType,
    /// Confidence in `[0, 1]`.
    pub confidence: f64,
    /// Close price of the bar that triggered the evaluation.
    pub price: Decimal,
    pub order_book_imbalance: f64,
    pub volatility: f64,
}

impl fmt::Display for StrategySignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} @ {} (confidence {:.2}, imbalance {:.4}, volatility {:.6})",
            self.symbol,
            self.signal_type,
            self.price,
            self.confidence,
            self.order_book_imbalance,
            self.volatility
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn book() -> OrderBook {
        OrderBook {
            symbol: "BTC/USD".to_string(),
            timestamp: Utc::now(),
            bids: vec![
                PriceLevel::new(dec!(100.5), dec!(2)),
                PriceLevel::new(dec!(100.0), dec!(3.5)),
            ],
            asks: vec![PriceLevel::new(dec!(101.0), dec!(1.25))],
        }
    }

    #[test]
    fn test_book_totals() {
        let book = book();
        assert_eq!(book.total_bid_size(), dec!(5.5));
        assert_eq!(book.total_ask_size(), dec!(1.25));
        assert_eq!(book.best_bid().unwrap().price, dec!(100.5));
        assert_eq!(book.best_ask().unwrap().price, dec!(101.0));
    }

    #[test]
    fn test_empty_book() {
        let book = OrderBook {
            symbol: "ETH/USD".to_string(),
            timestamp: Utc::now(),
            bids: vec![],
            asks: vec![],
        };
        assert!(book.is_empty());
        assert_eq!(book.total_bid_size(), Decimal::ZERO);
        assert!(book.best_bid().is_none());
    }

    #[test]
    fn test_signal_type_display() {
        assert_eq!(SignalType::Buy.to_string(), "BUY");
        assert_eq!(SignalType::Sell.to_string(), "SELL");
        assert_eq!(SignalType::Hold.to_string(), "HOLD");
    }

    #[test]
    fn test_signal_serializes_indicators() {
        let signal = StrategySignal {
            symbol: "BTC/USD".to_string(),
            timestamp: Utc::now(),
            signal_type: SignalType::Hold,
            confidence: 0.0,
            price: dec!(42000.5),
            order_book_imbalance: 0.25,
            volatility: 0.01,
        };
        let json = serde_json::to_value(&signal).unwrap();
        assert_eq!(json["symbol"], "BTC/USD");
        assert_eq!(json["signal_type"], "Hold");
        assert_eq!(json["order_book_imbalance"], 0.25);
    }
}
