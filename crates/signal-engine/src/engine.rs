use std::collections::{HashMap, VecDeque};

use chrono::Utc;
use model::{Bar, OrderBook, SignalType, StrategySignal, Symbol, TradeTick};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use tracing::{debug, trace};

use crate::indicators::{moving_average, order_book_imbalance, volatility};

/// Bars kept per symbol.
pub const BUFFER_CAPACITY: usize = 100;

/// Bars in the long window; no signal is evaluated below this.
pub const LONG_WINDOW: usize = 30;

/// Bars in the short moving average.
pub const SHORT_WINDOW: usize = 10;

const BUY_IMBALANCE: f64 = 0.3;
const SELL_IMBALANCE: f64 = -0.3;
const BUY_MAX_VOLATILITY: f64 = 0.02;
const SELL_MIN_VOLATILITY: f64 = 0.05;
const BASE_CONFIDENCE: f64 = 0.8;

#[derive(Debug, Default)]
struct SymbolState {
    bars: VecDeque<Bar>,
    order_book: Option<OrderBook>,
    trades_seen: u64,
    last_trade_price: Option<Decimal>,
}

/// Per-symbol rolling state and signal evaluation.
///
/// All state sits behind one mutex; callbacks from different sources may call in
/// concurrently.
#[derive(Debug, Default)]
pub struct SignalEngine {
    state: Mutex<HashMap<Symbol, SymbolState>>,
}

impl SignalEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a bar and evaluate the symbol.
    ///
    /// Returns `None` while fewer than `LONG_WINDOW` bars are buffered or when the
    /// window contains a zero close.
    pub fn ingest_bar(&self, symbol: &str, bar: Bar) -> Option<StrategySignal> {
        let mut state = self.state.lock();
        let entry = state.entry(symbol.to_string()).or_default();

        entry.bars.push_back(bar);
        while entry.bars.len() > BUFFER_CAPACITY {
            entry.bars.pop_front();
        }

        evaluate(symbol, entry)
    }

    /// Replace the cached order book. Never emits a signal.
    pub fn ingest_order_book(&self, symbol: &str, book: OrderBook) {
        trace!(symbol, bids = book.bids.len(), asks = book.asks.len(), "Order book updated");
        self.state
            .lock()
            .entry(symbol.to_string())
            .or_default()
            .order_book = Some(book);
    }

    /// Record a trade. Trades do not affect signals.
    pub fn ingest_trade(&self, trade: TradeTick) {
        let mut state = self.state.lock();
        let entry = state.entry(trade.symbol).or_default();
        entry.trades_seen += 1;
        entry.last_trade_price = Some(trade.price);
    }

    pub fn bar_count(&self, symbol: &str) -> usize {
        self.state.lock().get(symbol).map_or(0, |s| s.bars.len())
    }

    /// Buffered bars, oldest first.
    pub fn bars(&self, symbol: &str) -> Vec<Bar> {
        self.state
            .lock()
            .get(symbol)
            .map(|s| s.bars.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn order_book(&self, symbol: &str) -> Option<OrderBook> {
        self.state.lock().get(symbol).and_then(|s| s.order_book.clone())
    }

    pub fn trades_seen(&self, symbol: &str) -> u64 {
        self.state.lock().get(symbol).map_or(0, |s| s.trades_seen)
    }

    pub fn last_trade_price(&self, symbol: &str) -> Option<Decimal> {
        self.state.lock().get(symbol).and_then(|s| s.last_trade_price)
    }

    pub fn symbols(&self) -> Vec<Symbol> {
        let mut symbols: Vec<Symbol> = self.state.lock().keys().cloned().collect();
        symbols.sort();
        symbols
    }
}

fn evaluate(symbol: &str, state: &SymbolState) -> Option<StrategySignal> {
    if state.bars.len() < LONG_WINDOW {
        return None;
    }

    let closes: Vec<Decimal> = state
        .bars
        .iter()
        .skip(state.bars.len() - LONG_WINDOW)
        .map(|b| b.close)
        .collect();
    let price = *closes.last()?;

    let imbalance = order_book_imbalance(state.order_book.as_ref());
    let Some(vol) = volatility(&closes) else {
        debug!(symbol, "Volatility undefined for window, skipping signal");
        return None;
    };
    let short_ma = moving_average(&closes[LONG_WINDOW - SHORT_WINDOW..])?;
    let long_ma = moving_average(&closes)?;

    let (signal_type, confidence) = classify(short_ma, long_ma, imbalance, vol);

    Some(StrategySignal {
        symbol: symbol.to_string(),
        timestamp: Utc::now(),
        signal_type,
        confidence,
        price,
        order_book_imbalance: imbalance,
        volatility: vol,
    })
}

fn classify(short_ma: f64, long_ma: f64, imbalance: f64, volatility: f64) -> (SignalType, f64) {
    if short_ma > long_ma && imbalance > BUY_IMBALANCE && volatility < BUY_MAX_VOLATILITY {
        (SignalType::Buy, (BASE_CONFIDENCE + imbalance).min(1.0))
    } else if short_ma < long_ma && imbalance < SELL_IMBALANCE && volatility > SELL_MIN_VOLATILITY
    {
        (SignalType::Sell, (BASE_CONFIDENCE - imbalance).min(1.0))
    } else {
        (SignalType::Hold, 0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use model::{PriceLevel, TakerSide};
    use rust_decimal_macros::dec;

    const SYMBOL: &str = "BTC/USD";

    fn bar(i: usize, close: Decimal) -> Bar {
        Bar {
            open: close,
            high: close,
            low: close,
            close,
            volume: dec!(1),
            timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
                + Duration::minutes(i as i64),
            trade_count: Some(1),
            vwap: Some(close),
        }
    }

    fn book(bid_size: Decimal, ask_size: Decimal) -> OrderBook {
        OrderBook {
            symbol: SYMBOL.to_string(),
            timestamp: Utc::now(),
            bids: vec![PriceLevel::new(dec!(99), bid_size)],
            asks: vec![PriceLevel::new(dec!(101), ask_size)],
        }
    }

    fn feed(engine: &SignalEngine, closes: &[Decimal]) -> Vec<Option<StrategySignal>> {
        closes
            .iter()
            .enumerate()
            .map(|(i, &c)| engine.ingest_bar(SYMBOL, bar(i, c)))
            .collect()
    }

    #[test]
    fn test_no_signal_below_long_window() {
        let engine = SignalEngine::new();
        engine.ingest_order_book(SYMBOL, book(dec!(75), dec!(25)));

        let closes: Vec<Decimal> = (0..LONG_WINDOW).map(|i| Decimal::from(100 + i)).collect();
        let signals = feed(&engine, &closes);

        assert!(signals[..LONG_WINDOW - 1].iter().all(Option::is_none));
        assert!(signals[LONG_WINDOW - 1].is_some());
    }

    #[test]
    fn test_buffer_bounded_and_ordered() {
        let engine = SignalEngine::new();
        for n in 1..=150 {
            engine.ingest_bar(SYMBOL, bar(n, Decimal::from(n)));
            assert_eq!(engine.bar_count(SYMBOL), n.min(BUFFER_CAPACITY));
        }

        let bars = engine.bars(SYMBOL);
        let closes: Vec<Decimal> = bars.iter().map(|b| b.close).collect();
        let expected: Vec<Decimal> = (51..=150).map(Decimal::from).collect();
        assert_eq!(closes, expected);
    }

    #[test]
    fn test_buy_on_rising_closes_with_bid_pressure() {
        let engine = SignalEngine::new();
        engine.ingest_order_book(SYMBOL, book(dec!(75), dec!(25)));

        let closes: Vec<Decimal> = (0..30).map(|i| Decimal::from(100 + i)).collect();
        let signal = feed(&engine, &closes).pop().flatten().unwrap();

        assert_eq!(signal.signal_type, SignalType::Buy);
        assert_eq!(signal.order_book_imbalance, 0.5);
        assert!(signal.volatility < 0.02);
        assert_eq!(signal.confidence, 1.0);
        assert_eq!(signal.price, dec!(129));
        assert_eq!(signal.symbol, SYMBOL);
    }

    #[test]
    fn test_sell_on_falling_volatile_closes_with_ask_pressure() {
        let engine = SignalEngine::new();
        engine.ingest_order_book(SYMBOL, book(dec!(25), dec!(75)));

        let mut close = dec!(10000);
        let mut closes = Vec::new();
        for i in 0..30 {
            closes.push(close);
            close *= if i % 2 == 0 { dec!(0.99) } else { dec!(0.85) };
        }
        let signal = feed(&engine, &closes).pop().flatten().unwrap();

        assert_eq!(signal.signal_type, SignalType::Sell);
        assert_eq!(signal.order_book_imbalance, -0.5);
        assert!(signal.volatility > 0.05);
        assert_eq!(signal.confidence, 1.0);
    }

    #[test]
    fn test_hold_on_flat_closes() {
        let engine = SignalEngine::new();
        let signal = feed(&engine, &[dec!(100); 30]).pop().flatten().unwrap();

        assert_eq!(signal.signal_type, SignalType::Hold);
        assert_eq!(signal.confidence, 0.0);
        assert_eq!(signal.order_book_imbalance, 0.0);
        assert_eq!(signal.volatility, 0.0);
    }

    #[test]
    fn test_missing_book_still_evaluates() {
        let engine = SignalEngine::new();
        let closes: Vec<Decimal> = (0..30).map(|i| Decimal::from(100 + i)).collect();
        let signal = feed(&engine, &closes).pop().flatten().unwrap();

        // Rising with low volatility, but no book pressure.
        assert_eq!(signal.signal_type, SignalType::Hold);
        assert_eq!(signal.order_book_imbalance, 0.0);
    }

    #[test]
    fn test_book_update_replaces_snapshot() {
        let engine = SignalEngine::new();
        engine.ingest_order_book(SYMBOL, book(dec!(75), dec!(25)));
        engine.ingest_order_book(SYMBOL, book(dec!(10), dec!(90)));

        let book = engine.order_book(SYMBOL).unwrap();
        assert_eq!(book.total_bid_size(), dec!(10));
        assert_eq!(engine.bar_count(SYMBOL), 0);
    }

    #[test]
    fn test_zero_close_skips_signal() {
        let engine = SignalEngine::new();
        let mut closes = vec![dec!(100); 30];
        closes[10] = Decimal::ZERO;
        assert!(feed(&engine, &closes).pop().flatten().is_none());
    }

    #[test]
    fn test_overflowing_closes_skip_signal() {
        let engine = SignalEngine::new();
        engine.ingest_order_book(SYMBOL, book(Decimal::MAX, Decimal::MAX));
        let mut closes = vec![Decimal::new(1, 28); 30];
        closes[29] = Decimal::MAX;

        assert!(feed(&engine, &closes).pop().flatten().is_none());
        assert_eq!(engine.bar_count(SYMBOL), 30);
    }

    #[test]
    fn test_trades_do_not_signal() {
        let engine = SignalEngine::new();
        engine.ingest_trade(TradeTick {
            symbol: SYMBOL.to_string(),
            price: dec!(64000),
            size: dec!(0.5),
            timestamp: Utc::now(),
            trade_id: 1,
            taker_side: TakerSide::Buy,
        });

        assert_eq!(engine.trades_seen(SYMBOL), 1);
        assert_eq!(engine.last_trade_price(SYMBOL), Some(dec!(64000)));
        assert_eq!(engine.bar_count(SYMBOL), 0);
        assert_eq!(engine.symbols(), vec![SYMBOL.to_string()]);
    }

    #[test]
    fn test_classify_thresholds_are_strict() {
        assert_eq!(classify(2.0, 1.0, 0.3, 0.0).0, SignalType::Hold);
        assert_eq!(classify(2.0, 1.0, 0.31, 0.02).0, SignalType::Hold);
        assert_eq!(classify(1.0, 2.0, -0.31, 0.05).0, SignalType::Hold);
        assert_eq!(classify(1.0, 1.0, 0.9, 0.0).0, SignalType::Hold);

        let (kind, confidence) = classify(2.0, 1.0, 0.1 + 0.25, 0.01);
        assert_eq!(kind, SignalType::Buy);
        assert_eq!(confidence, 1.0);
    }

    #[test]
    fn test_symbols_are_independent() {
        let engine = SignalEngine::new();
        engine.ingest_bar("ETH/USD", bar(0, dec!(3000)));
        engine.ingest_bar(SYMBOL, bar(0, dec!(60000)));
        engine.ingest_bar(SYMBOL, bar(1, dec!(60001)));

        assert_eq!(engine.bar_count("ETH/USD"), 1);
        assert_eq!(engine.bar_count(SYMBOL), 2);
        assert_eq!(engine.symbols(), vec!["BTC/USD".to_string(), "ETH/USD".to_string()]);
    }
}
