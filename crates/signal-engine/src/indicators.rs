//! Indicator math over a bar window.

use model::{OrderBook, PriceLevel};
use num_traits::ToPrimitive;
use rust_decimal::Decimal;

/// `(bids - asks) / (bids + asks)` over the full depth of the book, in `[-1, 1]`.
///
/// Zero when the book is missing, both sides are empty, or the sizes overflow.
pub fn order_book_imbalance(book: Option<&OrderBook>) -> f64 {
    book.and_then(imbalance_ratio)
        .and_then(|ratio| ratio.to_f64())
        .unwrap_or(0.0)
        .clamp(-1.0, 1.0)
}

fn imbalance_ratio(book: &OrderBook) -> Option<Decimal> {
    let bids = side_size(&book.bids)?;
    let asks = side_size(&book.asks)?;
    let total = bids.checked_add(asks)?;
    if total.is_zero() {
        return None;
    }
    bids.checked_sub(asks)?.checked_div(total)
}

fn side_size(levels: &[PriceLevel]) -> Option<Decimal> {
    levels
        .iter()
        .try_fold(Decimal::ZERO, |acc, level| acc.checked_add(level.size))
}

/// Arithmetic mean of `values`, `None` when empty or when the sum overflows.
pub fn moving_average(values: &[Decimal]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let sum = values
        .iter()
        .try_fold(Decimal::ZERO, |acc, v| acc.checked_add(*v))?;
    sum.checked_div(Decimal::from(values.len()))?.to_f64()
}

/// Population standard deviation of close-to-close returns.
///
/// `None` with fewer than two closes, when a previous close is zero, or when a return
/// is not representable.
pub fn volatility(closes: &[Decimal]) -> Option<f64> {
    if closes.len() < 2 {
        return None;
    }

    let returns = closes
        .windows(2)
        .map(|w| w[1].checked_sub(w[0])?.checked_div(w[0])?.to_f64())
        .collect::<Option<Vec<f64>>>()?;

    let n = returns.len() as f64;
    let mean = returns.iter().sum::<f64>() / n;
    let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n;
    Some(variance.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn book(bids: &[(Decimal, Decimal)], asks: &[(Decimal, Decimal)]) -> OrderBook {
        OrderBook {
            symbol: "BTC/USD".to_string(),
            timestamp: Utc::now(),
            bids: bids.iter().map(|&(p, s)| PriceLevel::new(p, s)).collect(),
            asks: asks.iter().map(|&(p, s)| PriceLevel::new(p, s)).collect(),
        }
    }

    #[test]
    fn test_imbalance_exact() {
        let book = book(
            &[(dec!(100), dec!(40)), (dec!(99), dec!(30))],
            &[(dec!(101), dec!(30))],
        );
        assert_eq!(order_book_imbalance(Some(&book)), 0.4);
    }

    #[test]
    fn test_imbalance_missing_or_empty_book() {
        assert_eq!(order_book_imbalance(None), 0.0);
        assert_eq!(order_book_imbalance(Some(&book(&[], &[]))), 0.0);
    }

    #[test]
    fn test_imbalance_one_sided() {
        let bids_only = book(&[(dec!(100), dec!(5))], &[]);
        assert_eq!(order_book_imbalance(Some(&bids_only)), 1.0);
        let asks_only = book(&[], &[(dec!(101), dec!(5))]);
        assert_eq!(order_book_imbalance(Some(&asks_only)), -1.0);
    }

    #[test]
    fn test_imbalance_clamped_on_negative_sizes() {
        let odd = book(&[(dec!(100), dec!(10))], &[(dec!(101), dec!(-5))]);
        assert_eq!(order_book_imbalance(Some(&odd)), 1.0);
    }

    #[test]
    fn test_moving_average() {
        assert_eq!(moving_average(&[]), None);
        assert_eq!(moving_average(&[dec!(1), dec!(2), dec!(3), dec!(6)]), Some(3.0));
    }

    #[test]
    fn test_volatility_flat_is_zero() {
        assert_eq!(volatility(&[dec!(5); 30]), Some(0.0));
    }

    #[test]
    fn test_volatility_population_stddev() {
        // Returns: +10%, -10%  -> mean 0, population stddev 0.1
        let vol = volatility(&[dec!(100), dec!(110), dec!(99)]).unwrap();
        assert!((vol - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_volatility_undefined() {
        assert_eq!(volatility(&[dec!(1)]), None);
        assert_eq!(volatility(&[dec!(0), dec!(1), dec!(2)]), None);
    }

    #[test]
    fn test_extreme_values_degrade_without_panic() {
        assert_eq!(volatility(&[Decimal::new(1, 28), Decimal::MAX]), None);
        assert_eq!(volatility(&[Decimal::MIN, Decimal::MAX]), None);
        assert_eq!(moving_average(&[Decimal::MAX, Decimal::MAX]), None);

        let huge = book(
            &[(dec!(100), Decimal::MAX), (dec!(99), Decimal::MAX)],
            &[(dec!(101), dec!(1))],
        );
        assert_eq!(order_book_imbalance(Some(&huge)), 0.0);
        let overflowing_total = book(&[(dec!(100), Decimal::MAX)], &[(dec!(101), Decimal::MAX)]);
        assert_eq!(order_book_imbalance(Some(&overflowing_total)), 0.0);
    }
}
