//! Exponential Moving Average over bar closes.
//!
//! k = 2/(n+1), seeded with the first close, then EMA[i] = C[i]*k + EMA[i-1]*(1-k).
//! Warm-up masking is left to the caller.

use crate::domain::ohlcv::Bar;

pub fn calculate_ema(bars: &[Bar], period: usize) -> Vec<f64> {
    if period == 0 || bars.is_empty() {
        return Vec::new();
    }

    let k = 2.0 / (period as f64 + 1.0);
    let mut values = Vec::with_capacity(bars.len());
    let mut ema = bars[0].close;
    values.push(ema);

    for bar in &bars[1..] {
        ema = bar.close * k + ema * (1.0 - k);
        values.push(ema);
    }

    values
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::NaiveDate;

    fn make_bars(prices: &[f64]) -> Vec<Bar> {
        prices
            .iter()
            .enumerate()
            .map(|(i, &close)| Bar {
                timestamp: NaiveDate::from_ymd_opt(2024, 1, (i + 1) as u32)
                    .unwrap()
                    .and_hms_opt(0, 0, 0)
                    .unwrap(),
                open: close,
                high: close,
                low: close,
                close,
                volume: 1000.0,
            })
            .collect()
    }

    #[test]
    fn ema_seeded_with_first_close() {
        let values = calculate_ema(&make_bars(&[10.0, 20.0, 30.0]), 3);
        assert_relative_eq!(values[0], 10.0);
    }

    #[test]
    fn ema_recursive_calculation() {
        let values = calculate_ema(&make_bars(&[10.0, 20.0, 30.0, 40.0]), 3);
        let k = 2.0 / 4.0;
        let e1 = 20.0 * k + 10.0 * (1.0 - k);
        let e2 = 30.0 * k + e1 * (1.0 - k);
        let e3 = 40.0 * k + e2 * (1.0 - k);
        assert_relative_eq!(values[1], e1);
        assert_relative_eq!(values[2], e2);
        assert_relative_eq!(values[3], e3);
    }

    #[test]
    fn ema_period_1_tracks_close() {
        let values = calculate_ema(&make_bars(&[10.0, 20.0, 30.0]), 1);
        assert_eq!(values, vec![10.0, 20.0, 30.0]);
    }

    #[test]
    fn ema_equal_prices() {
        let values = calculate_ema(&make_bars(&[100.0; 5]), 3);
        for v in values {
            assert_relative_eq!(v, 100.0);
        }
    }

    #[test]
    fn ema_empty_bars() {
        assert!(calculate_ema(&[], 3).is_empty());
    }

    #[test]
    fn ema_period_0() {
        assert!(calculate_ema(&make_bars(&[10.0, 20.0]), 0).is_empty());
    }
}
