//! Indicator values carried alongside a bar series.
//!
//! - `EmaPair`: the short/long EMA periods for one timeframe
//! - `IndicatorPoint`: the two EMA values for one bar, undefined during warm-up
//! - `compute_points`: builds the index-aligned point series for a bar slice

pub mod ema;

use crate::domain::ohlcv::Bar;
use chrono::NaiveDateTime;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EmaPair {
    pub short: usize,
    pub long: usize,
}

impl fmt::Display for EmaPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EMA({})/EMA({})", self.short, self.long)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorPoint {
    pub timestamp: NaiveDateTime,
    pub ema_short: Option<f64>,
    pub ema_long: Option<f64>,
}

impl IndicatorPoint {
    pub fn undefined(timestamp: NaiveDateTime) -> Self {
        IndicatorPoint {
            timestamp,
            ema_short: None,
            ema_long: None,
        }
    }

    /// Both EMA values, when both are defined.
    pub fn values(&self) -> Option<(f64, f64)> {
        Some((self.ema_short?, self.ema_long?))
    }
}

/// Compute one `IndicatorPoint` per bar.
///
/// Points before index `pair.long - 1` are undefined, so every defined point
/// has seen at least a full long-period window of closes.
pub fn compute_points(bars: &[Bar], pair: EmaPair) -> Vec<IndicatorPoint> {
    let short = ema::calculate_ema(bars, pair.short);
    let long = ema::calculate_ema(bars, pair.long);
    let warmup = pair.long.saturating_sub(1);

    bars.iter()
        .enumerate()
        .map(|(i, bar)| {
            if i < warmup {
                IndicatorPoint::undefined(bar.timestamp)
            } else {
                IndicatorPoint {
                    timestamp: bar.timestamp,
                    ema_short: short.get(i).copied(),
                    ema_long: long.get(i).copied(),
                }
            }
        })
        .collect()
}
