//! Higher-timeframe trend classification.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Trend {
    Bullish,
    Bearish,
    Neutral,
}

impl fmt::Display for Trend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Trend::Bullish => write!(f, "bullish"),
            Trend::Bearish => write!(f, "bearish"),
            Trend::Neutral => write!(f, "neutral"),
        }
    }
}

/// Classify a short/long EMA pair. Undefined, equal or NaN inputs are
/// `Neutral`, which never sanctions an entry.
pub fn classify(ema_short: Option<f64>, ema_long: Option<f64>) -> Trend {
    match (ema_short, ema_long) {
        (Some(s), Some(l)) if s > l => Trend::Bullish,
        (Some(s), Some(l)) if s < l => Trend::Bearish,
        _ => Trend::Neutral,
    }
}
