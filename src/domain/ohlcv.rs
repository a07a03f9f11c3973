//! OHLCV bar representation.

use chrono::NaiveDateTime;

/// One bar at one resolution. `timestamp` is the bar's open time.
#[derive(Debug, Clone, PartialEq)]
pub struct Bar {
    pub timestamp: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Bar {
    /// True when every price is finite and open and close lie inside
    /// `[low, high]`.
    pub fn is_well_formed(&self) -> bool {
        let prices = [self.open, self.high, self.low, self.close];
        let range = self.low..=self.high;
        prices.iter().all(|p| p.is_finite())
            && self.volume.is_finite()
            && range.contains(&self.open)
            && range.contains(&self.close)
    }
}
