//! Price data access port trait.

use crate::domain::error::BacktestError;
use crate::domain::ohlcv::Bar;
use chrono::NaiveDateTime;

pub trait DataPort {
    /// All rows, sorted by timestamp with no duplicates.
    fn fetch_bars(&self) -> Result<Vec<Bar>, BacktestError>;

    /// First timestamp, last timestamp and row count, or `None` when empty.
    fn get_data_range(&self) -> Result<Option<(NaiveDateTime, NaiveDateTime, usize)>, BacktestError> {
        Ok(data_range(&self.fetch_bars()?))
    }
}

/// First timestamp, last timestamp and row count of already loaded rows.
pub fn data_range(bars: &[Bar]) -> Option<(NaiveDateTime, NaiveDateTime, usize)> {
    match (bars.first(), bars.last()) {
        (Some(first), Some(last)) => Some((first.timestamp, last.timestamp, bars.len())),
        _ => None,
    }
}
