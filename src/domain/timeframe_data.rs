//! One resolution of the price series: bars plus their indicator points.

use crate::domain::error::BacktestError;
use crate::domain::indicator::{EmaPair, IndicatorPoint, compute_points};
use crate::domain::ohlcv::Bar;
use crate::domain::resample::resample;
use crate::domain::timeframe::Timeframe;
use chrono::NaiveDateTime;

#[derive(Debug, Clone)]
pub struct TimeframeData {
    pub timeframe: Timeframe,
    pub ema: EmaPair,
    pub bars: Vec<Bar>,
    pub indicators: Vec<IndicatorPoint>,
}

impl TimeframeData {
    /// Wrap already-resampled bars and compute their indicator points.
    pub fn new(timeframe: Timeframe, ema: EmaPair, bars: Vec<Bar>) -> Self {
        let indicators = compute_points(&bars, ema);
        Self {
            timeframe,
            ema,
            bars,
            indicators,
        }
    }

    /// Resample raw rows into `timeframe` and compute indicators.
    pub fn prepare(raw: &[Bar], timeframe: Timeframe, ema: EmaPair) -> Result<Self, BacktestError> {
        let bars = resample(raw, timeframe)?;
        Ok(Self::new(timeframe, ema, bars))
    }

    pub fn bar_count(&self) -> usize {
        self.bars.len()
    }

    pub fn close_time(&self, index: usize) -> Option<NaiveDateTime> {
        self.bars
            .get(index)
            .map(|bar| self.timeframe.close_time(bar.timestamp))
    }

    /// Check ordering, bar well-formedness and indicator alignment.
    ///
    /// The first offending bar's timestamp is reported.
    pub fn validate(&self) -> Result<(), BacktestError> {
        if self.indicators.len() != self.bars.len() {
            let ts = self
                .bars
                .get(self.indicators.len().min(self.bars.len().saturating_sub(1)))
                .map(|b| b.timestamp)
                .unwrap_or_default();
            return Err(BacktestError::integrity(
                ts,
                format!(
                    "{} timeframe has {} bars but {} indicator points",
                    self.timeframe,
                    self.bars.len(),
                    self.indicators.len()
                ),
            ));
        }

        let mut prev: Option<NaiveDateTime> = None;
        for (bar, point) in self.bars.iter().zip(&self.indicators) {
            if let Some(p) = prev {
                if bar.timestamp <= p {
                    return Err(BacktestError::integrity(
                        bar.timestamp,
                        format!("{} bars are not strictly increasing", self.timeframe),
                    ));
                }
            }
            if !bar.is_well_formed() {
                return Err(BacktestError::integrity(
                    bar.timestamp,
                    "bar has missing or inconsistent OHLC values",
                ));
            }
            if point.timestamp != bar.timestamp {
                return Err(BacktestError::integrity(
                    bar.timestamp,
                    format!("indicator point is stamped {}", point.timestamp),
                ));
            }
            prev = Some(bar.timestamp);
        }
        Ok(())
    }
}
