//! As-of join of lower-timeframe bars onto closed higher-timeframe bars.
//!
//! A lower bar is evaluated at its own close time `t`. Its context is the
//! latest higher bar whose close time is `<= t`; a higher bar still forming
//! at `t` is never visible.

use crate::domain::error::BacktestError;
use crate::domain::indicator::IndicatorPoint;
use crate::domain::timeframe_data::TimeframeData;
use crate::domain::trend::{Trend, classify};
use chrono::NaiveDateTime;

/// The higher-timeframe bar visible from a lower bar.
#[derive(Debug, Clone, PartialEq)]
pub struct HigherContext {
    pub index: usize,
    pub close_time: NaiveDateTime,
    pub point: IndicatorPoint,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AlignedContext {
    pub timestamp: NaiveDateTime,
    pub higher: Option<HigherContext>,
    pub trend: Trend,
}

/// One `AlignedContext` per lower bar, in lower-bar order.
pub fn align(
    lower: &TimeframeData,
    higher: &TimeframeData,
) -> Result<Vec<AlignedContext>, BacktestError> {
    if higher.indicators.len() != higher.bars.len() {
        let ts = higher.bars.first().map(|b| b.timestamp).unwrap_or_default();
        return Err(BacktestError::integrity(
            ts,
            "higher timeframe indicators are not aligned with its bars",
        ));
    }

    let mut out = Vec::with_capacity(lower.bars.len());
    let mut cursor = 0usize;
    let mut prev_t: Option<NaiveDateTime> = None;

    for bar in &lower.bars {
        let t = lower.timeframe.close_time(bar.timestamp);
        if prev_t.is_some_and(|p| t <= p) {
            return Err(BacktestError::integrity(
                bar.timestamp,
                "lower timeframe bars are not strictly increasing",
            ));
        }
        prev_t = Some(t);

        while cursor < higher.bars.len()
            && higher.timeframe.close_time(higher.bars[cursor].timestamp) <= t
        {
            cursor += 1;
        }

        let context = cursor.checked_sub(1).map(|i| HigherContext {
            index: i,
            close_time: higher.timeframe.close_time(higher.bars[i].timestamp),
            point: higher.indicators[i].clone(),
        });
        let trend = context
            .as_ref()
            .map(|c| classify(c.point.ema_short, c.point.ema_long))
            .unwrap_or(Trend::Neutral);

        out.push(AlignedContext {
            timestamp: bar.timestamp,
            higher: context,
            trend,
        });
    }

    Ok(out)
}
