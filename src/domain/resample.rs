//! Aggregation of raw rows into fixed-timeframe bars.
//!
//! Buckets are anchored at midnight of the first row's day and labelled with
//! their left edge. Aggregation is open=first, high=max, low=min, close=last,
//! volume=sum. Buckets with no rows are dropped rather than forward-filled.

use crate::domain::error::BacktestError;
use crate::domain::ohlcv::Bar;
use crate::domain::timeframe::Timeframe;

/// Resample `raw` (strictly increasing timestamps) into `timeframe` bars.
pub fn resample(raw: &[Bar], timeframe: Timeframe) -> Result<Vec<Bar>, BacktestError> {
    let Some(first) = raw.first() else {
        return Ok(Vec::new());
    };
    let origin = first.timestamp.date().and_time(chrono::NaiveTime::MIN);

    let mut out: Vec<Bar> = Vec::new();
    let mut prev_ts = None;

    for row in raw {
        if let Some(prev) = prev_ts {
            if row.timestamp <= prev {
                return Err(BacktestError::integrity(
                    row.timestamp,
                    "raw rows must have strictly increasing timestamps",
                ));
            }
        }
        prev_ts = Some(row.timestamp);

        let bucket = timeframe.bucket_start(row.timestamp, origin);
        match out.last_mut() {
            Some(bar) if bar.timestamp == bucket => {
                bar.high = bar.high.max(row.high);
                bar.low = bar.low.min(row.low);
                bar.close = row.close;
                bar.volume += row.volume;
            }
            _ => out.push(Bar {
                timestamp: bucket,
                ..row.clone()
            }),
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveDateTime};

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, 6)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn row(ts: NaiveDateTime, open: f64, high: f64, low: f64, close: f64, volume: f64) -> Bar {
        Bar {
            timestamp: ts,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    #[test]
    fn empty_input_gives_empty_output() {
        assert!(resample(&[], Timeframe::minutes(5)).unwrap().is_empty());
    }

    #[test]
    fn aggregates_within_bucket() {
        let raw = vec![
            row(at(9, 0), 10.0, 12.0, 9.0, 11.0, 1.0),
            row(at(9, 1), 11.0, 15.0, 10.0, 14.0, 2.0),
            row(at(9, 4), 14.0, 14.5, 8.0, 13.0, 3.0),
            row(at(9, 5), 13.0, 13.0, 12.0, 12.5, 4.0),
        ];
        let bars = resample(&raw, Timeframe::minutes(5)).unwrap();

        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].timestamp, at(9, 0));
        assert_eq!(bars[0].open, 10.0);
        assert_eq!(bars[0].high, 15.0);
        assert_eq!(bars[0].low, 8.0);
        assert_eq!(bars[0].close, 13.0);
        assert_eq!(bars[0].volume, 6.0);
        assert_eq!(bars[1].timestamp, at(9, 5));
        assert_eq!(bars[1].close, 12.5);
    }

    #[test]
    fn buckets_anchor_at_midnight() {
        let raw = vec![
            row(at(1, 10), 1.0, 1.0, 1.0, 1.0, 1.0),
            row(at(5, 50), 2.0, 2.0, 2.0, 2.0, 1.0),
        ];
        let bars = resample(&raw, Timeframe::hours(4)).unwrap();
        assert_eq!(bars[0].timestamp, at(0, 0));
        assert_eq!(bars[1].timestamp, at(4, 0));
    }

    #[test]
    fn empty_buckets_are_dropped() {
        let raw = vec![
            row(at(9, 0), 1.0, 1.0, 1.0, 1.0, 1.0),
            row(at(9, 20), 2.0, 2.0, 2.0, 2.0, 1.0),
        ];
        let bars = resample(&raw, Timeframe::minutes(5)).unwrap();
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[1].timestamp, at(9, 20));
    }

    #[test]
    fn unordered_rows_are_rejected() {
        let raw = vec![
            row(at(9, 5), 1.0, 1.0, 1.0, 1.0, 1.0),
            row(at(9, 0), 2.0, 2.0, 2.0, 2.0, 1.0),
        ];
        let err = resample(&raw, Timeframe::minutes(5)).unwrap_err();
        assert!(
            matches!(err, BacktestError::DataIntegrity { timestamp, .. } if timestamp == at(9, 0))
        );
    }
}
