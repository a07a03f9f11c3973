//! CSV file data adapter.
//!
//! Expects a header row naming `timestamp, open, high, low, close, volume`
//! in any order and any letter case. Extra columns are ignored.

use crate::domain::error::BacktestError;
use crate::domain::ohlcv::Bar;
use crate::ports::data_port::DataPort;
use chrono::{NaiveDate, NaiveDateTime};
use std::path::PathBuf;
use tracing::info;

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
    "%d-%m-%Y %H:%M:%S",
    "%d-%m-%Y %H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y", "%d-%m-%Y"];

const COLUMNS: [&str; 6] = ["timestamp", "open", "high", "low", "close", "volume"];

/// Parse a timestamp in any supported format. Ambiguous slash dates are
/// read day first.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

pub struct CsvAdapter {
    path: PathBuf,
}

impl CsvAdapter {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    fn column_indices(&self, headers: &csv::StringRecord) -> Result<[usize; 6], BacktestError> {
        let mut indices = [0usize; 6];
        let mut missing = Vec::new();
        for (slot, name) in indices.iter_mut().zip(COLUMNS) {
            match headers
                .iter()
                .position(|h| h.trim().eq_ignore_ascii_case(name))
            {
                Some(i) => *slot = i,
                None => missing.push(name),
            }
        }
        if missing.is_empty() {
            Ok(indices)
        } else {
            Err(BacktestError::DataSource {
                reason: format!(
                    "{} is missing required columns: {}",
                    self.path.display(),
                    missing.join(", ")
                ),
            })
        }
    }
}

fn field<'r>(record: &'r csv::StringRecord, index: usize, name: &str, line: u64) -> Result<&'r str, BacktestError> {
    record.get(index).ok_or_else(|| BacktestError::DataSource {
        reason: format!("line {line}: missing {name} column"),
    })
}

fn number(record: &csv::StringRecord, index: usize, name: &str, line: u64) -> Result<f64, BacktestError> {
    let raw = field(record, index, name, line)?;
    raw.trim().parse().map_err(|e| BacktestError::DataSource {
        reason: format!("line {line}: invalid {name} value '{raw}': {e}"),
    })
}

impl DataPort for CsvAdapter {
    fn fetch_bars(&self) -> Result<Vec<Bar>, BacktestError> {
        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_path(&self.path)
            .map_err(|e| BacktestError::DataSource {
                reason: format!("failed to read {}: {}", self.path.display(), e),
            })?;

        let headers = rdr.headers()?.clone();
        let [ts_i, open_i, high_i, low_i, close_i, volume_i] = self.column_indices(&headers)?;
        let mut bars = Vec::new();

        for result in rdr.records() {
            let record = result?;
            let line = record.position().map(|p| p.line()).unwrap_or(0);

            let ts_raw = field(&record, ts_i, "timestamp", line)?;
            let timestamp = parse_timestamp(ts_raw).ok_or_else(|| BacktestError::DataSource {
                reason: format!("line {line}: unrecognised timestamp '{ts_raw}'"),
            })?;

            let bar = Bar {
                timestamp,
                open: number(&record, open_i, "open", line)?,
                high: number(&record, high_i, "high", line)?,
                low: number(&record, low_i, "low", line)?,
                close: number(&record, close_i, "close", line)?,
                volume: number(&record, volume_i, "volume", line)?,
            };
            if !bar.is_well_formed() {
                return Err(BacktestError::integrity(
                    timestamp,
                    format!("line {line}: missing or inconsistent OHLC values"),
                ));
            }
            bars.push(bar);
        }

        if bars.is_empty() {
            return Err(BacktestError::NoData {
                origin: self.path.display().to_string(),
            });
        }

        bars.sort_by_key(|b| b.timestamp);
        if let Some(dup) = bars.windows(2).find(|w| w[0].timestamp == w[1].timestamp) {
            return Err(BacktestError::integrity(dup[1].timestamp, "duplicate timestamp"));
        }

        info!(rows = bars.len(), path = %self.path.display(), "loaded price data");
        Ok(bars)
    }
}
