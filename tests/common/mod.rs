#![allow(dead_code)]

use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use mtfcross::domain::backtest::{BacktestConfig, BacktestResult};
use mtfcross::domain::error::BacktestError;
pub use mtfcross::domain::ohlcv::Bar;
use mtfcross::domain::metrics::Metrics;
use mtfcross::domain::timeframe::Timeframe;
use mtfcross::ports::data_port::DataPort;
use mtfcross::ports::report_port::ReportPort;
use std::cell::{Cell, RefCell};
use std::path::{Path, PathBuf};

pub struct MockDataPort {
    pub bars: Vec<Bar>,
    pub error: Option<String>,
    pub fetches: Cell<usize>,
}

impl MockDataPort {
    pub fn new(bars: Vec<Bar>) -> Self {
        Self {
            bars,
            error: None,
            fetches: Cell::new(0),
        }
    }

    pub fn failing(reason: &str) -> Self {
        Self {
            bars: Vec::new(),
            error: Some(reason.to_string()),
            fetches: Cell::new(0),
        }
    }
}

impl DataPort for MockDataPort {
    fn fetch_bars(&self) -> Result<Vec<Bar>, BacktestError> {
        self.fetches.set(self.fetches.get() + 1);
        if let Some(reason) = &self.error {
            return Err(BacktestError::DataSource {
                reason: reason.clone(),
            });
        }
        if self.bars.is_empty() {
            return Err(BacktestError::NoData {
                origin: "mock".into(),
            });
        }
        Ok(self.bars.clone())
    }
}

/// Report port that remembers what it was asked to write.
#[derive(Default)]
pub struct RecordingReportPort {
    pub writes: RefCell<Vec<(PathBuf, usize)>>,
}

impl ReportPort for RecordingReportPort {
    fn write(
        &self,
        result: &BacktestResult,
        _metrics: &Metrics,
        output_dir: &Path,
    ) -> Result<(), BacktestError> {
        self.writes
            .borrow_mut()
            .push((output_dir.to_path_buf(), result.trades().len()));
        Ok(())
    }
}

pub fn start() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 3, 4)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
}

/// One-minute rows with the given closes. Each row opens at the previous
/// close and spans it by a small wick.
pub fn minute_bars(closes: &[f64]) -> Vec<Bar> {
    let mut prev = closes.first().copied().unwrap_or(100.0);
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let open = prev;
            prev = close;
            Bar {
                timestamp: start() + TimeDelta::minutes(i as i64),
                open,
                high: open.max(close) + 0.05,
                low: open.min(close) - 0.05,
                close,
                volume: 1.0 + (i % 7) as f64,
            }
        })
        .collect()
}

/// Two overlaid sine waves: a slow swing that drives the higher trend and a
/// fast one that produces lower-timeframe crossovers.
pub fn wave_closes(n: usize) -> Vec<f64> {
    (0..n)
        .map(|i| {
            let t = i as f64;
            100.0
                + 6.0 * (t * std::f64::consts::TAU / 720.0).sin()
                + 1.5 * (t * std::f64::consts::TAU / 97.0).sin()
        })
        .collect()
}

pub fn wave_bars(n: usize) -> Vec<Bar> {
    minute_bars(&wave_closes(n))
}

/// 5-minute lower / 30-minute higher with short EMAs so few rows suffice.
pub fn sample_config() -> BacktestConfig {
    BacktestConfig {
        lower_tf: Timeframe::minutes(5),
        higher_tf: Timeframe::minutes(30),
        lower_ema_short: 3,
        lower_ema_long: 8,
        higher_ema_short: 3,
        higher_ema_long: 8,
        risk_percent: 0.5,
        risk_reward_ratio: 2.0,
        initial_capital: 1_000.0,
        lot_size: 1.0,
    }
}

pub fn write_file(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, content).unwrap();
    path
}

pub fn bars_to_csv(bars: &[Bar]) -> String {
    let mut out = String::from("timestamp,open,high,low,close,volume\n");
    for b in bars {
        out.push_str(&format!(
            "{},{},{},{},{},{}\n",
            b.timestamp.format("%Y-%m-%d %H:%M:%S"),
            b.open,
            b.high,
            b.low,
            b.close,
            b.volume
        ));
    }
    out
}
