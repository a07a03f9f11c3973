//! Report generation port trait.

use crate::domain::backtest::BacktestResult;
use crate::domain::error::BacktestError;
use crate::domain::metrics::Metrics;
use std::path::Path;

/// Port for persisting the outputs of a finished run.
pub trait ReportPort {
    fn write(
        &self,
        result: &BacktestResult,
        metrics: &Metrics,
        output_dir: &Path,
    ) -> Result<(), BacktestError>;
}
