//! Domain error types.

use chrono::NaiveDateTime;

/// Top-level error type for mtfcross.
#[derive(Debug, thiserror::Error)]
pub enum BacktestError {
    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("data source error: {reason}")]
    DataSource { reason: String },

    #[error("no data in {origin}")]
    NoData { origin: String },

    #[error("data integrity error at {timestamp}: {reason}")]
    DataIntegrity {
        timestamp: NaiveDateTime,
        reason: String,
    },

    #[error("simulation invariant violated: {reason}")]
    SimulationInvariant { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl BacktestError {
    pub fn invalid(section: &str, key: &str, reason: impl Into<String>) -> Self {
        BacktestError::ConfigInvalid {
            section: section.to_string(),
            key: key.to_string(),
            reason: reason.into(),
        }
    }

    pub fn integrity(timestamp: NaiveDateTime, reason: impl Into<String>) -> Self {
        BacktestError::DataIntegrity {
            timestamp,
            reason: reason.into(),
        }
    }

    /// Process exit status for this error category.
    pub fn exit_status(&self) -> u8 {
        match self {
            BacktestError::Io(_) => 1,
            BacktestError::ConfigParse { .. }
            | BacktestError::ConfigMissing { .. }
            | BacktestError::ConfigInvalid { .. } => 2,
            BacktestError::DataSource { .. } | BacktestError::NoData { .. } => 3,
            BacktestError::DataIntegrity { .. } => 4,
            BacktestError::SimulationInvariant { .. } => 5,
        }
    }

    pub fn is_config(&self) -> bool {
        matches!(
            self,
            BacktestError::ConfigParse { .. }
                | BacktestError::ConfigMissing { .. }
                | BacktestError::ConfigInvalid { .. }
        )
    }
}

impl From<csv::Error> for BacktestError {
    fn from(err: csv::Error) -> Self {
        BacktestError::DataSource {
            reason: err.to_string(),
        }
    }
}

impl From<&BacktestError> for std::process::ExitCode {
    fn from(err: &BacktestError) -> Self {
        std::process::ExitCode::from(err.exit_status())
    }
}
