//! Configuration validation.
//!
//! Checks every key that is present before a backtest is built. Absent keys
//! fall back to defaults and are not errors here.

use crate::domain::error::BacktestError;
use crate::domain::timeframe::Timeframe;
use crate::ports::config_port::ConfigPort;
use std::str::FromStr;

pub fn validate_backtest_config(config: &dyn ConfigPort) -> Result<(), BacktestError> {
    validate_timeframes(config)?;
    validate_positive(config, "backtest", "initial_capital")?;
    validate_positive(config, "backtest", "lot_size")?;
    validate_risk_free_rate(config)?;
    validate_csv_path(config)?;
    Ok(())
}

pub fn validate_strategy_config(config: &dyn ConfigPort) -> Result<(), BacktestError> {
    validate_period(config, "lower_ema_short")?;
    validate_period(config, "lower_ema_long")?;
    validate_period(config, "higher_ema_short")?;
    validate_period(config, "higher_ema_long")?;
    validate_positive(config, "strategy", "risk_percent")?;
    validate_positive(config, "strategy", "risk_reward_ratio")?;
    Ok(())
}

/// Parse `[section] key` as `T` if present.
fn parse_value<T: FromStr>(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<Option<T>, BacktestError> {
    match config.get_string(section, key) {
        None => Ok(None),
        Some(raw) => raw.trim().parse::<T>().map(Some).map_err(|_| {
            BacktestError::invalid(section, key, format!("'{}' is not a valid number", raw.trim()))
        }),
    }
}

/// `[backtest] key` as a timeframe, or `default` when absent.
pub fn timeframe_value(
    config: &dyn ConfigPort,
    key: &str,
    default: Timeframe,
) -> Result<Timeframe, BacktestError> {
    match config.get_string("backtest", key) {
        None => Ok(default),
        Some(label) => {
            Timeframe::parse(&label).map_err(|e| BacktestError::invalid("backtest", key, e.to_string()))
        }
    }
}

fn validate_timeframes(config: &dyn ConfigPort) -> Result<(), BacktestError> {
    timeframe_value(config, "lower_tf", Timeframe::minutes(5))?;
    timeframe_value(config, "higher_tf", Timeframe::minutes(30))?;
    Ok(())
}

fn validate_positive(config: &dyn ConfigPort, section: &str, key: &str) -> Result<(), BacktestError> {
    match parse_value::<f64>(config, section, key)? {
        Some(value) if !(value.is_finite() && value > 0.0) => Err(BacktestError::invalid(
            section,
            key,
            format!("{key} must be positive"),
        )),
        _ => Ok(()),
    }
}

fn validate_period(config: &dyn ConfigPort, key: &str) -> Result<(), BacktestError> {
    match parse_value::<i64>(config, "strategy", key)? {
        Some(value) if value < 1 => Err(BacktestError::invalid(
            "strategy",
            key,
            format!("{key} must be at least 1"),
        )),
        _ => Ok(()),
    }
}

fn validate_risk_free_rate(config: &dyn ConfigPort) -> Result<(), BacktestError> {
    match parse_value::<f64>(config, "backtest", "risk_free_rate")? {
        Some(value) if !(0.0..1.0).contains(&value) => Err(BacktestError::invalid(
            "backtest",
            "risk_free_rate",
            "risk_free_rate must be between 0 and 1",
        )),
        _ => Ok(()),
    }
}

fn validate_csv_path(config: &dyn ConfigPort) -> Result<(), BacktestError> {
    match config.get_string("backtest", "csv_path") {
        Some(s) if s.trim().is_empty() => Err(BacktestError::invalid(
            "backtest",
            "csv_path",
            "csv_path must not be empty",
        )),
        _ => Ok(()),
    }
}
