//! Core domain types and logic.

pub mod align;
pub mod backtest;
pub mod config_validation;
pub mod engine;
pub mod error;
pub mod indicator;
pub mod ledger;
pub mod metrics;
pub mod ohlcv;
pub mod position;
pub mod resample;
pub mod signal;
pub mod timeframe;
pub mod timeframe_data;
pub mod trade_log;
pub mod trend;
