//! Backtest configuration record and run result.

use crate::domain::error::BacktestError;
use crate::domain::indicator::EmaPair;
use crate::domain::ledger::{EquityLedger, EquityPoint, ReturnPoint};
use crate::domain::position::{RiskParams, Trade};
use crate::domain::signal::SignalCounts;
use crate::domain::timeframe::Timeframe;
use crate::domain::trade_log::TradeLog;

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestConfig {
    pub lower_tf: Timeframe,
    pub higher_tf: Timeframe,
    pub lower_ema_short: usize,
    pub lower_ema_long: usize,
    pub higher_ema_short: usize,
    pub higher_ema_long: usize,
    pub risk_percent: f64,
    pub risk_reward_ratio: f64,
    pub initial_capital: f64,
    pub lot_size: f64,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        BacktestConfig {
            lower_tf: Timeframe::minutes(5),
            higher_tf: Timeframe::minutes(30),
            lower_ema_short: 9,
            lower_ema_long: 21,
            higher_ema_short: 9,
            higher_ema_long: 21,
            risk_percent: 1.0,
            risk_reward_ratio: 2.0,
            initial_capital: 500.0,
            lot_size: 0.1,
        }
    }
}

fn positive(value: f64, section: &str, key: &str) -> Result<(), BacktestError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(BacktestError::invalid(section, key, format!("{key} must be positive")))
    }
}

fn ema_periods(
    short: usize,
    long: usize,
    short_key: &str,
    long_key: &str,
) -> Result<(), BacktestError> {
    if short == 0 {
        return Err(BacktestError::invalid("strategy", short_key, "period must be positive"));
    }
    if long == 0 {
        return Err(BacktestError::invalid("strategy", long_key, "period must be positive"));
    }
    if short >= long {
        return Err(BacktestError::invalid(
            "strategy",
            short_key,
            format!("{short_key} ({short}) must be less than {long_key} ({long})"),
        ));
    }
    Ok(())
}

impl BacktestConfig {
    /// Reject contradictory or non-positive parameters before any simulation.
    pub fn validate(&self) -> Result<(), BacktestError> {
        if self.lower_tf >= self.higher_tf {
            return Err(BacktestError::invalid(
                "backtest",
                "higher_tf",
                format!(
                    "higher_tf ({}) must be longer than lower_tf ({})",
                    self.higher_tf, self.lower_tf
                ),
            ));
        }
        ema_periods(
            self.lower_ema_short,
            self.lower_ema_long,
            "lower_ema_short",
            "lower_ema_long",
        )?;
        ema_periods(
            self.higher_ema_short,
            self.higher_ema_long,
            "higher_ema_short",
            "higher_ema_long",
        )?;
        positive(self.risk_percent, "strategy", "risk_percent")?;
        if self.risk_percent >= 100.0 {
            return Err(BacktestError::invalid(
                "strategy",
                "risk_percent",
                "risk_percent must be below 100",
            ));
        }
        positive(self.risk_reward_ratio, "strategy", "risk_reward_ratio")?;
        positive(self.initial_capital, "backtest", "initial_capital")?;
        positive(self.lot_size, "backtest", "lot_size")?;
        Ok(())
    }

    pub fn lower_ema(&self) -> EmaPair {
        EmaPair {
            short: self.lower_ema_short,
            long: self.lower_ema_long,
        }
    }

    pub fn higher_ema(&self) -> EmaPair {
        EmaPair {
            short: self.higher_ema_short,
            long: self.higher_ema_long,
        }
    }

    pub fn risk_params(&self) -> RiskParams {
        RiskParams {
            risk_percent: self.risk_percent,
            risk_reward_ratio: self.risk_reward_ratio,
            lot_size: self.lot_size,
        }
    }
}

/// Everything a completed run hands to reporting.
#[derive(Debug, Clone, PartialEq)]
pub struct BacktestResult {
    pub trade_log: TradeLog,
    pub ledger: EquityLedger,
    pub signal_counts: SignalCounts,
    /// Bars that ended with a position open.
    pub bars_in_market: usize,
    pub bar_count: usize,
}

impl BacktestResult {
    pub fn trades(&self) -> &[Trade] {
        self.trade_log.as_slice()
    }

    pub fn equity_curve(&self) -> &[EquityPoint] {
        self.ledger.equity_curve()
    }

    pub fn returns(&self) -> &[ReturnPoint] {
        self.ledger.bar_returns()
    }

    pub fn initial_capital(&self) -> f64 {
        self.ledger.initial_capital
    }

    pub fn final_capital(&self) -> f64 {
        self.ledger.capital()
    }
}
