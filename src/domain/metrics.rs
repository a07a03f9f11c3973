//! Performance metrics computed from a finished run.
//!
//! Ratios and percentages are stored as fractions (`0.25` means 25%).

use super::backtest::BacktestResult;
use super::ledger::{EquityPoint, ReturnPoint};
use super::position::{Direction, ExitReason};
use super::timeframe::Timeframe;
use chrono::TimeDelta;
use std::collections::BTreeMap;

const DAYS_PER_YEAR: f64 = 365.0;

#[derive(Debug, Clone, PartialEq)]
pub struct Metrics {
    pub total_trades: usize,
    pub trades_won: usize,
    pub trades_lost: usize,
    pub trades_breakeven: usize,
    pub long_trades: usize,
    pub short_trades: usize,
    pub total_signals: usize,
    pub win_rate: f64,
    pub total_pnl: f64,
    pub avg_pnl: f64,
    pub gross_profit: f64,
    pub gross_loss: f64,
    /// Profit from winners relative to initial capital.
    pub winners_return: f64,
    /// Loss from losers relative to initial capital, as a positive number.
    pub losers_return: f64,
    pub profit_factor: f64,
    pub avg_win: f64,
    pub avg_loss: f64,
    pub win_loss_ratio: f64,
    pub largest_win: f64,
    pub largest_loss: f64,
    pub longest_win_streak: usize,
    pub longest_loss_streak: usize,
    pub exit_reasons: BTreeMap<ExitReason, usize>,
    pub initial_capital: f64,
    pub final_capital: f64,
    pub total_return: f64,
    pub annualized_return: f64,
    pub max_drawdown: f64,
    pub sharpe_ratio: f64,
    pub sortino_ratio: f64,
    pub time_in_market: f64,
    pub avg_trade_duration: TimeDelta,
}

fn ratio(num: f64, den: f64) -> f64 {
    if den != 0.0 { num / den } else { 0.0 }
}

impl Metrics {
    /// `lower_tf` sets the annualisation of per-bar returns; `risk_free_rate`
    /// is an annual rate.
    pub fn compute(result: &BacktestResult, lower_tf: Timeframe, risk_free_rate: f64) -> Self {
        let trades = result.trades();
        let initial_capital = result.initial_capital();
        let final_capital = result.final_capital();

        let mut trades_won = 0usize;
        let mut trades_lost = 0usize;
        let mut trades_breakeven = 0usize;
        let mut long_trades = 0usize;
        let mut gross_profit = 0.0_f64;
        let mut gross_loss = 0.0_f64;
        let mut largest_win = 0.0_f64;
        let mut largest_loss = 0.0_f64;
        let mut win_streak = 0usize;
        let mut loss_streak = 0usize;
        let mut longest_win_streak = 0usize;
        let mut longest_loss_streak = 0usize;
        let mut exit_reasons = BTreeMap::new();
        let mut total_duration = TimeDelta::zero();

        for trade in trades {
            let pnl = trade.pnl;
            if trade.is_win() {
                trades_won += 1;
                gross_profit += pnl;
                largest_win = largest_win.max(pnl);
                win_streak += 1;
                loss_streak = 0;
            } else if trade.is_loss() {
                trades_lost += 1;
                gross_loss += pnl.abs();
                largest_loss = largest_loss.max(pnl.abs());
                loss_streak += 1;
                win_streak = 0;
            } else {
                trades_breakeven += 1;
                win_streak = 0;
                loss_streak = 0;
            }
            longest_win_streak = longest_win_streak.max(win_streak);
            longest_loss_streak = longest_loss_streak.max(loss_streak);

            if trade.direction == Direction::Long {
                long_trades += 1;
            }
            *exit_reasons.entry(trade.exit_reason).or_insert(0) += 1;
            total_duration += trade.duration();
        }

        let total_trades = trades.len();
        let total_pnl = gross_profit - gross_loss;

        let profit_factor = if gross_loss > 0.0 {
            gross_profit / gross_loss
        } else if gross_profit > 0.0 {
            f64::INFINITY
        } else {
            0.0
        };

        let avg_win = ratio(gross_profit, trades_won as f64);
        let avg_loss = ratio(gross_loss, trades_lost as f64);

        let avg_trade_duration = if total_trades > 0 {
            TimeDelta::seconds(total_duration.num_seconds() / total_trades as i64)
        } else {
            TimeDelta::zero()
        };

        let total_return = ratio(final_capital - initial_capital, initial_capital);
        let annualized_return = annualize(total_return, result.equity_curve());

        let periods_per_year = lower_tf.periods_per_year();
        let (sharpe_ratio, sortino_ratio) =
            compute_risk_adjusted(result.returns(), risk_free_rate, periods_per_year);

        Metrics {
            total_trades,
            trades_won,
            trades_lost,
            trades_breakeven,
            long_trades,
            short_trades: total_trades - long_trades,
            total_signals: result.signal_counts.total(),
            win_rate: ratio(trades_won as f64, total_trades as f64),
            total_pnl,
            avg_pnl: ratio(total_pnl, total_trades as f64),
            gross_profit,
            gross_loss,
            winners_return: ratio(gross_profit, initial_capital),
            losers_return: ratio(gross_loss, initial_capital),
            profit_factor,
            avg_win,
            avg_loss,
            win_loss_ratio: ratio(avg_win, avg_loss),
            largest_win,
            largest_loss,
            longest_win_streak,
            longest_loss_streak,
            exit_reasons,
            initial_capital,
            final_capital,
            total_return,
            annualized_return,
            max_drawdown: compute_drawdown(initial_capital, result.equity_curve()),
            sharpe_ratio,
            sortino_ratio,
            time_in_market: ratio(result.bars_in_market as f64, result.bar_count as f64),
            avg_trade_duration,
        }
    }

    pub fn exit_count(&self, reason: ExitReason) -> usize {
        self.exit_reasons.get(&reason).copied().unwrap_or(0)
    }
}

/// Compound `total_return` over the calendar span of the equity curve.
fn annualize(total_return: f64, equity_curve: &[EquityPoint]) -> f64 {
    let (Some(first), Some(last)) = (equity_curve.first(), equity_curve.last()) else {
        return 0.0;
    };
    let days = (last.timestamp - first.timestamp).num_seconds() as f64 / 86_400.0;
    let years = days / DAYS_PER_YEAR;
    let growth = 1.0 + total_return;
    if years > 0.0 && growth > 0.0 && growth.is_finite() {
        growth.powf(1.0 / years) - 1.0
    } else {
        0.0
    }
}

/// Largest fall from a running peak, as a fraction of that peak.
fn compute_drawdown(initial_capital: f64, equity_curve: &[EquityPoint]) -> f64 {
    let mut peak = initial_capital;
    let mut max_dd = 0.0_f64;

    for point in equity_curve {
        if point.capital > peak {
            peak = point.capital;
        } else if peak > 0.0 {
            max_dd = max_dd.max((peak - point.capital) / peak);
        }
    }

    max_dd
}

fn compute_risk_adjusted(
    returns: &[ReturnPoint],
    risk_free_rate: f64,
    periods_per_year: f64,
) -> (f64, f64) {
    if returns.len() < 2 || periods_per_year <= 0.0 {
        return (0.0, 0.0);
    }

    let n = returns.len() as f64;
    let period_rf = risk_free_rate / periods_per_year;
    let mean: f64 = returns.iter().map(|r| r.value).sum::<f64>() / n;
    let variance: f64 = returns
        .iter()
        .map(|r| (r.value - mean).powi(2))
        .sum::<f64>()
        / n;
    let stddev = variance.sqrt();
    let excess_return = mean - period_rf;
    let scale = periods_per_year.sqrt();

    let sharpe = if stddev > 0.0 {
        excess_return / stddev * scale
    } else {
        0.0
    };

    let downside: f64 = returns
        .iter()
        .filter(|r| r.value < period_rf)
        .map(|r| (r.value - period_rf).powi(2))
        .sum();
    let downside_stddev = (downside / n).sqrt();

    let sortino = if downside_stddev > 0.0 {
        excess_return / downside_stddev * scale
    } else {
        0.0
    };

    (sharpe, sortino)
}
