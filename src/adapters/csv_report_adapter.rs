//! CSV export of the trade log, equity curve, per-bar returns and summary.

use crate::domain::backtest::BacktestResult;
use crate::domain::error::BacktestError;
use crate::domain::metrics::Metrics;
use crate::domain::position::ExitReason;
use crate::ports::report_port::ReportPort;
use chrono::NaiveDateTime;
use serde::Serialize;
use std::fs;
use std::io;
use std::path::Path;
use tracing::info;

pub const TRADES_FILE: &str = "trades.csv";
pub const EQUITY_FILE: &str = "equity.csv";
pub const RETURNS_FILE: &str = "returns.csv";
pub const SUMMARY_FILE: &str = "summary.csv";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

fn stamp(ts: NaiveDateTime) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

#[derive(Debug, Serialize)]
struct TradeRow {
    entry_time: String,
    exit_time: String,
    direction: String,
    size: f64,
    entry_price: f64,
    stop_price: f64,
    target_price: f64,
    exit_price: f64,
    exit_reason: String,
    pnl: f64,
    pnl_percent: f64,
}

#[derive(Debug, Serialize)]
struct EquityRow {
    timestamp: String,
    capital: f64,
}

#[derive(Debug, Serialize)]
struct ReturnRow {
    timestamp: String,
    value: f64,
}

#[derive(Debug, Serialize)]
struct SummaryRow {
    metric: &'static str,
    value: String,
}

fn summary_rows(m: &Metrics) -> Vec<SummaryRow> {
    let mut rows = vec![
        ("total_trades", m.total_trades.to_string()),
        ("trades_won", m.trades_won.to_string()),
        ("trades_lost", m.trades_lost.to_string()),
        ("trades_breakeven", m.trades_breakeven.to_string()),
        ("long_trades", m.long_trades.to_string()),
        ("short_trades", m.short_trades.to_string()),
        ("total_signals", m.total_signals.to_string()),
        ("win_rate", m.win_rate.to_string()),
        ("total_pnl", m.total_pnl.to_string()),
        ("avg_pnl", m.avg_pnl.to_string()),
        ("profit_factor", m.profit_factor.to_string()),
        ("avg_win", m.avg_win.to_string()),
        ("avg_loss", m.avg_loss.to_string()),
        ("win_loss_ratio", m.win_loss_ratio.to_string()),
        ("longest_win_streak", m.longest_win_streak.to_string()),
        ("longest_loss_streak", m.longest_loss_streak.to_string()),
        ("initial_capital", m.initial_capital.to_string()),
        ("final_capital", m.final_capital.to_string()),
        ("total_return", m.total_return.to_string()),
        ("annualized_return", m.annualized_return.to_string()),
        ("max_drawdown", m.max_drawdown.to_string()),
        ("sharpe_ratio", m.sharpe_ratio.to_string()),
        ("sortino_ratio", m.sortino_ratio.to_string()),
        ("time_in_market", m.time_in_market.to_string()),
        (
            "avg_trade_duration_secs",
            m.avg_trade_duration.num_seconds().to_string(),
        ),
    ];
    for (reason, count) in &m.exit_reasons {
        let metric = match reason {
            ExitReason::StopLoss => "exits_stop_loss",
            ExitReason::TakeProfit => "exits_take_profit",
            ExitReason::TrendFlip => "exits_trend_flip",
            ExitReason::EndOfData => "exits_end_of_data",
        };
        rows.push((metric, count.to_string()));
    }
    rows.into_iter()
        .map(|(metric, value)| SummaryRow { metric, value })
        .collect()
}

/// Report output failures are I/O errors, whatever stage of the write they
/// come from.
fn write_error(path: &Path, err: csv::Error) -> BacktestError {
    let io = match err.into_kind() {
        csv::ErrorKind::Io(io) => io,
        kind => io::Error::other(format!("{}: {kind:?}", path.display())),
    };
    BacktestError::Io(io)
}

fn write_rows<T: Serialize>(path: &Path, rows: impl IntoIterator<Item = T>) -> Result<(), BacktestError> {
    let mut wtr = csv::Writer::from_path(path).map_err(|e| write_error(path, e))?;
    for row in rows {
        wtr.serialize(row).map_err(|e| write_error(path, e))?;
    }
    wtr.flush()?;
    Ok(())
}

/// Writes `trades.csv`, `equity.csv`, `returns.csv` and `summary.csv`.
pub struct CsvReportAdapter;

impl ReportPort for CsvReportAdapter {
    fn write(
        &self,
        result: &BacktestResult,
        metrics: &Metrics,
        output_dir: &Path,
    ) -> Result<(), BacktestError> {
        fs::create_dir_all(output_dir)?;

        write_rows(
            &output_dir.join(TRADES_FILE),
            result.trades().iter().map(|t| TradeRow {
                entry_time: stamp(t.entry_time),
                exit_time: stamp(t.exit_time),
                direction: t.direction.to_string(),
                size: t.size,
                entry_price: t.entry_price,
                stop_price: t.stop_price,
                target_price: t.target_price,
                exit_price: t.exit_price,
                exit_reason: t.exit_reason.to_string(),
                pnl: t.pnl,
                pnl_percent: t.pnl_percent,
            }),
        )?;

        write_rows(
            &output_dir.join(EQUITY_FILE),
            result.equity_curve().iter().map(|p| EquityRow {
                timestamp: stamp(p.timestamp),
                capital: p.capital,
            }),
        )?;

        write_rows(
            &output_dir.join(RETURNS_FILE),
            result.returns().iter().map(|r| ReturnRow {
                timestamp: stamp(r.timestamp),
                value: r.value,
            }),
        )?;

        write_rows(&output_dir.join(SUMMARY_FILE), summary_rows(metrics))?;

        info!(dir = %output_dir.display(), trades = result.trades().len(), "report written");
        Ok(())
    }
}
