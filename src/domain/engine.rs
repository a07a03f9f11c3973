//! Position state machine: the bar-by-bar simulation loop.
//!
//! Per lower bar, in order:
//! 1. exit check for an open position (stop, then target, then trend flip)
//! 2. entry check when flat and a signal fires on this bar
//! 3. forced `EndOfData` close on the final bar
//! 4. end-of-bar equity point from realized capital

use tracing::{debug, info};

use super::align::align;
use super::backtest::{BacktestConfig, BacktestResult};
use super::error::BacktestError;
use super::indicator::EmaPair;
use super::ledger::{EquityLedger, settle};
use super::ohlcv::Bar;
use super::position::{Direction, ExitReason, Position, RiskParams, Trade};
use super::signal::{SignalCounts, scan};
use super::timeframe::Timeframe;
use super::timeframe_data::TimeframeData;
use super::trade_log::TradeLog;
use chrono::NaiveDateTime;

/// Mutable state owned by a single run.
#[derive(Debug)]
pub struct SimulationContext {
    position: Option<Position>,
    ledger: EquityLedger,
    trade_log: TradeLog,
    signal_counts: SignalCounts,
    bars_in_market: usize,
}

impl SimulationContext {
    pub fn new(initial_capital: f64) -> Self {
        SimulationContext {
            position: None,
            ledger: EquityLedger::new(initial_capital),
            trade_log: TradeLog::new(),
            signal_counts: SignalCounts::default(),
            bars_in_market: 0,
        }
    }

    pub fn position(&self) -> Option<&Position> {
        self.position.as_ref()
    }

    pub fn capital(&self) -> f64 {
        self.ledger.capital()
    }

    /// Open a position at the bar's close. Fails if one is already open.
    pub fn open(
        &mut self,
        direction: Direction,
        bar: &Bar,
        risk: &RiskParams,
    ) -> Result<(), BacktestError> {
        if let Some(existing) = &self.position {
            return Err(BacktestError::SimulationInvariant {
                reason: format!(
                    "attempted to open a {} position at {} while a {} position from {} is open",
                    direction, bar.timestamp, existing.direction, existing.entry_time
                ),
            });
        }
        let position = Position::open(direction, bar.close, bar.timestamp, risk)?;
        debug!(
            direction = %position.direction,
            entry = position.entry_price,
            stop = position.stop_price,
            target = position.target_price,
            time = %position.entry_time,
            "position opened"
        );
        self.position = Some(position);
        Ok(())
    }

    /// Close the open position, settle it into capital and log the trade.
    pub fn close(
        &mut self,
        exit_price: f64,
        exit_time: NaiveDateTime,
        exit_reason: ExitReason,
    ) -> Result<&Trade, BacktestError> {
        let position = self
            .position
            .take()
            .ok_or_else(|| BacktestError::SimulationInvariant {
                reason: format!("attempted to close at {exit_time} with no open position"),
            })?;

        let settlement = settle(&position, exit_price);
        let capital = self.ledger.apply(&settlement, exit_time);

        debug!(
            direction = %position.direction,
            exit = exit_price,
            reason = %exit_reason,
            pnl = settlement.pnl,
            capital,
            time = %exit_time,
            "position closed"
        );

        self.trade_log.append(Trade {
            direction: position.direction,
            entry_price: position.entry_price,
            entry_time: position.entry_time,
            size: position.size,
            stop_price: position.stop_price,
            target_price: position.target_price,
            exit_price,
            exit_time,
            exit_reason,
            pnl: settlement.pnl,
            pnl_percent: settlement.pnl_percent,
        });
        self.trade_log
            .as_slice()
            .last()
            .ok_or_else(|| BacktestError::SimulationInvariant {
                reason: "trade log empty after append".into(),
            })
    }

    fn finish(self, bar_count: usize) -> BacktestResult {
        BacktestResult {
            trade_log: self.trade_log,
            ledger: self.ledger,
            signal_counts: self.signal_counts,
            bars_in_market: self.bars_in_market,
            bar_count,
        }
    }
}

/// Resample raw rows into both timeframes and compute their EMAs.
///
/// The two preparations share no state and run on the rayon pool.
pub fn prepare_timeframes(
    raw: &[Bar],
    config: &BacktestConfig,
) -> Result<(TimeframeData, TimeframeData), BacktestError> {
    let (lower, higher) = rayon::join(
        || TimeframeData::prepare(raw, config.lower_tf, config.lower_ema()),
        || TimeframeData::prepare(raw, config.higher_tf, config.higher_ema()),
    );
    Ok((lower?, higher?))
}

/// Reject a series built for another timeframe or EMA pair than the run's.
fn check_series(
    data: &TimeframeData,
    role: &str,
    timeframe: Timeframe,
    ema: EmaPair,
    at: NaiveDateTime,
) -> Result<(), BacktestError> {
    if data.timeframe != timeframe || data.ema != ema {
        return Err(BacktestError::integrity(
            at,
            format!(
                "{role} series is {} {} but the run expects {} {}",
                data.timeframe, data.ema, timeframe, ema
            ),
        ));
    }
    Ok(())
}

/// Run the strategy over `lower` bars filtered by the `higher` trend.
///
/// Configuration and input integrity are checked before the first bar; any
/// failure returns `Err` with no partial result.
pub fn run_backtest(
    lower: &TimeframeData,
    higher: &TimeframeData,
    config: &BacktestConfig,
) -> Result<BacktestResult, BacktestError> {
    config.validate()?;
    lower.validate()?;
    higher.validate()?;

    if lower.bars.is_empty() {
        return Err(BacktestError::NoData {
            origin: format!("{} series", lower.timeframe),
        });
    }
    let first = lower.bars[0].timestamp;
    check_series(lower, "lower", config.lower_tf, config.lower_ema(), first)?;
    check_series(higher, "higher", config.higher_tf, config.higher_ema(), first)?;

    let aligned = align(lower, higher)?;
    let risk = config.risk_params();
    let mut signals = scan(&lower.indicators, &aligned).peekable();
    let mut ctx = SimulationContext::new(config.initial_capital);
    let last = lower.bars.len() - 1;

    info!(
        lower_bars = lower.bars.len(),
        higher_bars = higher.bars.len(),
        lower_tf = %lower.timeframe,
        higher_tf = %higher.timeframe,
        "simulation started"
    );

    for (i, bar) in lower.bars.iter().enumerate() {
        let trend = aligned[i].trend;

        let exit = ctx
            .position
            .as_ref()
            .and_then(|p| p.check_exit(bar, trend));
        if let Some((price, reason)) = exit {
            ctx.close(price, bar.timestamp, reason)?;
        }

        if let Some(signal) = signals.next_if(|s| s.index == i) {
            ctx.signal_counts.record(signal.direction);
            if ctx.position.is_none() {
                ctx.open(signal.direction, bar, &risk)?;
            }
        }

        if i == last && ctx.position.is_some() {
            ctx.close(bar.close, bar.timestamp, ExitReason::EndOfData)?;
        }

        if ctx.position.is_some() {
            ctx.bars_in_market += 1;
        }
        ctx.ledger.record_bar(bar.timestamp);
    }

    let result = ctx.finish(lower.bars.len());
    info!(
        trades = result.trade_log.len(),
        signals = result.signal_counts.total(),
        final_capital = result.final_capital(),
        "simulation finished"
    );
    Ok(result)
}
