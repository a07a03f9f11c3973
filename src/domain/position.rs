//! Open position, exit rules and the closed-trade record.

use crate::domain::error::BacktestError;
use crate::domain::ohlcv::Bar;
use crate::domain::trend::Trend;
use chrono::NaiveDateTime;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Long,
    Short,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Long => write!(f, "long"),
            Direction::Short => write!(f, "short"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ExitReason {
    StopLoss,
    TakeProfit,
    TrendFlip,
    EndOfData,
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitReason::StopLoss => write!(f, "stop_loss"),
            ExitReason::TakeProfit => write!(f, "take_profit"),
            ExitReason::TrendFlip => write!(f, "trend_flip"),
            ExitReason::EndOfData => write!(f, "end_of_data"),
        }
    }
}

/// Risk parameters applied at entry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RiskParams {
    pub risk_percent: f64,
    pub risk_reward_ratio: f64,
    pub lot_size: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub direction: Direction,
    pub entry_price: f64,
    pub entry_time: NaiveDateTime,
    pub size: f64,
    pub stop_price: f64,
    pub target_price: f64,
}

impl Position {
    /// Open at `entry_price`, deriving stop and target from `risk`.
    pub fn open(
        direction: Direction,
        entry_price: f64,
        entry_time: NaiveDateTime,
        risk: &RiskParams,
    ) -> Result<Self, BacktestError> {
        if !(risk.lot_size > 0.0) {
            return Err(BacktestError::SimulationInvariant {
                reason: format!("position size must be positive, got {}", risk.lot_size),
            });
        }

        let stop_price = match direction {
            Direction::Long => entry_price * (1.0 - risk.risk_percent / 100.0),
            Direction::Short => entry_price * (1.0 + risk.risk_percent / 100.0),
        };
        let risk_per_unit = (entry_price - stop_price).abs();
        let target_price = match direction {
            Direction::Long => entry_price + risk.risk_reward_ratio * risk_per_unit,
            Direction::Short => entry_price - risk.risk_reward_ratio * risk_per_unit,
        };

        Ok(Position {
            direction,
            entry_price,
            entry_time,
            size: risk.lot_size,
            stop_price,
            target_price,
        })
    }

    pub fn is_long(&self) -> bool {
        self.direction == Direction::Long
    }

    pub fn stop_hit(&self, bar: &Bar) -> bool {
        match self.direction {
            Direction::Long => bar.low <= self.stop_price,
            Direction::Short => bar.high >= self.stop_price,
        }
    }

    pub fn target_hit(&self, bar: &Bar) -> bool {
        match self.direction {
            Direction::Long => bar.high >= self.target_price,
            Direction::Short => bar.low <= self.target_price,
        }
    }

    /// True when `trend` points the other way from this position.
    pub fn is_against(&self, trend: Trend) -> bool {
        matches!(
            (self.direction, trend),
            (Direction::Long, Trend::Bearish) | (Direction::Short, Trend::Bullish)
        )
    }

    /// Exit price and reason for this bar, if any.
    ///
    /// Stop beats target when both are inside the bar; either beats a trend
    /// flip, which fills at the bar's close.
    pub fn check_exit(&self, bar: &Bar, trend: Trend) -> Option<(f64, ExitReason)> {
        if self.stop_hit(bar) {
            Some((self.stop_price, ExitReason::StopLoss))
        } else if self.target_hit(bar) {
            Some((self.target_price, ExitReason::TakeProfit))
        } else if self.is_against(trend) {
            Some((bar.close, ExitReason::TrendFlip))
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Trade {
    pub direction: Direction,
    pub entry_price: f64,
    pub entry_time: NaiveDateTime,
    pub size: f64,
    pub stop_price: f64,
    pub target_price: f64,
    pub exit_price: f64,
    pub exit_time: NaiveDateTime,
    pub exit_reason: ExitReason,
    pub pnl: f64,
    /// `pnl / (entry_price * size)`, as a fraction.
    pub pnl_percent: f64,
}

impl Trade {
    pub fn is_win(&self) -> bool {
        self.pnl > 0.0
    }

    pub fn is_loss(&self) -> bool {
        self.pnl < 0.0
    }

    pub fn duration(&self) -> chrono::TimeDelta {
        self.exit_time - self.entry_time
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::NaiveDate;

    fn at(h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 15)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    fn risk() -> RiskParams {
        RiskParams {
            risk_percent: 1.0,
            risk_reward_ratio: 2.0,
            lot_size: 1.0,
        }
    }

    fn bar(high: f64, low: f64, close: f64) -> Bar {
        Bar {
            timestamp: at(10),
            open: close,
            high,
            low,
            close,
            volume: 1.0,
        }
    }

    #[test]
    fn long_stop_and_target() {
        let pos = Position::open(Direction::Long, 100.0, at(9), &risk()).unwrap();
        assert_relative_eq!(pos.stop_price, 99.0);
        assert_relative_eq!(pos.target_price, 102.0);
        assert_relative_eq!(pos.size, 1.0);
    }

    #[test]
    fn short_stop_and_target() {
        let pos = Position::open(Direction::Short, 100.0, at(9), &risk()).unwrap();
        assert_relative_eq!(pos.stop_price, 101.0);
        assert_relative_eq!(pos.target_price, 98.0);
    }

    #[test]
    fn non_positive_size_is_invariant_violation() {
        let r = RiskParams {
            lot_size: 0.0,
            ..risk()
        };
        let err = Position::open(Direction::Long, 100.0, at(9), &r).unwrap_err();
        assert!(matches!(err, BacktestError::SimulationInvariant { .. }));
    }

    #[test]
    fn long_exit_on_stop() {
        let pos = Position::open(Direction::Long, 100.0, at(9), &risk()).unwrap();
        let exit = pos.check_exit(&bar(100.5, 98.5, 99.5), Trend::Bullish);
        assert_eq!(exit, Some((pos.stop_price, ExitReason::StopLoss)));
    }

    #[test]
    fn long_exit_on_target() {
        let pos = Position::open(Direction::Long, 100.0, at(9), &risk()).unwrap();
        let exit = pos.check_exit(&bar(102.5, 100.5, 102.0), Trend::Bullish);
        assert_eq!(exit, Some((pos.target_price, ExitReason::TakeProfit)));
    }

    #[test]
    fn both_inside_bar_resolves_to_stop() {
        let pos = Position::open(Direction::Long, 100.0, at(9), &risk()).unwrap();
        let exit = pos.check_exit(&bar(103.0, 98.0, 101.0), Trend::Bullish);
        assert_eq!(exit.unwrap().1, ExitReason::StopLoss);

        let short = Position::open(Direction::Short, 100.0, at(9), &risk()).unwrap();
        let exit = short.check_exit(&bar(103.0, 97.0, 99.0), Trend::Bearish);
        assert_eq!(exit, Some((short.stop_price, ExitReason::StopLoss)));
    }

    #[test]
    fn stop_beats_trend_flip() {
        let pos = Position::open(Direction::Long, 100.0, at(9), &risk()).unwrap();
        let exit = pos.check_exit(&bar(100.0, 98.0, 99.5), Trend::Bearish);
        assert_eq!(exit.unwrap().1, ExitReason::StopLoss);
    }

    #[test]
    fn trend_flip_closes_at_bar_close() {
        let pos = Position::open(Direction::Long, 100.0, at(9), &risk()).unwrap();
        let exit = pos.check_exit(&bar(100.8, 99.5, 100.3), Trend::Bearish);
        assert_eq!(exit, Some((100.3, ExitReason::TrendFlip)));
    }

    #[test]
    fn neutral_trend_does_not_flip() {
        let pos = Position::open(Direction::Short, 100.0, at(9), &risk()).unwrap();
        assert!(!pos.is_against(Trend::Neutral));
        assert!(pos.is_against(Trend::Bullish));
        assert_eq!(pos.check_exit(&bar(100.5, 99.5, 100.0), Trend::Neutral), None);
    }

    #[test]
    fn trade_outcome_follows_pnl_sign() {
        let trade = |pnl: f64| Trade {
            direction: Direction::Long,
            entry_price: 100.0,
            entry_time: at(10),
            size: 1.0,
            stop_price: 99.0,
            target_price: 102.0,
            exit_price: 100.0 + pnl,
            exit_time: at(11),
            exit_reason: ExitReason::TrendFlip,
            pnl,
            pnl_percent: pnl / 100.0,
        };
        assert!(trade(1.5).is_win() && !trade(1.5).is_loss());
        assert!(trade(-0.5).is_loss() && !trade(-0.5).is_win());
        assert!(!trade(0.0).is_win() && !trade(0.0).is_loss());
    }

    #[test]
    fn exit_reason_display() {
        assert_eq!(ExitReason::StopLoss.to_string(), "stop_loss");
        assert_eq!(ExitReason::EndOfData.to_string(), "end_of_data");
    }
}
