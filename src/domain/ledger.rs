//! Realized capital, equity curve and per-bar returns.

use chrono::NaiveDateTime;

use super::position::{Direction, Position};

#[derive(Debug, Clone, PartialEq)]
pub struct EquityPoint {
    pub timestamp: NaiveDateTime,
    pub capital: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReturnPoint {
    pub timestamp: NaiveDateTime,
    pub value: f64,
}

/// Realized outcome of closing `position` at some exit price.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Settlement {
    pub pnl: f64,
    pub pnl_percent: f64,
}

/// pnl = (exit - entry) * size for longs, negated for shorts.
pub fn settle(position: &Position, exit_price: f64) -> Settlement {
    let gross = (exit_price - position.entry_price) * position.size;
    let pnl = match position.direction {
        Direction::Long => gross,
        Direction::Short => -gross,
    };
    let notional = position.entry_price * position.size;
    let pnl_percent = if notional != 0.0 { pnl / notional } else { 0.0 };
    Settlement { pnl, pnl_percent }
}

/// Capital is never clamped; a negative balance is reported as-is.
#[derive(Debug, Clone, PartialEq)]
pub struct EquityLedger {
    pub initial_capital: f64,
    capital: f64,
    equity_curve: Vec<EquityPoint>,
    bar_returns: Vec<ReturnPoint>,
    last_bar_capital: Option<f64>,
}

impl EquityLedger {
    pub fn new(initial_capital: f64) -> Self {
        EquityLedger {
            initial_capital,
            capital: initial_capital,
            equity_curve: Vec::new(),
            bar_returns: Vec::new(),
            last_bar_capital: None,
        }
    }

    pub fn capital(&self) -> f64 {
        self.capital
    }

    /// Apply a settlement and record the post-trade equity point.
    pub fn apply(&mut self, settlement: &Settlement, timestamp: NaiveDateTime) -> f64 {
        self.capital += settlement.pnl;
        self.equity_curve.push(EquityPoint {
            timestamp,
            capital: self.capital,
        });
        self.capital
    }

    /// Record the end-of-bar equity point and that bar's return.
    pub fn record_bar(&mut self, timestamp: NaiveDateTime) {
        let value = match self.last_bar_capital {
            Some(prev) if prev != 0.0 => (self.capital - prev) / prev,
            _ => 0.0,
        };
        self.bar_returns.push(ReturnPoint { timestamp, value });
        self.equity_curve.push(EquityPoint {
            timestamp,
            capital: self.capital,
        });
        self.last_bar_capital = Some(self.capital);
    }

    pub fn equity_curve(&self) -> &[EquityPoint] {
        &self.equity_curve
    }

    pub fn bar_returns(&self) -> &[ReturnPoint] {
        &self.bar_returns
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

    fn position(direction: Direction, entry: f64, size: f64) -> Position {
        Position {
            direction,
            entry_price: entry,
            entry_time: at(9),
            size,
            stop_price: 0.0,
            target_price: 0.0,
        }
    }

    #[test]
    fn settle_long_profit() {
        let s = settle(&position(Direction::Long, 100.0, 0.5), 110.0);
        assert_relative_eq!(s.pnl, 5.0);
        assert_relative_eq!(s.pnl_percent, 0.1);
    }

    #[test]
    fn settle_short_profit() {
        let s = settle(&position(Direction::Short, 100.0, 2.0), 95.0);
        assert_relative_eq!(s.pnl, 10.0);
        assert_relative_eq!(s.pnl_percent, 0.05);
    }

    #[test]
    fn settle_short_loss() {
        let s = settle(&position(Direction::Short, 100.0, 1.0), 101.0);
        assert_relative_eq!(s.pnl, -1.0);
    }

    #[test]
    fn new_ledger() {
        let ledger = EquityLedger::new(500.0);
        assert_relative_eq!(ledger.capital(), 500.0);
        assert!(ledger.equity_curve().is_empty());
        assert!(ledger.bar_returns().is_empty());
    }

    #[test]
    fn apply_updates_capital_and_curve() {
        let mut ledger = EquityLedger::new(100.0);
        let new_capital = ledger.apply(
            &Settlement {
                pnl: -30.0,
                pnl_percent: -0.3,
            },
            at(10),
        );
        assert_relative_eq!(new_capital, 70.0);
        assert_eq!(ledger.equity_curve().len(), 1);
        assert_eq!(ledger.equity_curve()[0].timestamp, at(10));
    }

    #[test]
    fn capital_can_go_negative() {
        let mut ledger = EquityLedger::new(10.0);
        ledger.apply(
            &Settlement {
                pnl: -25.0,
                pnl_percent: -1.0,
            },
            at(10),
        );
        assert_relative_eq!(ledger.capital(), -15.0);
    }

    #[test]
    fn bar_returns_track_capital_change() {
        let mut ledger = EquityLedger::new(100.0);
        ledger.record_bar(at(9));
        ledger.apply(
            &Settlement {
                pnl: 10.0,
                pnl_percent: 0.1,
            },
            at(10),
        );
        ledger.record_bar(at(10));
        ledger.record_bar(at(11));

        let returns: Vec<f64> = ledger.bar_returns().iter().map(|r| r.value).collect();
        assert_eq!(returns.len(), 3);
        assert_relative_eq!(returns[0], 0.0);
        assert_relative_eq!(returns[1], 0.1);
        assert_relative_eq!(returns[2], 0.0);
        assert_eq!(ledger.equity_curve().len(), 4);
    }

    #[test]
    fn zero_capital_gives_zero_return() {
        let mut ledger = EquityLedger::new(0.0);
        ledger.record_bar(at(9));
        ledger.apply(
            &Settlement {
                pnl: 5.0,
                pnl_percent: 0.0,
            },
            at(10),
        );
        ledger.record_bar(at(10));
        assert_relative_eq!(ledger.bar_returns()[1].value, 0.0);
    }
}
