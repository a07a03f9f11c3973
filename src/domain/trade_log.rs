//! Append-only record of closed trades.

use super::position::Trade;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TradeLog {
    trades: Vec<Trade>,
}

impl TradeLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, trade: Trade) {
        self.trades.push(trade);
    }

    pub fn len(&self) -> usize {
        self.trades.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trades.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Trade> {
        self.trades.iter()
    }

    pub fn as_slice(&self) -> &[Trade] {
        &self.trades
    }

    pub fn total_pnl(&self) -> f64 {
        self.trades.iter().map(|t| t.pnl).sum()
    }
}

impl<'a> IntoIterator for &'a TradeLog {
    type Item = &'a Trade;
    type IntoIter = std::slice::Iter<'a, Trade>;

    fn into_iter(self) -> Self::IntoIter {
        self.trades.iter()
    }
}
