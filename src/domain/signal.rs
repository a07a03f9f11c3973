//! EMA crossover detection on the lower timeframe, gated by the aligned trend.

use crate::domain::align::AlignedContext;
use crate::domain::indicator::IndicatorPoint;
use crate::domain::position::Direction;
use crate::domain::trend::Trend;
use chrono::NaiveDateTime;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Signal {
    pub timestamp: NaiveDateTime,
    /// Index of the lower bar the signal fires on.
    pub index: usize,
    pub direction: Direction,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SignalCounts {
    pub long: usize,
    pub short: usize,
}

impl SignalCounts {
    pub fn record(&mut self, direction: Direction) {
        match direction {
            Direction::Long => self.long += 1,
            Direction::Short => self.short += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.long + self.short
    }
}

/// Crossover direction between two consecutive defined points, if any.
pub fn crossover(prev: &IndicatorPoint, curr: &IndicatorPoint) -> Option<Direction> {
    let (ps, pl) = prev.values()?;
    let (cs, cl) = curr.values()?;
    if ps <= pl && cs > cl {
        Some(Direction::Long)
    } else if ps >= pl && cs < cl {
        Some(Direction::Short)
    } else {
        None
    }
}

fn sanctioned(direction: Direction, trend: Trend) -> bool {
    matches!(
        (direction, trend),
        (Direction::Long, Trend::Bullish) | (Direction::Short, Trend::Bearish)
    )
}

/// Lazy, single-pass scan over lower-timeframe indicator points.
///
/// Candidates whose direction disagrees with the aligned trend are dropped,
/// not deferred.
pub struct SignalScanner<'a> {
    points: &'a [IndicatorPoint],
    aligned: &'a [AlignedContext],
    next: usize,
}

impl<'a> Iterator for SignalScanner<'a> {
    type Item = Signal;

    fn next(&mut self) -> Option<Signal> {
        let end = self.points.len().min(self.aligned.len());
        while self.next < end {
            let i = self.next;
            self.next += 1;
            if i == 0 {
                continue;
            }
            let Some(direction) = crossover(&self.points[i - 1], &self.points[i]) else {
                continue;
            };
            if sanctioned(direction, self.aligned[i].trend) {
                return Some(Signal {
                    timestamp: self.points[i].timestamp,
                    index: i,
                    direction,
                });
            }
        }
        None
    }
}

pub fn scan<'a>(points: &'a [IndicatorPoint], aligned: &'a [AlignedContext]) -> SignalScanner<'a> {
    SignalScanner {
        points,
        aligned,
        next: 0,
    }
}
