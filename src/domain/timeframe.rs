//! Bar resolutions such as `5T`, `30min`, `4h` or `1D`.

use chrono::{NaiveDateTime, TimeDelta};
use std::fmt;
use std::str::FromStr;

const SECONDS_PER_YEAR: f64 = 365.0 * 86_400.0;

/// A timeframe label that could not be understood.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("invalid timeframe '{label}': {message}")]
pub struct TimeframeParseError {
    pub label: String,
    pub message: String,
}

/// A fixed bar duration, stored in whole seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timeframe {
    seconds: i64,
}

impl Timeframe {
    pub fn from_seconds(seconds: i64) -> Option<Self> {
        (seconds > 0).then_some(Timeframe { seconds })
    }

    pub fn minutes(n: i64) -> Self {
        Timeframe { seconds: n * 60 }
    }

    pub fn hours(n: i64) -> Self {
        Timeframe { seconds: n * 3_600 }
    }

    pub fn seconds(&self) -> i64 {
        self.seconds
    }

    pub fn duration(&self) -> TimeDelta {
        TimeDelta::seconds(self.seconds)
    }

    /// Close time of a bar labelled with its open time.
    pub fn close_time(&self, open: NaiveDateTime) -> NaiveDateTime {
        open + self.duration()
    }

    /// Left edge of the bucket containing `ts`, with buckets anchored at `origin`.
    pub fn bucket_start(&self, ts: NaiveDateTime, origin: NaiveDateTime) -> NaiveDateTime {
        let offset = (ts - origin).num_seconds();
        let buckets = offset.div_euclid(self.seconds);
        origin + TimeDelta::seconds(buckets * self.seconds)
    }

    /// Number of bars of this size in a 365-day year.
    pub fn periods_per_year(&self) -> f64 {
        SECONDS_PER_YEAR / self.seconds as f64
    }

    pub fn parse(label: &str) -> Result<Self, TimeframeParseError> {
        let err = |message: &str| TimeframeParseError {
            label: label.to_string(),
            message: message.to_string(),
        };

        let trimmed = label.trim();
        let split = trimmed
            .find(|c: char| !c.is_ascii_digit())
            .ok_or_else(|| err("missing unit"))?;
        let (count, unit) = trimmed.split_at(split);

        let count: i64 = if count.is_empty() {
            1
        } else {
            count.parse().map_err(|_| err("invalid count"))?
        };
        if count <= 0 {
            return Err(err("count must be positive"));
        }

        if unit == "M" {
            return Err(err("calendar-month timeframes are not supported"));
        }

        let unit_seconds = match unit.to_ascii_lowercase().as_str() {
            "s" | "sec" => 1,
            "t" | "m" | "min" => 60,
            "h" | "hr" | "hour" => 3_600,
            "d" | "day" => 86_400,
            "w" | "week" => 604_800,
            _ => return Err(err("unknown unit")),
        };

        count
            .checked_mul(unit_seconds)
            .and_then(Timeframe::from_seconds)
            .ok_or_else(|| err("duration out of range"))
    }
}

impl FromStr for Timeframe {
    type Err = TimeframeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Timeframe::parse(s)
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = self.seconds;
        if s % 604_800 == 0 {
            write!(f, "{}W", s / 604_800)
        } else if s % 86_400 == 0 {
            write!(f, "{}D", s / 86_400)
        } else if s % 3_600 == 0 {
            write!(f, "{}h", s / 3_600)
        } else if s % 60 == 0 {
            write!(f, "{}min", s / 60)
        } else {
            write!(f, "{}s", s)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    #[test]
    fn parses_pandas_style_labels() {
        assert_eq!(Timeframe::parse("5T").unwrap().seconds(), 300);
        assert_eq!(Timeframe::parse("30T").unwrap().seconds(), 1_800);
        assert_eq!(Timeframe::parse("30min").unwrap().seconds(), 1_800);
        assert_eq!(Timeframe::parse("4h").unwrap().seconds(), 14_400);
        assert_eq!(Timeframe::parse("4H").unwrap().seconds(), 14_400);
        assert_eq!(Timeframe::parse("1D").unwrap().seconds(), 86_400);
        assert_eq!(Timeframe::parse("15s").unwrap().seconds(), 15);
    }

    #[test]
    fn bare_unit_means_one() {
        assert_eq!(Timeframe::parse("h").unwrap(), Timeframe::hours(1));
        assert_eq!(Timeframe::parse("T").unwrap(), Timeframe::minutes(1));
    }

    #[test]
    fn rejects_bad_labels() {
        assert!(Timeframe::parse("").is_err());
        assert!(Timeframe::parse("15").is_err());
        assert!(Timeframe::parse("0h").is_err());
        assert!(Timeframe::parse("3x").is_err());
        assert!(Timeframe::parse("1M").is_err());
    }

    #[test]
    fn display_uses_largest_whole_unit() {
        assert_eq!(Timeframe::minutes(30).to_string(), "30min");
        assert_eq!(Timeframe::hours(4).to_string(), "4h");
        assert_eq!(Timeframe::hours(24).to_string(), "1D");
        assert_eq!(Timeframe::from_seconds(45).unwrap().to_string(), "45s");
    }

    #[test]
    fn ordering_follows_duration() {
        assert!(Timeframe::minutes(30) < Timeframe::hours(4));
    }

    #[test]
    fn close_time_adds_duration() {
        assert_eq!(Timeframe::hours(4).close_time(at(8, 0)), at(12, 0));
    }

    #[test]
    fn bucket_start_floors_to_grid() {
        let origin = at(0, 0);
        let tf = Timeframe::minutes(30);
        assert_eq!(tf.bucket_start(at(9, 0), origin), at(9, 0));
        assert_eq!(tf.bucket_start(at(9, 29), origin), at(9, 0));
        assert_eq!(tf.bucket_start(at(9, 30), origin), at(9, 30));
        assert_eq!(Timeframe::hours(4).bucket_start(at(11, 59), origin), at(8, 0));
    }

    #[test]
    fn periods_per_year_for_daily() {
        assert!((Timeframe::parse("1D").unwrap().periods_per_year() - 365.0).abs() < 1e-9);
    }
}
