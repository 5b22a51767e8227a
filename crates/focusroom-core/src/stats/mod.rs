//! Windowed rollups, comparisons and score input gathering.

mod report;
mod rollup;

pub use report::{AggregateStats, Reporter, ScoreReport};
pub use rollup::{
    bucket_by_day, compare, most_productive_hour, Comparison, DailyRollup, MetricComparison,
    MetricTotals,
};

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, Duration, Months, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::calendar::DateRange;

/// Reporting period. Weeks start on Monday; months are calendar months.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Period {
    Day,
    Week,
    Month,
}

impl Period {
    /// The window of this period that contains `date`.
    pub fn window_containing(&self, date: NaiveDate) -> DateRange {
        match self {
            Period::Day => DateRange::new(date, date + Duration::days(1)),
            Period::Week => {
                let monday =
                    date - Duration::days(i64::from(date.weekday().num_days_from_monday()));
                DateRange::new(monday, monday + Duration::days(7))
            }
            Period::Month => {
                let first = date - Duration::days(i64::from(date.day0()));
                let next = first
                    .checked_add_months(Months::new(1))
                    .unwrap_or(NaiveDate::MAX);
                DateRange::new(first, next)
            }
        }
    }

    /// The window immediately before `window`.
    pub fn previous_window(&self, window: &DateRange) -> DateRange {
        match self {
            Period::Day | Period::Week => {
                DateRange::new(window.start - Duration::days(window.len_days()), window.start)
            }
            Period::Month => {
                let start = window
                    .start
                    .checked_sub_months(Months::new(1))
                    .unwrap_or(NaiveDate::MIN);
                DateRange::new(start, window.start)
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Period::Day => "day",
            Period::Week => "week",
            Period::Month => "month",
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Period {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "day" | "daily" => Ok(Period::Day),
            "week" | "weekly" => Ok(Period::Week),
            "month" | "monthly" => Ok(Period::Month),
            other => Err(format!("unknown period: {other}")),
        }
    }
}
