//! Day-streak counters per user and activity type.
//!
//! A streak counts consecutive calendar days (in the canonical zone) on which
//! a qualifying activity happened. Crediting is idempotent within a day and
//! never moves backwards.

mod tracker;

pub use tracker::{StreakStatus, StreakStore, StreakTracker, StreakUpdate};

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::calendar::day_gap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityType {
    TaskCompletion,
    FocusSession,
}

impl ActivityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityType::TaskCompletion => "task_completion",
            ActivityType::FocusSession => "focus_session",
        }
    }
}

impl fmt::Display for ActivityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActivityType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "task_completion" | "task" | "tasks" => Ok(ActivityType::TaskCompletion),
            "focus_session" | "focus" => Ok(ActivityType::FocusSession),
            other => Err(format!("unknown activity type: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Streak {
    pub id: String,
    pub user_id: String,
    pub activity_type: ActivityType,
    pub current: u32,
    pub longest: u32,
    pub last_credited: NaiveDate,
}

/// What a credit did to a streak.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreakChange {
    /// First qualifying event ever: row created at 1.
    Started,
    /// Consecutive day: current incremented.
    Extended,
    /// Already credited today.
    Unchanged,
    /// One or more days were missed: current back to 1.
    Reset,
    /// Today precedes the last credited date. Counters untouched.
    ClockAnomaly,
}

impl StreakChange {
    pub fn wrote(&self) -> bool {
        matches!(
            self,
            StreakChange::Started | StreakChange::Extended | StreakChange::Reset
        )
    }
}

impl Streak {
    pub fn start(user_id: &str, activity_type: ActivityType, today: NaiveDate) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            activity_type,
            current: 1,
            longest: 1,
            last_credited: today,
        }
    }

    /// Credit `today` against this streak.
    pub fn credit(&mut self, today: NaiveDate) -> StreakChange {
        match day_gap(self.last_credited, today) {
            0 => StreakChange::Unchanged,
            1 => {
                self.current += 1;
                self.longest = self.longest.max(self.current);
                self.last_credited = today;
                StreakChange::Extended
            }
            gap if gap > 1 => {
                self.current = 1;
                self.last_credited = today;
                StreakChange::Reset
            }
            _ => StreakChange::ClockAnomaly,
        }
    }

    /// Current count as of `today`: zero once a full day has been missed.
    pub fn effective_current(&self, today: NaiveDate) -> u32 {
        match day_gap(self.last_credited, today) {
            0 | 1 => self.current,
            gap if gap < 0 => self.current,
            _ => 0,
        }
    }
}
