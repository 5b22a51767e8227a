use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::calendar::{CanonicalZone, DateRange};
use crate::facts::{NoteFact, TaskFact};
use crate::score::round_half_up;
use crate::session::Session;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricTotals {
    pub tasks_completed: u32,
    /// Minutes of closed sessions; an open session contributes nothing yet.
    pub focus_minutes: u32,
    pub session_count: u32,
    pub notes_created: u32,
}

impl MetricTotals {
    pub fn absorb(&mut self, other: &MetricTotals) {
        self.tasks_completed = self.tasks_completed.saturating_add(other.tasks_completed);
        self.focus_minutes = self.focus_minutes.saturating_add(other.focus_minutes);
        self.session_count = self.session_count.saturating_add(other.session_count);
        self.notes_created = self.notes_created.saturating_add(other.notes_created);
    }

    pub fn sum<'a>(rollups: impl IntoIterator<Item = &'a DailyRollup>) -> Self {
        let mut totals = Self::default();
        for day in rollups {
            totals.absorb(&day.totals);
        }
        totals
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyRollup {
    pub date: NaiveDate,
    #[serde(flatten)]
    pub totals: MetricTotals,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comparison {
    pub delta: i64,
    /// Whole percent change against the previous value; 0 when that was 0.
    pub percentage_delta: i64,
}

pub fn compare(current: u32, previous: u32) -> Comparison {
    let delta = i64::from(current) - i64::from(previous);
    let percentage_delta = if previous > 0 {
        round_half_up(delta as f64 / f64::from(previous) * 100.0) as i64
    } else {
        0
    };
    Comparison {
        delta,
        percentage_delta,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricComparison {
    pub tasks_completed: Comparison,
    pub focus_minutes: Comparison,
    pub session_count: Comparison,
    pub notes_created: Comparison,
}

impl MetricComparison {
    pub fn between(current: &MetricTotals, previous: &MetricTotals) -> Self {
        Self {
            tasks_completed: compare(current.tasks_completed, previous.tasks_completed),
            focus_minutes: compare(current.focus_minutes, previous.focus_minutes),
            session_count: compare(current.session_count, previous.session_count),
            notes_created: compare(current.notes_created, previous.notes_created),
        }
    }
}

/// One rollup per day of `range`, zero-filled, in date order.
///
/// Facts dated outside `range` are ignored.
pub fn bucket_by_day(
    range: &DateRange,
    zone: &CanonicalZone,
    sessions: &[Session],
    tasks: &[TaskFact],
    notes: &[NoteFact],
) -> Vec<DailyRollup> {
    let mut days: BTreeMap<NaiveDate, MetricTotals> =
        range.days().map(|d| (d, MetricTotals::default())).collect();

    for session in sessions {
        if let Some(day) = days.get_mut(&zone.date_of(session.started_at)) {
            day.session_count = day.session_count.saturating_add(1);
            day.focus_minutes = day.focus_minutes.saturating_add(session.focus_minutes());
        }
    }
    for completed_at in tasks.iter().filter_map(|t| t.completed_at) {
        if let Some(day) = days.get_mut(&zone.date_of(completed_at)) {
            day.tasks_completed = day.tasks_completed.saturating_add(1);
        }
    }
    for note in notes {
        if let Some(day) = days.get_mut(&zone.date_of(note.created_at)) {
            day.notes_created = day.notes_created.saturating_add(1);
        }
    }

    days.into_iter()
        .map(|(date, totals)| DailyRollup { date, totals })
        .collect()
}

/// Hour of day (0-23, canonical zone) whose sessions hold the most focus
/// minutes. Ties go to the earliest hour; `None` without any focus time.
pub fn most_productive_hour(sessions: &[Session], zone: &CanonicalZone) -> Option<u32> {
    let mut minutes_by_hour = [0u64; 24];
    for session in sessions {
        let hour = zone.hour_of(session.started_at) as usize;
        minutes_by_hour[hour] += u64::from(session.focus_minutes());
    }

    let mut best: Option<(u32, u64)> = None;
    for (hour, &minutes) in minutes_by_hour.iter().enumerate() {
        if minutes == 0 {
            continue;
        }
        if best.map_or(true, |(_, top)| minutes > top) {
            best = Some((hour as u32, minutes));
        }
    }
    best.map(|(hour, _)| hour)
}
