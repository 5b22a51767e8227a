use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::rollup::{
    bucket_by_day, most_productive_hour, DailyRollup, MetricComparison, MetricTotals,
};
use super::Period;
use crate::calendar::{CanonicalZone, DateRange};
use crate::clock::Clock;
use crate::error::{CoreError, Result};
use crate::facts::{ActivityLog, TaskFact};
use crate::score::{ScoreBreakdown, ScoreInputs, ScoreTrend, ScoreWeights};
use crate::session::Session;
use crate::streak::{ActivityType, StreakTracker};

/// Length of the score window.
const SCORE_WINDOW_DAYS: i64 = 7;

/// How far back a historical streak is reconstructed.
const STREAK_LOOKBACK_DAYS: i64 = 400;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateStats {
    pub user_id: String,
    pub period: Period,
    pub window: DateRange,
    pub previous_window: DateRange,
    pub totals: MetricTotals,
    pub previous_totals: MetricTotals,
    pub comparison: MetricComparison,
    pub days: Vec<DailyRollup>,
    pub most_productive_hour: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreReport {
    pub user_id: String,
    pub generated_at: DateTime<Utc>,
    pub inputs: ScoreInputs,
    pub previous_inputs: ScoreInputs,
    pub breakdown: ScoreBreakdown,
    pub trend: ScoreTrend,
}

/// Read-only rollups over persisted sessions, tasks and notes.
pub struct Reporter {
    log: Arc<dyn ActivityLog>,
    streaks: StreakTracker,
    clock: Arc<dyn Clock>,
    zone: CanonicalZone,
    min_streak_minutes: u32,
    weights: ScoreWeights,
}

fn count(n: usize) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}

fn focus_total<'a>(sessions: impl IntoIterator<Item = &'a Session>) -> u32 {
    sessions
        .into_iter()
        .fold(0u32, |sum, s| sum.saturating_add(s.focus_minutes()))
}

impl Reporter {
    pub fn new(
        log: Arc<dyn ActivityLog>,
        streaks: StreakTracker,
        clock: Arc<dyn Clock>,
        min_streak_minutes: u32,
    ) -> Self {
        let zone = streaks.zone();
        Self {
            log,
            streaks,
            clock,
            zone,
            min_streak_minutes,
            weights: ScoreWeights::default(),
        }
    }

    pub fn with_weights(mut self, weights: ScoreWeights) -> Self {
        self.weights = weights;
        self
    }

    /// Stats for the `period` window containing today.
    pub fn aggregate_stats(&self, user_id: &str, period: Period) -> Result<AggregateStats> {
        let today = self.zone.date_of(self.clock.now());
        self.aggregate_stats_at(user_id, period, today)
    }

    /// Stats for the `period` window containing `reference`, compared with
    /// the window before it.
    pub fn aggregate_stats_at(
        &self,
        user_id: &str,
        period: Period,
        reference: NaiveDate,
    ) -> Result<AggregateStats> {
        if user_id.trim().is_empty() {
            return Err(CoreError::Unauthorized);
        }
        let window = period.window_containing(reference);
        let previous_window = period.previous_window(&window);
        let tasks = self.log.task_facts(user_id)?;

        let (days, sessions) = self.rollups(user_id, &window, &tasks)?;
        let (previous_days, _) = self.rollups(user_id, &previous_window, &tasks)?;

        let totals = MetricTotals::sum(&days);
        let previous_totals = MetricTotals::sum(&previous_days);
        debug!(user_id, %period, start = %window.start, "aggregated stats");

        Ok(AggregateStats {
            user_id: user_id.to_string(),
            period,
            window,
            previous_window,
            totals,
            previous_totals,
            comparison: MetricComparison::between(&totals, &previous_totals),
            most_productive_hour: most_productive_hour(&sessions, &self.zone),
            days,
        })
    }

    fn rollups(
        &self,
        user_id: &str,
        range: &DateRange,
        tasks: &[TaskFact],
    ) -> Result<(Vec<DailyRollup>, Vec<Session>)> {
        let (from, to) = range.to_instants(&self.zone);
        let sessions = self.log.session_facts(user_id, from, to)?;
        let notes = self.log.note_facts(user_id, from, to)?;
        let days = bucket_by_day(range, &self.zone, &sessions, tasks, &notes);
        Ok((days, sessions))
    }

    /// Score inputs for the seven days ending at `reference`.
    ///
    /// A reference on or after today reads the stored focus streak; an
    /// earlier one rebuilds the streak from session history.
    pub fn score_inputs(&self, user_id: &str, reference: DateTime<Utc>) -> Result<ScoreInputs> {
        if user_id.trim().is_empty() {
            return Err(CoreError::Unauthorized);
        }
        let window_start = reference - Duration::days(SCORE_WINDOW_DAYS);

        let tasks = self.log.task_facts(user_id)?;
        let known: Vec<&TaskFact> = tasks
            .iter()
            .filter(|t| t.created_at < reference)
            .collect();
        let in_play: Vec<&TaskFact> = known
            .iter()
            .copied()
            .filter(|t| !t.completed_before(window_start))
            .collect();
        let completed_tasks = in_play
            .iter()
            .filter(|t| t.completed_within(window_start, reference))
            .count();
        let overdue_count = known.iter().filter(|t| t.overdue_at(reference)).count();

        let sessions = self.log.session_facts(user_id, window_start, reference)?;
        let day_start = self.zone.start_of_day(self.zone.date_of(reference));
        let today_focus_minutes =
            focus_total(sessions.iter().filter(|s| s.started_at >= day_start));
        let weekly_focus_minutes = focus_total(&sessions);

        let current_focus_streak = if self.zone.date_of(reference) >= self.streaks.today() {
            self.streaks
                .status(user_id, ActivityType::FocusSession)?
                .effective_current
        } else {
            self.streak_from_history(user_id, reference)?
        };

        Ok(ScoreInputs {
            completed_tasks: count(completed_tasks),
            total_tasks: count(in_play.len()),
            today_focus_minutes,
            weekly_focus_minutes,
            overdue_count: count(overdue_count),
            current_focus_streak,
        })
    }

    /// Consecutive qualifying days ending on `reference`'s date or the day
    /// before, counted from closed sessions only.
    fn streak_from_history(&self, user_id: &str, reference: DateTime<Utc>) -> Result<u32> {
        let end_date = self.zone.date_of(reference);
        let from = self
            .zone
            .start_of_day(end_date - Duration::days(STREAK_LOOKBACK_DAYS));
        let sessions = self.log.session_facts(user_id, from, reference)?;

        let qualifying: HashSet<NaiveDate> = sessions
            .iter()
            .filter(|s| s.completed && s.focus_minutes() >= self.min_streak_minutes)
            .filter_map(|s| s.ended_at.filter(|end| *end <= reference))
            .map(|end| self.zone.date_of(end))
            .collect();

        let mut day = end_date;
        if !qualifying.contains(&day) {
            day -= Duration::days(1);
        }
        let mut run = 0;
        while qualifying.contains(&day) {
            run += 1;
            day -= Duration::days(1);
        }
        Ok(run)
    }

    /// Current score with its breakdown and the trend against the prior week.
    pub fn score_report(&self, user_id: &str) -> Result<ScoreReport> {
        let now = self.clock.now();
        let inputs = self.score_inputs(user_id, now)?;
        let previous_inputs =
            self.score_inputs(user_id, now - Duration::days(SCORE_WINDOW_DAYS))?;
        Ok(ScoreReport {
            user_id: user_id.to_string(),
            generated_at: now,
            breakdown: self.weights.score(&inputs),
            trend: self.weights.trend(&inputs, &previous_inputs),
            inputs,
            previous_inputs,
        })
    }
}
