//! Composite 0-100 productivity score and week-over-week trend.
//!
//! ```text
//! completion = total > 0 ? completed / total * 35 : 0
//! focus      = min(25, floor(today_focus_minutes / 6))
//! weekly     = min(20, floor(weekly_focus_minutes / 30))
//! streak     = min(15, current_focus_streak * 1.5)
//! penalty    = min(20, overdue_count * 2.5)
//! score      = clamp(round(completion + focus + weekly + streak - penalty), 0, 100)
//! ```
//!
//! The weights are policy, kept in [`ScoreWeights`]. The floor on the two
//! minute-based terms and the final round are part of that policy.

use serde::{Deserialize, Serialize};

/// Snapshot of the facts a score is computed from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreInputs {
    pub completed_tasks: u32,
    pub total_tasks: u32,
    pub today_focus_minutes: u32,
    pub weekly_focus_minutes: u32,
    pub overdue_count: u32,
    pub current_focus_streak: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreWeights {
    /// Points for a 100% completion rate.
    pub completion_max: f64,
    /// Minutes of today's focus per point.
    pub focus_minutes_per_point: u32,
    pub focus_cap: f64,
    /// Minutes of weekly focus per point.
    pub weekly_minutes_per_point: u32,
    pub weekly_cap: f64,
    pub streak_points_per_day: f64,
    pub streak_cap: f64,
    pub overdue_points_each: f64,
    pub overdue_cap: f64,
    /// Score delta beyond which a trend is up or down.
    pub trend_threshold: i32,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            completion_max: 35.0,
            focus_minutes_per_point: 6,
            focus_cap: 25.0,
            weekly_minutes_per_point: 30,
            weekly_cap: 20.0,
            streak_points_per_day: 1.5,
            streak_cap: 15.0,
            overdue_points_each: 2.5,
            overdue_cap: 20.0,
            trend_threshold: 5,
        }
    }
}

/// Every term of a computed score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub completion: f64,
    pub focus: f64,
    pub weekly: f64,
    pub streak_bonus: f64,
    pub overdue_penalty: f64,
    pub raw: f64,
    pub score: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Up,
    Down,
    Stable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreTrend {
    pub score: u8,
    pub previous_score: u8,
    pub delta: i32,
    pub trend: Trend,
}

impl ScoreWeights {
    pub fn score(&self, inputs: &ScoreInputs) -> ScoreBreakdown {
        let completion = if inputs.total_tasks > 0 {
            f64::from(inputs.completed_tasks) / f64::from(inputs.total_tasks) * self.completion_max
        } else {
            0.0
        };
        let focus = per_point(inputs.today_focus_minutes, self.focus_minutes_per_point)
            .min(self.focus_cap);
        let weekly = per_point(inputs.weekly_focus_minutes, self.weekly_minutes_per_point)
            .min(self.weekly_cap);
        let streak_bonus = (f64::from(inputs.current_focus_streak) * self.streak_points_per_day)
            .min(self.streak_cap);
        let overdue_penalty =
            (f64::from(inputs.overdue_count) * self.overdue_points_each).min(self.overdue_cap);

        let raw = completion + focus + weekly + streak_bonus - overdue_penalty;
        let score = round_half_up(raw).clamp(0.0, 100.0) as u8;

        ScoreBreakdown {
            completion,
            focus,
            weekly,
            streak_bonus,
            overdue_penalty,
            raw,
            score,
        }
    }

    pub fn trend(&self, current: &ScoreInputs, previous: &ScoreInputs) -> ScoreTrend {
        let score = self.score(current).score;
        let previous_score = self.score(previous).score;
        let delta = i32::from(score) - i32::from(previous_score);
        let trend = if delta > self.trend_threshold {
            Trend::Up
        } else if delta < -self.trend_threshold {
            Trend::Down
        } else {
            Trend::Stable
        };
        ScoreTrend {
            score,
            previous_score,
            delta,
            trend,
        }
    }
}

/// Nearest integer with halves rounded toward positive infinity, so -2.5
/// becomes -2 and 2.5 becomes 3.
pub fn round_half_up(value: f64) -> f64 {
    (value + 0.5).floor()
}

/// `floor(minutes / per_point)` as points; zero divisor yields zero.
fn per_point(minutes: u32, per_point: u32) -> f64 {
    minutes.checked_div(per_point).map(f64::from).unwrap_or(0.0)
}

/// Score with the default weights.
pub fn compute_score(inputs: &ScoreInputs) -> ScoreBreakdown {
    ScoreWeights::default().score(inputs)
}

/// Trend with the default weights.
pub fn compute_trend(current: &ScoreInputs, previous: &ScoreInputs) -> ScoreTrend {
    ScoreWeights::default().trend(current, previous)
}
