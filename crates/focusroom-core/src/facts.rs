//! Facts owned by collaborators (tasks, notes) and the narrow read interfaces
//! the core uses to consume them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::session::Session;

/// Display fields of a task, as seen by session validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskSummary {
    pub id: String,
    pub title: String,
    pub completed: bool,
}

/// Lookup of tasks by owner. Used only to validate session task references.
pub trait TaskDirectory: Send + Sync {
    /// The task, if it exists and belongs to `user_id`.
    fn find_task(&self, task_id: &str, user_id: &str) -> Result<Option<TaskSummary>>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskFact {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub due_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl TaskFact {
    pub fn completed_before(&self, at: DateTime<Utc>) -> bool {
        self.completed_at.is_some_and(|done| done < at)
    }

    pub fn completed_within(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> bool {
        self.completed_at.is_some_and(|done| done >= from && done < to)
    }

    /// Past due at `at` and still not completed by then.
    pub fn overdue_at(&self, at: DateTime<Utc>) -> bool {
        self.due_at.is_some_and(|due| due < at) && !self.completed_before(at)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteFact {
    pub id: String,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
}

/// Read side of everything the reporter aggregates.
///
/// Reads are snapshot reads and may lag in-flight lifecycle writes.
pub trait ActivityLog: Send + Sync {
    /// Sessions of `user_id` started in `[from, to)`.
    fn session_facts(
        &self,
        user_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Session>>;

    /// Every task of `user_id`.
    fn task_facts(&self, user_id: &str) -> Result<Vec<TaskFact>>;

    /// Notes of `user_id` created in `[from, to)`.
    fn note_facts(
        &self,
        user_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<NoteFact>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn task(due: Option<i64>, done: Option<i64>) -> TaskFact {
        let base = Utc.with_ymd_and_hms(2026, 1, 10, 12, 0, 0).unwrap();
        TaskFact {
            id: "t".into(),
            user_id: "u".into(),
            title: "Write report".into(),
            created_at: base - Duration::days(10),
            due_at: due.map(|h| base + Duration::hours(h)),
            completed_at: done.map(|h| base + Duration::hours(h)),
        }
    }

    #[test]
    fn overdue_needs_a_past_due_date_and_no_completion() {
        let at = Utc.with_ymd_and_hms(2026, 1, 10, 12, 0, 0).unwrap();
        assert!(task(Some(-1), None).overdue_at(at));
        assert!(task(Some(-1), Some(1)).overdue_at(at));
        assert!(!task(Some(-1), Some(-2)).overdue_at(at));
        assert!(!task(Some(1), None).overdue_at(at));
        assert!(!task(None, None).overdue_at(at));
    }
}
