//! Focus sessions: the record, its store, and the lifecycle manager.

mod lifecycle;
mod store;

pub use lifecycle::{ClosedSession, OvernightPolicy, SessionManager, SessionPolicy};
pub use store::{InsertOutcome, SessionStore};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A timed focus session.
///
/// Created open, closed exactly once, never touched again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub user_id: String,
    pub task_id: Option<String>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    /// Informational only; never used for gating.
    pub planned_duration_min: u32,
    /// Whole minutes. `None` while the session is open.
    pub duration_min: Option<u32>,
    pub completed: bool,
}

impl Session {
    /// A fresh open session starting at `now`.
    pub fn open(
        user_id: &str,
        task_id: Option<&str>,
        planned_duration_min: u32,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            task_id: task_id.map(str::to_string),
            started_at: now,
            ended_at: None,
            planned_duration_min,
            duration_min: None,
            completed: false,
        }
    }

    pub fn is_open(&self) -> bool {
        self.ended_at.is_none()
    }

    /// Focus minutes credited by this session; zero while open.
    pub fn focus_minutes(&self) -> u32 {
        self.duration_min.unwrap_or(0)
    }
}

/// An open session together with how long it has been running.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveSession {
    #[serde(flatten)]
    pub session: Session,
    pub elapsed_minutes: u32,
}
