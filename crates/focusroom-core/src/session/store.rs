use chrono::{DateTime, Utc};

use super::Session;
use crate::error::Result;

/// Result of a conditional insert of an open session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    /// Another open session for the same user already exists.
    Conflict { active_session_id: String },
}

/// Durable record of session rows.
///
/// Implementations must make [`insert_open_session`](Self::insert_open_session)
/// and [`close_session`](Self::close_session) atomic with respect to other
/// writers, including writers in other processes.
pub trait SessionStore: Send + Sync {
    /// Insert `session` unless its user already has an open session.
    fn insert_open_session(&self, session: &Session) -> Result<InsertOutcome>;

    fn find_session(&self, session_id: &str) -> Result<Option<Session>>;

    fn open_sessions_for_user(&self, user_id: &str) -> Result<Vec<Session>>;

    /// Open sessions of every user started strictly before `cutoff`.
    fn open_sessions_started_before(&self, cutoff: DateTime<Utc>) -> Result<Vec<Session>>;

    /// Close a session if it is still open.
    ///
    /// Returns `false` when the row was already closed (or absent).
    fn close_session(
        &self,
        session_id: &str,
        ended_at: DateTime<Utc>,
        duration_min: u32,
        completed: bool,
    ) -> Result<bool>;

    /// Sessions of `user_id` started in `[from, to)`, newest first.
    fn sessions_started_between(
        &self,
        user_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Session>>;
}
