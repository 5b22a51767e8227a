//! One handle wiring storage, clock and notifier into every component.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::clock::{Clock, SystemClock};
use crate::error::{CoreError, Result};
use crate::facts::{NoteFact, TaskDirectory, TaskFact};
use crate::notify::{notifier_from_config, Notifier};
use crate::score::ScoreInputs;
use crate::session::{ActiveSession, ClosedSession, Session, SessionManager, SessionPolicy};
use crate::stats::{AggregateStats, Period, Reporter, ScoreReport};
use crate::storage::database::DB_FILE_NAME;
use crate::storage::{data_dir, Config, Database};
use crate::streak::{ActivityType, StreakStatus, StreakTracker, StreakUpdate};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletedTask {
    pub task: TaskFact,
    /// `None` when the task had already been completed.
    pub streak: Option<StreakUpdate>,
}

pub struct Focusroom {
    db: Arc<Database>,
    config: Config,
    clock: Arc<dyn Clock>,
    sessions: SessionManager,
    streaks: StreakTracker,
    reporter: Reporter,
}

impl Focusroom {
    /// Open the configured database with the system clock and the
    /// configured notifier. `db_path` overrides the configured location.
    pub fn open(config: Config, db_path: Option<&Path>) -> Result<Self> {
        let path = match db_path {
            Some(path) => path.to_path_buf(),
            None => match config.storage.database_path.as_deref() {
                Some(path) if !path.trim().is_empty() => PathBuf::from(path),
                _ => data_dir()?.join(DB_FILE_NAME),
            },
        };
        let db = Database::open_at(
            &path,
            Duration::from_millis(config.storage.busy_timeout_ms),
        )?;
        let notifier = notifier_from_config(&config.notifications)?;
        Self::with_parts(Arc::new(db), config, Arc::new(SystemClock), notifier)
    }

    pub fn with_parts(
        db: Arc<Database>,
        config: Config,
        clock: Arc<dyn Clock>,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self> {
        let zone = config.zone()?;
        let policy = SessionPolicy::from(&config.sessions);
        let streaks = StreakTracker::new(db.clone(), clock.clone(), zone);
        let sessions = SessionManager::new(
            db.clone(),
            db.clone(),
            streaks.clone(),
            notifier,
            clock.clone(),
            policy,
        );
        let reporter = Reporter::new(
            db.clone(),
            streaks.clone(),
            clock.clone(),
            policy.min_streak_minutes,
        );
        Ok(Self {
            db,
            config,
            clock,
            sessions,
            streaks,
            reporter,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    pub fn reporter(&self) -> &Reporter {
        &self.reporter
    }

    // === Sessions ===

    /// Start a session; `planned_duration_min` falls back to the configured default.
    pub fn start_session(
        &self,
        user_id: &str,
        task_id: Option<&str>,
        planned_duration_min: Option<u32>,
    ) -> Result<Session> {
        let planned = planned_duration_min.unwrap_or(self.config.sessions.default_planned_minutes);
        self.sessions.start_session(user_id, task_id, planned)
    }

    pub fn end_session(
        &self,
        user_id: &str,
        session_id: &str,
        completed: bool,
    ) -> Result<ClosedSession> {
        self.sessions.end_session(user_id, session_id, completed)
    }

    pub fn get_active_session(&self, user_id: &str) -> Result<Option<ActiveSession>> {
        self.sessions.get_active_session(user_id)
    }

    pub fn sweep_stale_sessions(&self) -> Result<usize> {
        self.sessions.sweep_stale_sessions()
    }

    pub fn list_sessions(
        &self,
        user_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Session>> {
        self.sessions.list_sessions(user_id, from, to)
    }

    /// Sessions started within the last `days` days of the service clock.
    pub fn recent_sessions(&self, user_id: &str, days: u32) -> Result<Vec<Session>> {
        let now = self.clock.now();
        let from = chrono::Duration::try_days(i64::from(days))
            .and_then(|span| now.checked_sub_signed(span))
            .ok_or_else(|| {
                CoreError::InvalidState(format!("{days} days reaches outside the calendar"))
            })?;
        self.sessions.list_sessions(user_id, from, now)
    }

    // === Streaks ===

    pub fn streak_status(&self, user_id: &str, activity: ActivityType) -> Result<StreakStatus> {
        self.streaks.status(user_id, activity)
    }

    pub fn record_task_completion(&self, user_id: &str) -> Result<StreakUpdate> {
        self.streaks.update(user_id, ActivityType::TaskCompletion)
    }

    // === Reports ===

    pub fn score_report(&self, user_id: &str) -> Result<ScoreReport> {
        self.reporter.score_report(user_id)
    }

    pub fn score_inputs(&self, user_id: &str) -> Result<ScoreInputs> {
        self.reporter.score_inputs(user_id, self.clock.now())
    }

    pub fn get_aggregate_stats(&self, user_id: &str, period: Period) -> Result<AggregateStats> {
        self.reporter.aggregate_stats(user_id, period)
    }

    // === Tasks and notes ===

    pub fn add_task(
        &self,
        user_id: &str,
        title: &str,
        due_at: Option<DateTime<Utc>>,
    ) -> Result<TaskFact> {
        require_user(user_id)?;
        if title.trim().is_empty() {
            return Err(CoreError::InvalidState("task title is empty".into()));
        }
        self.db.add_task(user_id, title.trim(), due_at, self.clock.now())
    }

    /// Complete a task and credit the task-completion streak the first time.
    pub fn complete_task(&self, user_id: &str, task_id: &str) -> Result<CompletedTask> {
        require_user(user_id)?;
        let already_done = self
            .db
            .find_task(task_id, user_id)?
            .ok_or_else(|| CoreError::task_not_found(task_id))?
            .completed;
        let task = self.db.complete_task(user_id, task_id, self.clock.now())?;
        let streak = if already_done {
            None
        } else {
            info!(user_id, task_id, "task completed");
            Some(self.record_task_completion(user_id)?)
        };
        Ok(CompletedTask { task, streak })
    }

    pub fn list_tasks(&self, user_id: &str) -> Result<Vec<TaskFact>> {
        require_user(user_id)?;
        self.db.tasks_for_user(user_id)
    }

    pub fn add_note(&self, user_id: &str) -> Result<NoteFact> {
        require_user(user_id)?;
        self.db.add_note(user_id, self.clock.now())
    }
}

fn require_user(user_id: &str) -> Result<()> {
    if user_id.trim().is_empty() {
        return Err(CoreError::Unauthorized);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::notify::NoopNotifier;
    use crate::streak::StreakChange;
    use chrono::TimeZone;

    fn service() -> (Focusroom, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2026, 10, 5, 8, 0, 0).unwrap(),
        ));
        let service = Focusroom::with_parts(
            Arc::new(Database::open_memory().unwrap()),
            Config::default(),
            clock.clone(),
            Arc::new(NoopNotifier),
        )
        .unwrap();
        (service, clock)
    }

    #[test]
    fn planned_duration_defaults_from_config() {
        let (service, _clock) = service();
        let session = service.start_session("u1", None, None).unwrap();
        assert_eq!(session.planned_duration_min, 25);
    }

    #[test]
    fn completing_a_task_credits_its_streak_once() {
        let (service, clock) = service();
        let task = service.add_task("u1", "  Draft intro ", None).unwrap();
        assert_eq!(task.title, "Draft intro");

        let done = service.complete_task("u1", &task.id).unwrap();
        assert_eq!(done.streak.unwrap().change, StreakChange::Started);

        clock.advance(chrono::Duration::days(1));
        let again = service.complete_task("u1", &task.id).unwrap();
        assert!(again.streak.is_none());
        assert_eq!(again.task.completed_at, done.task.completed_at);
    }

    #[test]
    fn recent_sessions_follow_the_service_clock() {
        let (service, clock) = service();
        let session = service.start_session("u1", None, None).unwrap();
        clock.advance(chrono::Duration::days(3));

        assert_eq!(service.recent_sessions("u1", 7).unwrap()[0].id, session.id);
        assert!(service.recent_sessions("u1", 2).unwrap().is_empty());
        assert!(matches!(
            service.recent_sessions("u1", 4_000_000_000),
            Err(CoreError::InvalidState(_))
        ));
    }

    #[test]
    fn task_and_note_writes_require_a_user() {
        let (service, _clock) = service();
        assert!(matches!(
            service.add_task(" ", "x", None),
            Err(CoreError::Unauthorized)
        ));
        assert!(matches!(service.add_note(""), Err(CoreError::Unauthorized)));
        assert!(matches!(
            service.add_task("u1", "   ", None),
            Err(CoreError::InvalidState(_))
        ));
    }

    #[test]
    fn open_uses_an_explicit_database_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("explicit.db");
        let mut config = Config::default();
        config.notifications.enabled = false;
        let service = Focusroom::open(config, Some(&path)).unwrap();
        assert_eq!(service.database().path(), Some(path.as_path()));
    }
}
