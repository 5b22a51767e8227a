use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info, warn};

use super::{ActiveSession, InsertOutcome, Session, SessionStore};
use crate::calendar::{elapsed_minutes_clamped, CanonicalZone};
use crate::clock::Clock;
use crate::error::{CoreError, Result};
use crate::facts::TaskDirectory;
use crate::notify::{CelebrationKind, Notifier};
use crate::storage::SessionsConfig;
use crate::streak::{ActivityType, StreakTracker, StreakUpdate};

/// What to do with an open session left over from an earlier calendar day
/// that is not yet old enough to count as stale.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OvernightPolicy {
    /// Refuse to start a new session until the old one is ended.
    #[default]
    Block,
    /// Force-close the old session as incomplete.
    Close,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionPolicy {
    pub stale_after: Duration,
    pub min_streak_minutes: u32,
    pub overnight: OvernightPolicy,
}

impl Default for SessionPolicy {
    fn default() -> Self {
        Self {
            stale_after: Duration::hours(24),
            min_streak_minutes: 15,
            overnight: OvernightPolicy::Block,
        }
    }
}

impl From<&SessionsConfig> for SessionPolicy {
    fn from(config: &SessionsConfig) -> Self {
        Self {
            stale_after: Duration::hours(i64::from(config.stale_after_hours)),
            min_streak_minutes: config.min_streak_minutes,
            overnight: config.overnight_policy,
        }
    }
}

/// Result of [`SessionManager::end_session`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClosedSession {
    pub session: Session,
    /// Set when the close qualified for a focus streak credit.
    pub streak: Option<StreakUpdate>,
    /// The clock read earlier than the session start; duration was clamped to 0.
    pub clock_anomaly: bool,
}

/// Opens, closes and reconciles focus sessions.
///
/// Holds no lock of its own. The store rejects a second open session per
/// user and only closes a session that is still open, so any number of
/// managers may share one database.
pub struct SessionManager {
    store: Arc<dyn SessionStore>,
    tasks: Arc<dyn TaskDirectory>,
    streaks: StreakTracker,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
    zone: CanonicalZone,
    policy: SessionPolicy,
}

fn require_user(user_id: &str) -> Result<()> {
    if user_id.trim().is_empty() {
        return Err(CoreError::Unauthorized);
    }
    Ok(())
}

impl SessionManager {
    pub fn new(
        store: Arc<dyn SessionStore>,
        tasks: Arc<dyn TaskDirectory>,
        streaks: StreakTracker,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
        policy: SessionPolicy,
    ) -> Self {
        let zone = streaks.zone();
        Self {
            store,
            tasks,
            streaks,
            notifier,
            clock,
            zone,
            policy,
        }
    }

    /// Open a new focus session for `user_id`.
    ///
    /// Stale sessions are force-closed first. An open session from today
    /// fails with [`CoreError::Conflict`]; one from an earlier day follows
    /// the configured [`OvernightPolicy`].
    pub fn start_session(
        &self,
        user_id: &str,
        task_id: Option<&str>,
        planned_duration_min: u32,
    ) -> Result<Session> {
        require_user(user_id)?;
        let now = self.clock.now();
        let today = self.zone.date_of(now);
        let stale_cutoff = now - self.policy.stale_after;

        for open in self.store.open_sessions_for_user(user_id)? {
            if open.started_at < stale_cutoff {
                self.force_close(&open, now, "stale")?;
                continue;
            }
            let started_on = self.zone.date_of(open.started_at);
            if started_on >= today || self.policy.overnight == OvernightPolicy::Block {
                debug!(user_id, active_session_id = %open.id, "session already active");
                return Err(CoreError::Conflict {
                    active_session_id: open.id,
                });
            }
            self.force_close(&open, now, "overnight")?;
        }

        let task_id = task_id.map(str::trim).filter(|id| !id.is_empty());
        if let Some(task_id) = task_id {
            if self.tasks.find_task(task_id, user_id)?.is_none() {
                return Err(CoreError::task_not_found(task_id));
            }
        }

        let session = Session::open(user_id, task_id, planned_duration_min, now);
        match self.store.insert_open_session(&session)? {
            InsertOutcome::Inserted => {
                info!(
                    event = "SessionStarted",
                    user_id,
                    session_id = %session.id,
                    task_id = session.task_id.as_deref().unwrap_or("-"),
                    planned_duration_min,
                    "focus session started"
                );
                Ok(session)
            }
            InsertOutcome::Conflict { active_session_id } => {
                warn!(user_id, %active_session_id, "lost race to open a session");
                Err(CoreError::Conflict { active_session_id })
            }
        }
    }

    /// Close `session_id`, crediting the focus streak when it qualifies.
    pub fn end_session(
        &self,
        user_id: &str,
        session_id: &str,
        completed: bool,
    ) -> Result<ClosedSession> {
        require_user(user_id)?;
        let session = self
            .store
            .find_session(session_id)?
            .filter(|s| s.user_id == user_id)
            .ok_or_else(|| CoreError::session_not_found(session_id))?;
        if !session.is_open() {
            return Err(CoreError::InvalidState(format!(
                "session {session_id} is already ended"
            )));
        }

        let now = self.clock.now();
        let (duration_min, clock_anomaly) = elapsed_minutes_clamped(session.started_at, now);
        if !self
            .store
            .close_session(&session.id, now, duration_min, completed)?
        {
            return Err(CoreError::InvalidState(format!(
                "session {session_id} was ended concurrently"
            )));
        }

        let closed = Session {
            ended_at: Some(now),
            duration_min: Some(duration_min),
            completed,
            ..session
        };
        info!(
            event = "SessionEnded",
            user_id,
            session_id = %closed.id,
            duration_min,
            completed,
            "focus session ended"
        );

        // The close is committed; a streak failure must not undo its result.
        let streak = if completed && duration_min >= self.policy.min_streak_minutes {
            match self.streaks.update(user_id, ActivityType::FocusSession) {
                Ok(update) => {
                    self.celebrate(&closed, &update);
                    Some(update)
                }
                Err(err) => {
                    warn!(
                        user_id,
                        session_id = %closed.id,
                        error = %err,
                        "focus streak update failed after close"
                    );
                    None
                }
            }
        } else {
            None
        };

        Ok(ClosedSession {
            session: closed,
            streak,
            clock_anomaly,
        })
    }

    /// The user's open session with its elapsed minutes, if any.
    pub fn get_active_session(&self, user_id: &str) -> Result<Option<ActiveSession>> {
        require_user(user_id)?;
        let now = self.clock.now();
        let active = self
            .store
            .open_sessions_for_user(user_id)?
            .into_iter()
            .next()
            .map(|session| {
                let (elapsed_minutes, _) = elapsed_minutes_clamped(session.started_at, now);
                ActiveSession {
                    session,
                    elapsed_minutes,
                }
            });
        Ok(active)
    }

    /// Force-close every user's stale sessions. Returns how many were closed.
    pub fn sweep_stale_sessions(&self) -> Result<usize> {
        let now = self.clock.now();
        let mut closed = 0;
        for session in self
            .store
            .open_sessions_started_before(now - self.policy.stale_after)?
        {
            if self.force_close(&session, now, "stale")? {
                closed += 1;
            }
        }
        if closed > 0 {
            info!(closed, "swept stale sessions");
        }
        Ok(closed)
    }

    /// Sessions started in `[from, to)`, newest first.
    pub fn list_sessions(
        &self,
        user_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Session>> {
        require_user(user_id)?;
        if to < from {
            return Err(CoreError::InvalidState(format!(
                "range end {to} precedes start {from}"
            )));
        }
        self.store.sessions_started_between(user_id, from, to)
    }

    fn force_close(&self, session: &Session, now: DateTime<Utc>, reason: &str) -> Result<bool> {
        let (duration_min, _) = elapsed_minutes_clamped(session.started_at, now);
        let closed = self
            .store
            .close_session(&session.id, now, duration_min, false)?;
        if closed {
            info!(
                event = "SessionReconciled",
                user_id = %session.user_id,
                session_id = %session.id,
                reason,
                duration_min,
                "open session force-closed as incomplete"
            );
        } else {
            debug!(session_id = %session.id, "session already closed elsewhere");
        }
        Ok(closed)
    }

    fn celebrate(&self, session: &Session, update: &StreakUpdate) {
        let kind = if update.is_milestone() {
            CelebrationKind::StreakMilestone
        } else {
            CelebrationKind::FocusSessionCompleted
        };
        let payload = json!({
            "session_id": session.id,
            "duration_min": session.focus_minutes(),
            "streak_current": update.streak.current,
            "streak_longest": update.streak.longest,
        });
        if let Err(err) = self.notifier.celebrate(&session.user_id, kind, &payload) {
            warn!(
                user_id = %session.user_id,
                session_id = %session.id,
                kind = kind.as_str(),
                error = %err,
                "celebration failed"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::error::{DatabaseError, NotifyError};
    use crate::storage::Database;
    use crate::streak::{ActivityType, Streak, StreakChange, StreakStore};
    use chrono::TimeZone;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingNotifier {
        seen: Mutex<Vec<(CelebrationKind, serde_json::Value)>>,
    }

    impl Notifier for RecordingNotifier {
        fn celebrate(
            &self,
            _user_id: &str,
            kind: CelebrationKind,
            payload: &serde_json::Value,
        ) -> Result<(), NotifyError> {
            self.seen.lock().unwrap().push((kind, payload.clone()));
            Ok(())
        }
    }

    struct FailingNotifier;

    impl Notifier for FailingNotifier {
        fn celebrate(
            &self,
            _user_id: &str,
            _kind: CelebrationKind,
            _payload: &serde_json::Value,
        ) -> Result<(), NotifyError> {
            Err(NotifyError::Status { status: 502 })
        }
    }

    struct LockedStreaks;

    impl StreakStore for LockedStreaks {
        fn find_streak(&self, _user_id: &str, _activity: ActivityType) -> Result<Option<Streak>> {
            Ok(None)
        }

        fn modify_streak(
            &self,
            _user_id: &str,
            _activity: ActivityType,
            _apply: &mut dyn FnMut(Option<Streak>) -> Option<Streak>,
        ) -> Result<()> {
            Err(DatabaseError::Locked.into())
        }
    }

    struct Fixture {
        db: Arc<Database>,
        clock: Arc<ManualClock>,
        notifier: Arc<RecordingNotifier>,
        manager: SessionManager,
    }

    fn fixture(start: DateTime<Utc>, policy: SessionPolicy) -> Fixture {
        let db = Arc::new(Database::open_memory().unwrap());
        let clock = Arc::new(ManualClock::new(start));
        let notifier = Arc::new(RecordingNotifier::default());
        let streaks = StreakTracker::new(db.clone(), clock.clone(), CanonicalZone::utc());
        let manager = SessionManager::new(
            db.clone(),
            db.clone(),
            streaks,
            notifier.clone(),
            clock.clone(),
            policy,
        );
        Fixture {
            db,
            clock,
            notifier,
            manager,
        }
    }

    fn morning() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 5, 4, 9, 0, 0).unwrap()
    }

    #[test]
    fn second_start_on_the_same_day_conflicts() {
        let f = fixture(morning(), SessionPolicy::default());
        let first = f.manager.start_session("u1", None, 25).unwrap();
        f.clock.advance(Duration::minutes(5));
        let err = f.manager.start_session("u1", None, 25).unwrap_err();
        match err {
            CoreError::Conflict { active_session_id } => assert_eq!(active_session_id, first.id),
            other => panic!("expected conflict, got {other:?}"),
        }
        assert!(f.manager.start_session("u2", None, 25).is_ok());
    }

    #[test]
    fn stale_session_is_closed_before_a_new_start() {
        let f = fixture(morning(), SessionPolicy::default());
        let old = f.manager.start_session("u1", None, 25).unwrap();
        f.clock.advance(Duration::hours(25));
        let fresh = f.manager.start_session("u1", None, 25).unwrap();
        assert_ne!(fresh.id, old.id);

        let old = f.db.find_session(&old.id).unwrap().unwrap();
        assert!(!old.completed);
        assert_eq!(old.duration_min, Some(25 * 60));
        assert_eq!(
            f.manager.get_active_session("u1").unwrap().unwrap().session.id,
            fresh.id
        );
    }

    #[test]
    fn overnight_session_blocks_by_default() {
        let late = Utc.with_ymd_and_hms(2026, 5, 4, 23, 0, 0).unwrap();
        let f = fixture(late, SessionPolicy::default());
        let open = f.manager.start_session("u1", None, 25).unwrap();
        f.clock.advance(Duration::hours(2));
        assert!(matches!(
            f.manager.start_session("u1", None, 25),
            Err(CoreError::Conflict { active_session_id }) if active_session_id == open.id
        ));
    }

    #[test]
    fn overnight_session_can_be_closed_by_policy() {
        let late = Utc.with_ymd_and_hms(2026, 5, 4, 23, 0, 0).unwrap();
        let policy = SessionPolicy {
            overnight: OvernightPolicy::Close,
            ..SessionPolicy::default()
        };
        let f = fixture(late, policy);
        let open = f.manager.start_session("u1", None, 25).unwrap();
        f.clock.advance(Duration::hours(2));
        f.manager.start_session("u1", None, 25).unwrap();

        let old = f.db.find_session(&open.id).unwrap().unwrap();
        assert_eq!(old.duration_min, Some(120));
        assert!(!old.completed);
    }

    #[test]
    fn task_must_belong_to_the_user() {
        let f = fixture(morning(), SessionPolicy::default());
        let mine = f.db.add_task("u1", "Write", None, morning()).unwrap();
        let theirs = f.db.add_task("u2", "Read", None, morning()).unwrap();

        assert!(matches!(
            f.manager.start_session("u1", Some("missing"), 25),
            Err(CoreError::NotFound { entity: "Task", .. })
        ));
        assert!(matches!(
            f.manager.start_session("u1", Some(&theirs.id), 25),
            Err(CoreError::NotFound { .. })
        ));
        let session = f.manager.start_session("u1", Some(&mine.id), 25).unwrap();
        assert_eq!(session.task_id.as_deref(), Some(mine.id.as_str()));
    }

    #[test]
    fn completed_session_credits_streak_and_celebrates() {
        let f = fixture(morning(), SessionPolicy::default());
        let session = f.manager.start_session("u1", None, 25).unwrap();
        f.clock.advance(Duration::minutes(30));
        let closed = f.manager.end_session("u1", &session.id, true).unwrap();

        assert_eq!(closed.session.duration_min, Some(30));
        assert!(closed.session.completed);
        assert!(!closed.clock_anomaly);
        let update = closed.streak.unwrap();
        assert_eq!(update.change, StreakChange::Started);
        assert_eq!(update.streak.current, 1);

        let seen = f.notifier.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].0, CelebrationKind::FocusSessionCompleted);
        assert_eq!(seen[0].1["duration_min"], 30);
    }

    #[test]
    fn short_or_abandoned_sessions_do_not_credit() {
        let f = fixture(morning(), SessionPolicy::default());
        let short = f.manager.start_session("u1", None, 25).unwrap();
        f.clock.advance(Duration::minutes(10));
        assert!(f
            .manager
            .end_session("u1", &short.id, true)
            .unwrap()
            .streak
            .is_none());

        let abandoned = f.manager.start_session("u1", None, 25).unwrap();
        f.clock.advance(Duration::minutes(40));
        let closed = f.manager.end_session("u1", &abandoned.id, false).unwrap();
        assert!(closed.streak.is_none());
        assert_eq!(closed.session.duration_min, Some(40));
        assert!(f.notifier.seen.lock().unwrap().is_empty());
    }

    #[test]
    fn ending_twice_is_invalid_and_credits_once() {
        let f = fixture(morning(), SessionPolicy::default());
        let session = f.manager.start_session("u1", None, 25).unwrap();
        f.clock.advance(Duration::minutes(20));
        f.manager.end_session("u1", &session.id, true).unwrap();
        assert!(matches!(
            f.manager.end_session("u1", &session.id, true),
            Err(CoreError::InvalidState(_))
        ));
        let status = f
            .manager
            .streaks
            .status("u1", ActivityType::FocusSession)
            .unwrap();
        assert_eq!(status.current, 1);
    }

    #[test]
    fn ending_someone_elses_session_is_not_found() {
        let f = fixture(morning(), SessionPolicy::default());
        let session = f.manager.start_session("u1", None, 25).unwrap();
        assert!(matches!(
            f.manager.end_session("u2", &session.id, true),
            Err(CoreError::NotFound { entity: "Session", .. })
        ));
        assert!(matches!(
            f.manager.end_session("", &session.id, true),
            Err(CoreError::Unauthorized)
        ));
    }

    #[test]
    fn clock_moving_backwards_clamps_duration() {
        let f = fixture(morning(), SessionPolicy::default());
        let session = f.manager.start_session("u1", None, 25).unwrap();
        f.clock.advance(Duration::minutes(-5));
        let closed = f.manager.end_session("u1", &session.id, true).unwrap();
        assert_eq!(closed.session.duration_min, Some(0));
        assert!(closed.clock_anomaly);
        assert!(closed.streak.is_none());
    }

    #[test]
    fn notifier_failure_does_not_fail_the_close() {
        let db = Arc::new(Database::open_memory().unwrap());
        let clock = Arc::new(ManualClock::new(morning()));
        let streaks = StreakTracker::new(db.clone(), clock.clone(), CanonicalZone::utc());
        let manager = SessionManager::new(
            db.clone(),
            db.clone(),
            streaks,
            Arc::new(FailingNotifier),
            clock.clone(),
            SessionPolicy::default(),
        );
        let session = manager.start_session("u1", None, 25).unwrap();
        clock.advance(Duration::minutes(25));
        let closed = manager.end_session("u1", &session.id, true).unwrap();
        assert!(closed.streak.is_some());
    }

    #[test]
    fn streak_failure_keeps_the_committed_close() {
        let db = Arc::new(Database::open_memory().unwrap());
        let clock = Arc::new(ManualClock::new(morning()));
        let notifier = Arc::new(RecordingNotifier::default());
        let streaks =
            StreakTracker::new(Arc::new(LockedStreaks), clock.clone(), CanonicalZone::utc());
        let manager = SessionManager::new(
            db.clone(),
            db.clone(),
            streaks,
            notifier.clone(),
            clock.clone(),
            SessionPolicy::default(),
        );
        let session = manager.start_session("u1", None, 25).unwrap();
        clock.advance(Duration::minutes(25));

        let closed = manager.end_session("u1", &session.id, true).unwrap();
        assert!(closed.session.completed);
        assert!(closed.streak.is_none());
        assert!(notifier.seen.lock().unwrap().is_empty());

        let stored = db.find_session(&session.id).unwrap().unwrap();
        assert_eq!(stored.duration_min, Some(25));
        assert!(matches!(
            manager.end_session("u1", &session.id, true),
            Err(CoreError::InvalidState(_))
        ));
    }

    #[test]
    fn seventh_consecutive_day_is_a_milestone() {
        let f = fixture(morning(), SessionPolicy::default());
        for _ in 0..7 {
            let session = f.manager.start_session("u1", None, 25).unwrap();
            f.clock.advance(Duration::minutes(20));
            f.manager.end_session("u1", &session.id, true).unwrap();
            f.clock.advance(Duration::days(1) - Duration::minutes(20));
        }
        let seen = f.notifier.seen.lock().unwrap();
        assert_eq!(seen.len(), 7);
        assert_eq!(seen[6].0, CelebrationKind::StreakMilestone);
        assert_eq!(seen[6].1["streak_current"], 7);
        assert!(seen[..6]
            .iter()
            .all(|(kind, _)| *kind == CelebrationKind::FocusSessionCompleted));
    }

    #[test]
    fn active_session_reports_elapsed_minutes() {
        let f = fixture(morning(), SessionPolicy::default());
        assert!(f.manager.get_active_session("u1").unwrap().is_none());
        f.manager.start_session("u1", None, 50).unwrap();
        f.clock.advance(Duration::seconds(12 * 60 + 40));
        let active = f.manager.get_active_session("u1").unwrap().unwrap();
        assert_eq!(active.elapsed_minutes, 13);
        assert_eq!(active.session.planned_duration_min, 50);
    }

    #[test]
    fn sweep_closes_only_stale_sessions() {
        let f = fixture(morning(), SessionPolicy::default());
        f.manager.start_session("u1", None, 25).unwrap();
        f.clock.advance(Duration::hours(20));
        f.manager.start_session("u2", None, 25).unwrap();
        f.clock.advance(Duration::hours(5));

        assert_eq!(f.manager.sweep_stale_sessions().unwrap(), 1);
        assert!(f.manager.get_active_session("u1").unwrap().is_none());
        assert!(f.manager.get_active_session("u2").unwrap().is_some());
        assert_eq!(f.manager.sweep_stale_sessions().unwrap(), 0);
    }

    #[test]
    fn list_sessions_rejects_inverted_ranges() {
        let f = fixture(morning(), SessionPolicy::default());
        f.manager.start_session("u1", None, 25).unwrap();
        let listed = f
            .manager
            .list_sessions("u1", morning(), morning() + Duration::hours(1))
            .unwrap();
        assert_eq!(listed.len(), 1);
        assert!(f
            .manager
            .list_sessions("u1", morning(), morning() - Duration::hours(1))
            .is_err());
    }
}
