//! # Focusroom Core Library
//!
//! Business logic behind the `focusroom` CLI: focus-session lifecycle, day
//! streaks, a 0-100 productivity score and windowed activity reports.
//!
//! ## Architecture
//!
//! - **Sessions**: [`SessionManager`] opens, closes and reconciles focus
//!   sessions. At most one session per user is open; SQLite enforces it.
//! - **Streaks**: [`StreakTracker`] keeps per-user, per-activity day counters
//!   in a canonical timezone.
//! - **Score**: [`compute_score`] turns a snapshot of inputs into a score;
//!   [`Reporter`] gathers those inputs and computes the weekly trend.
//! - **Storage**: SQLite for facts, TOML for [`Config`].
//!
//! [`Focusroom`] wires all of it to one database, clock and notifier.

pub mod calendar;
pub mod clock;
pub mod error;
pub mod facts;
pub mod notify;
pub mod score;
pub mod service;
pub mod session;
pub mod stats;
pub mod storage;
pub mod streak;

pub use calendar::{CanonicalZone, DateRange};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{ConfigError, CoreError, DatabaseError, ErrorKind, NotifyError};
pub use facts::{ActivityLog, NoteFact, TaskDirectory, TaskFact, TaskSummary};
pub use notify::{CelebrationKind, LogNotifier, NoopNotifier, Notifier, WebhookNotifier};
pub use score::{
    compute_score, compute_trend, ScoreBreakdown, ScoreInputs, ScoreTrend, ScoreWeights, Trend,
};
pub use service::{CompletedTask, Focusroom};
pub use session::{
    ActiveSession, ClosedSession, OvernightPolicy, Session, SessionManager, SessionPolicy,
    SessionStore,
};
pub use stats::{AggregateStats, Comparison, MetricTotals, Period, Reporter, ScoreReport};
pub use storage::{Config, Database};
pub use streak::{
    ActivityType, Streak, StreakChange, StreakStatus, StreakTracker, StreakUpdate,
};
