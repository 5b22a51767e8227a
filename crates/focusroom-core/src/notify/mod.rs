//! Celebratory notifications.
//!
//! Delivery is best-effort: the lifecycle manager logs a failed
//! [`Notifier::celebrate`] and carries on.

mod webhook;

pub use webhook::WebhookNotifier;

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::NotifyError;
use crate::storage::NotificationsConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CelebrationKind {
    FocusSessionCompleted,
    /// The focus streak reached a multiple of seven days.
    StreakMilestone,
}

impl CelebrationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CelebrationKind::FocusSessionCompleted => "focus_session_completed",
            CelebrationKind::StreakMilestone => "streak_milestone",
        }
    }
}

pub trait Notifier: Send + Sync {
    fn celebrate(
        &self,
        user_id: &str,
        kind: CelebrationKind,
        payload: &serde_json::Value,
    ) -> Result<(), NotifyError>;
}

/// Writes celebrations to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn celebrate(
        &self,
        user_id: &str,
        kind: CelebrationKind,
        payload: &serde_json::Value,
    ) -> Result<(), NotifyError> {
        info!(user_id, kind = kind.as_str(), %payload, "celebration");
        Ok(())
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNotifier;

impl Notifier for NoopNotifier {
    fn celebrate(
        &self,
        _user_id: &str,
        _kind: CelebrationKind,
        _payload: &serde_json::Value,
    ) -> Result<(), NotifyError> {
        Ok(())
    }
}

/// Pick a notifier from configuration.
///
/// Disabled notifications get a [`NoopNotifier`]; a configured webhook gets a
/// [`WebhookNotifier`]; everything else logs.
pub fn notifier_from_config(
    config: &NotificationsConfig,
) -> Result<Arc<dyn Notifier>, NotifyError> {
    if !config.enabled {
        return Ok(Arc::new(NoopNotifier));
    }
    match config.webhook_url.as_deref().map(str::trim) {
        Some(url) if !url.is_empty() => Ok(Arc::new(WebhookNotifier::new(
            url,
            Duration::from_secs(config.timeout_secs),
        )?)),
        _ => Ok(Arc::new(LogNotifier)),
    }
}
