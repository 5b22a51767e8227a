use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::{ActivityType, Streak, StreakChange};
use crate::calendar::{day_gap, CanonicalZone};
use crate::clock::Clock;
use crate::error::{CoreError, Result};

/// Persistence for streak rows.
pub trait StreakStore: Send + Sync {
    fn find_streak(&self, user_id: &str, activity: ActivityType) -> Result<Option<Streak>>;

    /// Read-check-write of one streak row inside a single write transaction.
    ///
    /// `apply` receives the stored row (if any) and returns the row to persist,
    /// or `None` to leave storage untouched.
    fn modify_streak(
        &self,
        user_id: &str,
        activity: ActivityType,
        apply: &mut dyn FnMut(Option<Streak>) -> Option<Streak>,
    ) -> Result<()>;
}

/// Outcome of [`StreakTracker::update`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreakUpdate {
    pub change: StreakChange,
    pub streak: Streak,
}

impl StreakUpdate {
    /// Weekly milestones are worth a louder celebration.
    pub fn is_milestone(&self) -> bool {
        self.change == StreakChange::Extended && self.streak.current % 7 == 0
    }
}

/// Read-only view of a streak, with values derived for "today".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreakStatus {
    pub user_id: String,
    pub activity_type: ActivityType,
    pub current: u32,
    pub longest: u32,
    pub last_credited: Option<NaiveDate>,
    /// `current`, or zero when the streak is already broken.
    pub effective_current: u32,
    pub credited_today: bool,
    /// Credited yesterday but not yet today.
    pub at_risk: bool,
}

#[derive(Clone)]
pub struct StreakTracker {
    store: Arc<dyn StreakStore>,
    clock: Arc<dyn Clock>,
    zone: CanonicalZone,
}

impl StreakTracker {
    pub fn new(store: Arc<dyn StreakStore>, clock: Arc<dyn Clock>, zone: CanonicalZone) -> Self {
        Self { store, clock, zone }
    }

    pub fn zone(&self) -> CanonicalZone {
        self.zone
    }

    pub fn today(&self) -> NaiveDate {
        self.zone.date_of(self.clock.now())
    }

    /// Credit one qualifying event for today.
    pub fn update(&self, user_id: &str, activity: ActivityType) -> Result<StreakUpdate> {
        if user_id.trim().is_empty() {
            return Err(CoreError::Unauthorized);
        }
        let today = self.today();

        let mut outcome: Option<StreakUpdate> = None;
        self.store.modify_streak(user_id, activity, &mut |existing| match existing {
            None => {
                let streak = Streak::start(user_id, activity, today);
                outcome = Some(StreakUpdate {
                    change: StreakChange::Started,
                    streak: streak.clone(),
                });
                Some(streak)
            }
            Some(mut streak) => {
                let change = streak.credit(today);
                outcome = Some(StreakUpdate {
                    change,
                    streak: streak.clone(),
                });
                change.wrote().then_some(streak)
            }
        })?;

        let update = outcome.ok_or_else(|| {
            CoreError::InvalidState(format!("streak update for {user_id} was not applied"))
        })?;

        match update.change {
            StreakChange::ClockAnomaly => warn!(
                user_id,
                activity = %activity,
                %today,
                last_credited = %update.streak.last_credited,
                "streak credit date precedes last credited date; ignoring"
            ),
            StreakChange::Unchanged => {
                debug!(user_id, activity = %activity, "streak already credited today")
            }
            change => info!(
                user_id,
                activity = %activity,
                ?change,
                current = update.streak.current,
                longest = update.streak.longest,
                "streak credited"
            ),
        }
        Ok(update)
    }

    pub fn status(&self, user_id: &str, activity: ActivityType) -> Result<StreakStatus> {
        if user_id.trim().is_empty() {
            return Err(CoreError::Unauthorized);
        }
        let today = self.today();
        let status = match self.store.find_streak(user_id, activity)? {
            Some(streak) => {
                let gap = day_gap(streak.last_credited, today);
                StreakStatus {
                    user_id: user_id.to_string(),
                    activity_type: activity,
                    current: streak.current,
                    longest: streak.longest,
                    last_credited: Some(streak.last_credited),
                    effective_current: streak.effective_current(today),
                    credited_today: gap <= 0,
                    at_risk: gap == 1,
                }
            }
            None => StreakStatus {
                user_id: user_id.to_string(),
                activity_type: activity,
                current: 0,
                longest: 0,
                last_credited: None,
                effective_current: 0,
                credited_today: false,
                at_risk: false,
            },
        };
        Ok(status)
    }
}
