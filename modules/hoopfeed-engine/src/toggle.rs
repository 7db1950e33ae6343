//! Like state derived from the activity log.
//!
//! "Liked" means an undeleted like event exists for `(actor, target, type)`.
//! Toggling deletes that event or appends a new one; there is no separate like
//! row to keep in sync.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use hoopfeed_common::{ActivityKind, EngagementError, LikeKey, Result, Target, UserId};
use hoopfeed_events::ActivityLog;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ToggleOutcome {
    Liked,
    Unliked,
}

impl ToggleOutcome {
    pub fn is_liked(self) -> bool {
        self == ToggleOutcome::Liked
    }
}

pub struct LikeToggler {
    log: Arc<dyn ActivityLog>,
}

impl LikeToggler {
    pub fn new(log: Arc<dyn ActivityLog>) -> Self {
        Self { log }
    }

    /// Flip the like state of `target` for `user_id`.
    ///
    /// The existence check runs immediately before the write. If a concurrent
    /// toggle wins the append, the store's uniqueness index rejects ours and the
    /// target is reported liked; if it wins the delete, the target is reported
    /// unliked. Either way at most one like event survives.
    pub async fn toggle_like(&self, user_id: UserId, target: Target) -> Result<ToggleOutcome> {
        let key = LikeKey::new(user_id, target)?;

        match self.log.find_like(&key).await? {
            Some(existing) => {
                if !self.log.remove_like(existing.id).await? {
                    debug!(user_id, target = %target, "Like already removed by a concurrent toggle");
                }
                info!(user_id, target = %target, activity_id = existing.id, "Like removed");
                Ok(ToggleOutcome::Unliked)
            }
            None => match self.log.append(key.to_new_activity()).await {
                Ok(stored) => {
                    info!(user_id, target = %target, activity_id = stored.id, "Like added");
                    Ok(ToggleOutcome::Liked)
                }
                Err(EngagementError::DuplicateLike) => {
                    debug!(user_id, target = %target, "Like already added by a concurrent toggle");
                    Ok(ToggleOutcome::Liked)
                }
                Err(e) => Err(e),
            },
        }
    }

    pub async fn is_liked(&self, user_id: UserId, target: Target) -> Result<bool> {
        let key = LikeKey::new(user_id, target)?;
        Ok(self.log.find_like(&key).await?.is_some())
    }

    /// Undeleted like events on a target.
    pub async fn like_count(&self, target: Target) -> Result<i64> {
        target.validate()?;
        let kind = ActivityKind::liked(target.target_type());
        let counts = self.log.count_by_targets(kind, &[target.id()]).await?;
        Ok(counts.get(&target.id()).copied().unwrap_or(0))
    }
}
