//! "New activity since you last looked" bookkeeping.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::debug;

use hoopfeed_common::{require_user, Result, UserId};
use hoopfeed_entities::EntityRepository;
use hoopfeed_events::{ActivityLog, FeedQuery};

pub struct UnseenActivity {
    log: Arc<dyn ActivityLog>,
    entities: Arc<dyn EntityRepository>,
    page_size: usize,
}

impl UnseenActivity {
    pub fn new(
        log: Arc<dyn ActivityLog>,
        entities: Arc<dyn EntityRepository>,
        page_size: usize,
    ) -> Self {
        Self {
            log,
            entities,
            page_size,
        }
    }

    pub async fn mark_checked(&self, user_id: UserId, at: DateTime<Utc>) -> Result<()> {
        require_user(user_id)?;
        self.entities.mark_activity_checked(user_id, at).await?;
        debug!(user_id, checked_at = %at, "Activity marked checked");
        Ok(())
    }

    /// Events by other users newer than the user's last check, capped at the
    /// feed page size. A user who never checked sees the whole window.
    pub async fn unseen_count(&self, user_id: UserId) -> Result<i64> {
        require_user(user_id)?;
        let since = self.entities.last_activity_check(user_id).await?;
        let query = FeedQuery::new(user_id, true, self.page_size);
        self.log.count_since(&query, since).await
    }
}
