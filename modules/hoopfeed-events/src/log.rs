//! The store seam used by the engine.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hoopfeed_common::{Activity, ActivityId, ActivityKind, LikeKey, NewActivity, Result, Target, UserId};

/// Which slice of the log a feed reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeedQuery {
    pub viewer: UserId,
    /// Leave out the viewer's own events.
    pub exclude_self: bool,
    pub limit: usize,
}

impl FeedQuery {
    pub fn new(viewer: UserId, exclude_self: bool, limit: usize) -> Self {
        Self {
            viewer,
            exclude_self,
            limit,
        }
    }

    pub fn includes(&self, activity: &Activity) -> bool {
        !(self.exclude_self && activity.user_id == self.viewer)
    }
}

/// Append-only engagement log.
///
/// Implemented by `PgActivityLog` (postgres) and `MemoryActivityLog` (tests).
/// Every read returns events most recent first, ties broken by insertion order.
#[async_trait]
pub trait ActivityLog: Send + Sync {
    /// Append an event. For like kinds the store rejects a second event for the
    /// same `(actor, target, type)` with `DuplicateLike`.
    async fn append(&self, activity: NewActivity) -> Result<Activity>;

    /// The undeleted like event for this key, if any.
    async fn find_like(&self, key: &LikeKey) -> Result<Option<Activity>>;

    /// Delete a like event. Returns false if it was already gone. Non-like
    /// events are never deleted.
    async fn remove_like(&self, id: ActivityId) -> Result<bool>;

    /// The most recent events visible to a viewer.
    async fn read_feed(&self, query: &FeedQuery) -> Result<Vec<Activity>>;

    /// The most recent events performed by a user.
    async fn read_by_actor(&self, user_id: UserId, limit: usize) -> Result<Vec<Activity>>;

    /// The most recent events pointing at a target.
    async fn read_by_target(&self, target: Target, limit: usize) -> Result<Vec<Activity>>;

    /// Number of events of `kind` per target id. Ids with no events are absent.
    async fn count_by_targets(
        &self,
        kind: ActivityKind,
        target_ids: &[i64],
    ) -> Result<HashMap<i64, i64>>;

    /// Number of feed events newer than `since`, capped at `query.limit`.
    async fn count_since(&self, query: &FeedQuery, since: Option<DateTime<Utc>>) -> Result<i64>;
}
