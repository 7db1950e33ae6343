//! In-memory activity log for tests. No database required.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use hoopfeed_common::{
    Activity, ActivityId, ActivityKind, EngagementError, LikeKey, NewActivity, Result, Target,
    UserId,
};

use crate::log::{ActivityLog, FeedQuery};

#[derive(Default)]
struct State {
    next_id: ActivityId,
    rows: Vec<Activity>,
    fail_appends: bool,
    offline: bool,
}

/// Thread-safe fake with the same uniqueness rule as the Postgres index and
/// switches for deterministic failure injection.
pub struct MemoryActivityLog {
    state: Mutex<State>,
}

impl Default for MemoryActivityLog {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryActivityLog {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                next_id: 1,
                ..State::default()
            }),
        }
    }

    /// Make every subsequent `append` fail with `StoreUnavailable`.
    pub fn fail_appends(&self, fail: bool) {
        self.state.lock().unwrap().fail_appends = fail;
    }

    /// Make every call fail with `StoreUnavailable`.
    pub fn set_offline(&self, offline: bool) {
        self.state.lock().unwrap().offline = offline;
    }

    /// All stored events in insertion order (for test assertions).
    pub fn events(&self) -> Vec<Activity> {
        self.state.lock().unwrap().rows.clone()
    }

    /// Append with an explicit timestamp, bypassing failure switches. Used to
    /// seed fixtures with controlled ordering.
    pub fn insert_at(&self, activity: NewActivity, created_at: DateTime<Utc>) -> Activity {
        let mut state = self.state.lock().unwrap();
        push(&mut state, activity, created_at)
    }

    fn check_online(&self) -> Result<()> {
        if self.state.lock().unwrap().offline {
            return Err(EngagementError::StoreUnavailable("activity log offline".into()));
        }
        Ok(())
    }

    fn newest_first(&self, filter: impl Fn(&Activity) -> bool, limit: usize) -> Vec<Activity> {
        let state = self.state.lock().unwrap();
        let mut rows: Vec<Activity> = state.rows.iter().filter(|a| filter(a)).cloned().collect();
        rows.sort_by(|a, b| a.recency_cmp(b));
        rows.truncate(limit);
        rows
    }
}

fn push(state: &mut State, activity: NewActivity, created_at: DateTime<Utc>) -> Activity {
    let stored = Activity {
        id: state.next_id,
        user_id: activity.user_id,
        kind: activity.kind,
        target: activity.target,
        created_at,
    };
    state.next_id += 1;
    state.rows.push(stored.clone());
    stored
}

#[async_trait]
impl ActivityLog for MemoryActivityLog {
    async fn append(&self, activity: NewActivity) -> Result<Activity> {
        let mut state = self.state.lock().unwrap();
        if state.offline || state.fail_appends {
            return Err(EngagementError::StoreUnavailable("activity append failed".into()));
        }
        if activity.kind.is_like()
            && state.rows.iter().any(|row| {
                row.user_id == activity.user_id
                    && row.kind == activity.kind
                    && row.target == activity.target
            })
        {
            return Err(EngagementError::DuplicateLike);
        }
        Ok(push(&mut state, activity, Utc::now()))
    }

    async fn find_like(&self, key: &LikeKey) -> Result<Option<Activity>> {
        self.check_online()?;
        let kind = key.kind();
        let state = self.state.lock().unwrap();
        Ok(state
            .rows
            .iter()
            .find(|row| row.user_id == key.user_id && row.kind == kind && row.target == key.target)
            .cloned())
    }

    async fn remove_like(&self, id: ActivityId) -> Result<bool> {
        self.check_online()?;
        let mut state = self.state.lock().unwrap();
        let before = state.rows.len();
        state.rows.retain(|row| !(row.id == id && row.kind.is_like()));
        Ok(state.rows.len() < before)
    }

    async fn read_feed(&self, query: &FeedQuery) -> Result<Vec<Activity>> {
        self.check_online()?;
        Ok(self.newest_first(|a| query.includes(a), query.limit))
    }

    async fn read_by_actor(&self, user_id: UserId, limit: usize) -> Result<Vec<Activity>> {
        self.check_online()?;
        Ok(self.newest_first(|a| a.user_id == user_id, limit))
    }

    async fn read_by_target(&self, target: Target, limit: usize) -> Result<Vec<Activity>> {
        self.check_online()?;
        Ok(self.newest_first(|a| a.target == target, limit))
    }

    async fn count_by_targets(
        &self,
        kind: ActivityKind,
        target_ids: &[i64],
    ) -> Result<HashMap<i64, i64>> {
        self.check_online()?;
        let state = self.state.lock().unwrap();
        let mut counts = HashMap::new();
        for row in state.rows.iter().filter(|row| row.kind == kind) {
            let id = row.target.id();
            if target_ids.contains(&id) {
                *counts.entry(id).or_insert(0) += 1;
            }
        }
        Ok(counts)
    }

    async fn count_since(&self, query: &FeedQuery, since: Option<DateTime<Utc>>) -> Result<i64> {
        self.check_online()?;
        let state = self.state.lock().unwrap();
        let count = state
            .rows
            .iter()
            .filter(|a| query.includes(a))
            .filter(|a| since.map_or(true, |ts| a.created_at > ts))
            .take(query.limit)
            .count();
        Ok(count as i64)
    }
}
