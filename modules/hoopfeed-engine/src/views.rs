//! View counts: best-effort increments in the counter store, merged into
//! entity lists at read time.

use std::sync::Arc;

use futures::future::join_all;
use tracing::{debug, warn};

use hoopfeed_common::{Result, Target};
use hoopfeed_counters::{CounterKey, CounterStore, VIEW_COUNT_FIELD};

use crate::rankings::{rank_desc, Ranked};

pub struct ViewTracker {
    counters: Arc<dyn CounterStore>,
}

impl ViewTracker {
    pub fn new(counters: Arc<dyn CounterStore>) -> Self {
        Self { counters }
    }

    /// Count one view of `target`. Counter failures are logged and swallowed:
    /// the result is `Ok(None)` and nothing else is affected. Only invalid
    /// input is an error.
    pub async fn record_view(&self, target: Target) -> Result<Option<i64>> {
        target.validate()?;

        match self
            .counters
            .increment(CounterKey(target), VIEW_COUNT_FIELD, 1)
            .await
        {
            Ok(count) => {
                debug!(target = %target, count, "View recorded");
                Ok(Some(count))
            }
            Err(e) => {
                warn!(target = %target, error = %e, "Failed to record view");
                Ok(None)
            }
        }
    }

    /// The stored count, or `None` when the target has never been viewed
    /// (or its counter was lost).
    pub async fn get_view_count(&self, target: Target) -> Result<Option<i64>> {
        target.validate()?;
        self.counters.get(CounterKey(target), VIEW_COUNT_FIELD).await
    }

    /// Rank `items` by view count, highest first. One counter lookup per item;
    /// missing or unreadable counters count as 0 and equal counts keep the
    /// input order.
    pub async fn most_viewed<T>(
        &self,
        items: Vec<T>,
        target_of: impl Fn(&T) -> Target,
    ) -> Vec<Ranked<T>> {
        let lookups = items.iter().map(|item| {
            let target = target_of(item);
            async move {
                match self.counters.get(CounterKey(target), VIEW_COUNT_FIELD).await {
                    Ok(count) => count.unwrap_or(0),
                    Err(e) => {
                        warn!(target = %target, error = %e, "View count unavailable, ranking as 0");
                        0
                    }
                }
            }
        });
        let scores = join_all(lookups).await;

        rank_desc(items.into_iter().zip(scores))
    }
}
