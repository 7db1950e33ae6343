//! In-memory counter store for tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use hoopfeed_common::{EngagementError, Result};

use crate::counter::{CounterKey, CounterStore};

#[derive(Default)]
struct State {
    values: HashMap<(CounterKey, String), i64>,
    offline: bool,
}

/// Thread-safe fake. `set_offline(true)` makes every call fail the way an
/// unreachable Redis would.
#[derive(Default)]
pub struct MemoryCounterStore {
    state: Mutex<State>,
}

impl MemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_offline(&self, offline: bool) {
        self.state.lock().unwrap().offline = offline;
    }

    /// Seed a value directly (for fixtures).
    pub fn set(&self, key: CounterKey, field: &str, value: i64) {
        self.state
            .lock()
            .unwrap()
            .values
            .insert((key, field.to_string()), value);
    }

    /// Drop every counter, as a cache flush would.
    pub fn flush(&self) {
        self.state.lock().unwrap().values.clear();
    }
}

#[async_trait]
impl CounterStore for MemoryCounterStore {
    async fn increment(&self, key: CounterKey, field: &str, by: i64) -> Result<i64> {
        let mut state = self.state.lock().unwrap();
        if state.offline {
            return Err(EngagementError::StoreUnavailable("counter store offline".into()));
        }
        let value = state.values.entry((key, field.to_string())).or_insert(0);
        *value += by;
        Ok(*value)
    }

    async fn get(&self, key: CounterKey, field: &str) -> Result<Option<i64>> {
        let state = self.state.lock().unwrap();
        if state.offline {
            return Err(EngagementError::StoreUnavailable("counter store offline".into()));
        }
        Ok(state.values.get(&(key, field.to_string())).copied())
    }
}
