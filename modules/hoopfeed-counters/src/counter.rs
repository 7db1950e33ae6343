use std::fmt;

use async_trait::async_trait;
use hoopfeed_common::{Result, Target};

/// Hash field holding view counts.
pub const VIEW_COUNT_FIELD: &str = "view_count";

/// Hash key `"{entityType}:{entityID}"`, e.g. `story:42`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CounterKey(pub Target);

impl fmt::Display for CounterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.0.target_type().as_str(), self.0.id())
    }
}

impl From<Target> for CounterKey {
    fn from(target: Target) -> Self {
        CounterKey(target)
    }
}

/// Atomic increment store.
///
/// Implemented by `RedisCounterStore` (production) and `MemoryCounterStore` (tests).
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Atomically add `by` to the field and return the new value.
    async fn increment(&self, key: CounterKey, field: &str, by: i64) -> Result<i64>;

    /// Current value, or `None` if the field was never written.
    async fn get(&self, key: CounterKey, field: &str) -> Result<Option<i64>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_uses_storage_names() {
        assert_eq!(CounterKey(Target::Story(42)).to_string(), "story:42");
        assert_eq!(CounterKey(Target::Place(7)).to_string(), "hoop:7");
    }
}
