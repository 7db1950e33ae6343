//! Counter Store adapter: fast, non-durable `(entity type, id) -> count` hashes.
//!
//! Counters are best-effort telemetry. Nothing here is transactional with the
//! activity log, and losing a counter never affects likes or the feed.

pub mod counter;
pub mod memory;
pub mod redis_store;
#[cfg(feature = "test-utils")]
pub mod testutil;

pub use counter::{CounterKey, CounterStore, VIEW_COUNT_FIELD};
pub use memory::MemoryCounterStore;
pub use redis_store::RedisCounterStore;
