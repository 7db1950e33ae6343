//! Event Store adapter: the durable, ordered, append-only activity log.
//!
//! Rows are immutable. The only deletion path is reversing a like, and only
//! like events can be removed.

pub mod log;
pub mod memory;
pub mod store;
#[cfg(feature = "test-utils")]
pub mod testutil;

pub use log::{ActivityLog, FeedQuery};
pub use memory::MemoryActivityLog;
pub use store::{append_in, store_error, PgActivityLog, LIKE_UNIQUE_INDEX};
