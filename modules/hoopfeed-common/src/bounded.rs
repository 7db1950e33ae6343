//! Per-call timeouts for store adapters.

use std::future::Future;
use std::time::Duration;

use crate::error::{EngagementError, Result};

/// Run a store call with an upper bound on its duration. Expiry surfaces as
/// `StoreUnavailable`, the same as any other transport failure.
pub async fn bounded<T, F>(timeout: Duration, op: &'static str, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result,
        Err(_) => Err(EngagementError::StoreUnavailable(format!(
            "{op} timed out after {}ms",
            timeout.as_millis()
        ))),
    }
}
