//! RedisCounterStore: `HINCRBY` / `HGET` on per-entity hashes.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::{ConnectionManager, ConnectionManagerConfig};
use redis::Client;
use tracing::{debug, info};

use hoopfeed_common::{bounded, EngagementError, Result};

use crate::counter::{CounterKey, CounterStore};

#[derive(Clone)]
pub struct RedisCounterStore {
    connection: ConnectionManager,
    timeout: Duration,
}

pub(crate) fn redis_error(e: redis::RedisError) -> EngagementError {
    EngagementError::StoreUnavailable(format!("redis: {e}"))
}

impl RedisCounterStore {
    /// Open a managed connection. The manager reconnects on its own after
    /// transport failures.
    pub async fn connect(redis_url: &str, timeout: Duration) -> Result<Self> {
        let config = ConnectionManagerConfig::new()
            .set_number_of_retries(1)
            .set_connection_timeout(timeout);

        let client = Client::open(redis_url).map_err(redis_error)?;
        let connection = bounded(timeout, "counters.connect", async {
            client
                .get_connection_manager_with_config(config)
                .await
                .map_err(redis_error)
        })
        .await?;

        info!("Connected to counter store");
        Ok(Self::new(connection, timeout))
    }

    pub fn new(connection: ConnectionManager, timeout: Duration) -> Self {
        Self {
            connection,
            timeout,
        }
    }
}

#[async_trait]
impl CounterStore for RedisCounterStore {
    async fn increment(&self, key: CounterKey, field: &str, by: i64) -> Result<i64> {
        let mut conn = self.connection.clone();
        let value: i64 = bounded(self.timeout, "counters.increment", async {
            redis::cmd("HINCRBY")
                .arg(key.to_string())
                .arg(field)
                .arg(by)
                .query_async(&mut conn)
                .await
                .map_err(redis_error)
        })
        .await?;

        debug!(key = %key, field, value, "Incremented counter");
        Ok(value)
    }

    async fn get(&self, key: CounterKey, field: &str) -> Result<Option<i64>> {
        let mut conn = self.connection.clone();
        bounded(self.timeout, "counters.get", async {
            let value: Option<i64> = redis::cmd("HGET")
                .arg(key.to_string())
                .arg(field)
                .query_async(&mut conn)
                .await
                .map_err(redis_error)?;
            Ok(value)
        })
        .await
    }
}
