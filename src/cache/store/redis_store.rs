use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use redis::aio::{ConnectionManager, ConnectionManagerConfig};
use redis::{AsyncCommands, Client, RedisResult, Script};
use tokio::time::Instant;

use super::{CounterStore, StoreError, StoreResult};

/// INCR and, on the 0 -> 1 transition, EXPIRE in one server-side step.
const INCREMENT_WITH_EXPIRY: &str = r#"
local current = redis.call('INCR', KEYS[1])
if current == 1 then
    redis.call('EXPIRE', KEYS[1], ARGV[1])
end
return current
"#;

/// How long a failed connection attempt short-circuits later calls.
pub const RECONNECT_BACKOFF: Duration = Duration::from_millis(500);

enum Slot {
    Disconnected { retry_after: Option<Instant> },
    Connected(ConnectionManager),
    Closed,
}

/// Redis-backed store sharing one managed connection across the process.
///
/// The connection is opened lazily. Once established, the manager re-dials on
/// its own after an I/O failure, so a Redis restart costs the calls made while
/// it is down and nothing more.
pub struct RedisStore {
    client: Client,
    slot: RwLock<Slot>,
    timeout: Duration,
    increment_script: Script,
}

impl RedisStore {
    /// Builds the store and makes a first connection attempt. Only a malformed
    /// URL is an error; an unreachable server is retried on demand.
    pub async fn connect(redis_url: &str, timeout: Duration) -> StoreResult<Self> {
        let store = Self {
            client: Client::open(redis_url)?,
            slot: RwLock::new(Slot::Disconnected { retry_after: None }),
            timeout,
            increment_script: Script::new(INCREMENT_WITH_EXPIRY),
        };

        match store.connection().await {
            Ok(_) => tracing::info!("Connected to Redis at {}", redis_url),
            Err(e) => tracing::warn!("Redis at {} is unreachable, retrying on demand: {}", redis_url, e),
        }

        Ok(store)
    }

    /// Returns the live manager, `None` when a new attempt is due.
    fn established(&self) -> StoreResult<Option<ConnectionManager>> {
        match &*self.slot.read() {
            Slot::Connected(manager) => Ok(Some(manager.clone())),
            Slot::Closed => Err(StoreError::Closed),
            Slot::Disconnected { retry_after: Some(at) } if Instant::now() < *at => Err(StoreError::Disconnected),
            Slot::Disconnected { .. } => Ok(None),
        }
    }

    fn settle(&self, attempt: StoreResult<ConnectionManager>) -> StoreResult<ConnectionManager> {
        let mut slot = self.slot.write();
        match &*slot {
            // close() won the race, or a concurrent attempt already connected.
            Slot::Closed => return Err(StoreError::Closed),
            Slot::Connected(existing) => return Ok(existing.clone()),
            Slot::Disconnected { .. } => {}
        }

        match attempt {
            Ok(manager) => {
                *slot = Slot::Connected(manager.clone());
                Ok(manager)
            }
            Err(e) => {
                *slot = Slot::Disconnected {
                    retry_after: Some(Instant::now() + RECONNECT_BACKOFF),
                };
                Err(e)
            }
        }
    }

    // Slot guards are only taken inside the sync helpers, never across an await.
    async fn connection(&self) -> StoreResult<ConnectionManager> {
        if let Some(manager) = self.established()? {
            return Ok(manager);
        }

        let config = ConnectionManagerConfig::new().set_connection_timeout(self.timeout);
        let attempt = self
            .bounded(ConnectionManager::new_with_config(self.client.clone(), config))
            .await;
        self.settle(attempt)
    }

    async fn bounded<T, F>(&self, command: F) -> StoreResult<T>
    where
        F: Future<Output = RedisResult<T>>,
    {
        match tokio::time::timeout(self.timeout, command).await {
            Ok(result) => result.map_err(StoreError::from),
            Err(_) => Err(StoreError::Timeout(self.timeout)),
        }
    }
}

#[async_trait]
impl CounterStore for RedisStore {
    async fn increment(&self, key: &str) -> StoreResult<i64> {
        let mut conn = self.connection().await?;
        self.bounded(conn.incr(key, 1)).await
    }

    async fn expire(&self, key: &str, ttl_secs: u64) -> StoreResult<()> {
        let mut conn = self.connection().await?;
        let _: () = self.bounded(conn.expire(key, ttl_secs as i64)).await?;
        Ok(())
    }

    async fn ttl(&self, key: &str) -> StoreResult<i64> {
        let mut conn = self.connection().await?;
        self.bounded(conn.ttl(key)).await
    }

    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let mut conn = self.connection().await?;
        self.bounded(conn.get(key)).await
    }

    async fn set(&self, key: &str, value: &str, ttl_secs: u64) -> StoreResult<()> {
        let mut conn = self.connection().await?;
        let _: () = self.bounded(conn.set_ex(key, value, ttl_secs)).await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        let mut conn = self.connection().await?;
        let _: () = self.bounded(conn.del(key)).await?;
        Ok(())
    }

    async fn increment_with_expiry(&self, key: &str, ttl_secs: u64) -> StoreResult<i64> {
        let mut conn = self.connection().await?;
        let mut invocation = self.increment_script.key(key);
        invocation.arg(ttl_secs);
        self.bounded(invocation.invoke_async(&mut conn)).await
    }

    async fn ping(&self) -> StoreResult<()> {
        let mut conn = self.connection().await?;
        let _: String = self
            .bounded(redis::cmd("PING").query_async(&mut conn))
            .await?;
        Ok(())
    }

    async fn close(&self) -> StoreResult<()> {
        let previous = std::mem::replace(&mut *self.slot.write(), Slot::Closed);
        if matches!(previous, Slot::Connected(_)) {
            tracing::info!("Redis connection closed");
        }
        Ok(())
    }
}
