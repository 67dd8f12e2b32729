//! Expiring key-value store used for rate-limit counters and cached responses.

mod memory;
mod redis_store;

use std::time::Duration;

use async_trait::async_trait;

pub use self::memory::MemoryStore;
pub use self::redis_store::{RECONNECT_BACKOFF, RedisStore};

/// `ttl` result for a key that does not exist (or has already expired).
pub const TTL_KEY_MISSING: i64 = -2;

/// `ttl` result for a key that exists but carries no expiry.
pub const TTL_NO_EXPIRY: i64 = -1;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("store round trip exceeded {0:?}")]
    Timeout(Duration),

    #[error("store connection is closed")]
    Closed,

    #[error("store is unreachable, waiting before the next connection attempt")]
    Disconnected,

    #[error("value at `{0}` is not an integer")]
    NotAnInteger(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Capability the rate limiter and response cache depend on.
///
/// Every method is a network round trip in production, so implementations must
/// not hold an in-process lock across an `.await`.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Atomically increments the integer at `key`, creating it at 0 first if
    /// absent, and returns the post-increment value.
    async fn increment(&self, key: &str) -> StoreResult<i64>;

    /// Sets the expiry of an existing key. No-op when the key is absent.
    async fn expire(&self, key: &str, ttl_secs: u64) -> StoreResult<()>;

    /// Remaining seconds to live, or [`TTL_KEY_MISSING`] / [`TTL_NO_EXPIRY`].
    async fn ttl(&self, key: &str) -> StoreResult<i64>;

    async fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// Stores `value` at `key` with an expiry, replacing whatever was there.
    async fn set(&self, key: &str, value: &str, ttl_secs: u64) -> StoreResult<()>;

    async fn delete(&self, key: &str) -> StoreResult<()>;

    /// Increments `key` and gives it `ttl_secs` of life if this increment
    /// created it.
    ///
    /// The default is two round trips: a crash between them leaves a counter
    /// without expiry. Stores with server-side scripting override this with a
    /// single atomic step.
    async fn increment_with_expiry(&self, key: &str, ttl_secs: u64) -> StoreResult<i64> {
        let current = self.increment(key).await?;
        if current == 1 {
            self.expire(key, ttl_secs).await?;
        }
        Ok(current)
    }

    async fn ping(&self) -> StoreResult<()>;

    /// Releases the underlying connection. Later calls fail with
    /// [`StoreError::Closed`].
    async fn close(&self) -> StoreResult<()>;
}
