use std::sync::Arc;

use serde::{Serialize, de::DeserializeOwned};

use crate::cache::store::{CounterStore, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("cached value could not be (de)serialized: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Memoizes read-endpoint payloads as JSON text in the shared store.
///
/// Writes are unconditional (last writer wins) and entries live for a fixed
/// time from the write; reads never extend them. The cache is an optimization
/// only: [`ResponseCache::get`] reports any failure as a miss and
/// [`ResponseCache::set`] swallows failures after logging them.
#[derive(Clone)]
pub struct ResponseCache {
    store: Arc<dyn CounterStore>,
    default_ttl_secs: u64,
}

impl ResponseCache {
    pub fn new(store: Arc<dyn CounterStore>, default_ttl_secs: u64) -> Self {
        Self {
            store,
            default_ttl_secs,
        }
    }

    /// Looks up `key`, distinguishing a miss (`Ok(None)`) from a failure.
    pub async fn lookup<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, CacheError> {
        match self.store.get(key).await? {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    /// Returns the cached value, or `None` on a miss, an unreachable store or
    /// an undecodable entry.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        match self.lookup(key).await {
            Ok(Some(value)) => {
                tracing::debug!("Cache hit: {}", key);
                Some(value)
            }
            Ok(None) => {
                tracing::debug!("Cache miss: {}", key);
                None
            }
            Err(CacheError::Serialization(e)) => {
                tracing::warn!("Discarding undecodable cache entry {}: {}", key, e);
                None
            }
            Err(e) => {
                tracing::error!("Cache read failed for {}, treating as miss: {}", key, e);
                None
            }
        }
    }

    /// Stores `value` under `key` for the default expiry.
    pub async fn set<T: Serialize>(&self, key: &str, value: &T) {
        self.set_with_ttl(key, value, self.default_ttl_secs).await;
    }

    pub async fn set_with_ttl<T: Serialize>(&self, key: &str, value: &T, ttl_secs: u64) {
        if let Err(e) = self.store_value(key, value, ttl_secs).await {
            tracing::error!("Cache write failed for {}: {}", key, e);
        }
    }

    async fn store_value<T: Serialize>(&self, key: &str, value: &T, ttl_secs: u64) -> Result<(), CacheError> {
        let json = serde_json::to_string(value)?;
        self.store.set(key, &json, ttl_secs).await?;
        Ok(())
    }
}
