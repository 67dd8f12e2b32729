use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::time::Instant;

use super::{CounterStore, StoreError, StoreResult, TTL_KEY_MISSING, TTL_NO_EXPIRY};

/// Minimum time between scans that drop expired keys nobody reads again.
const SWEEP_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|at| at > now)
    }
}

#[derive(Debug, Default)]
struct Entries {
    map: HashMap<String, Entry>,
    last_sweep: Option<Instant>,
}

/// In-process store with the same expiry semantics as Redis.
///
/// Selected with `REDIS_URL=memory` and used as the store in tests. An expired
/// key is dropped when it is next touched, and a periodic sweep catches keys
/// that never are. Time comes from `tokio::time`, so a paused test clock
/// drives expiry.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<Entries>,
    closed: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn ensure_open(&self) -> StoreResult<()> {
        if self.closed.load(Ordering::Acquire) {
            Err(StoreError::Closed)
        } else {
            Ok(())
        }
    }

    /// Runs `f` with `key` already purged if it has expired.
    fn with_entry<T>(
        &self,
        key: &str,
        f: impl FnOnce(&mut HashMap<String, Entry>, Instant) -> T,
    ) -> StoreResult<T> {
        self.ensure_open()?;
        let now = Instant::now();
        let mut entries = self.entries.lock();

        if entries.map.get(key).is_some_and(|entry| !entry.is_live(now)) {
            entries.map.remove(key);
        }
        let sweep_due = entries
            .last_sweep
            .is_none_or(|at| now.duration_since(at) >= SWEEP_INTERVAL);
        if sweep_due {
            entries.map.retain(|_, entry| entry.is_live(now));
            entries.last_sweep = Some(now);
        }

        Ok(f(&mut entries.map, now))
    }

    #[cfg(test)]
    fn stored_keys(&self) -> usize {
        self.entries.lock().map.len()
    }

    fn increment_locked(entries: &mut HashMap<String, Entry>, key: &str) -> StoreResult<i64> {
        let entry = entries.entry(key.to_string()).or_insert_with(|| Entry {
            value: "0".to_string(),
            expires_at: None,
        });
        let current = entry
            .value
            .parse::<i64>()
            .map_err(|_| StoreError::NotAnInteger(key.to_string()))?
            + 1;
        entry.value = current.to_string();
        Ok(current)
    }
}

#[async_trait]
impl CounterStore for MemoryStore {
    async fn increment(&self, key: &str) -> StoreResult<i64> {
        self.with_entry(key, |entries, _| Self::increment_locked(entries, key))?
    }

    async fn expire(&self, key: &str, ttl_secs: u64) -> StoreResult<()> {
        self.with_entry(key, |entries, now| {
            if let Some(entry) = entries.get_mut(key) {
                entry.expires_at = Some(now + Duration::from_secs(ttl_secs));
            }
        })
    }

    async fn ttl(&self, key: &str) -> StoreResult<i64> {
        self.with_entry(key, |entries, now| match entries.get(key) {
            None => TTL_KEY_MISSING,
            Some(Entry { expires_at: None, .. }) => TTL_NO_EXPIRY,
            // Redis rounds the remaining milliseconds to the nearest second.
            Some(Entry { expires_at: Some(at), .. }) => {
                let remaining = at.saturating_duration_since(now).as_millis() as i64;
                (remaining + 500) / 1000
            }
        })
    }

    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        self.with_entry(key, |entries, _| entries.get(key).map(|entry| entry.value.clone()))
    }

    async fn set(&self, key: &str, value: &str, ttl_secs: u64) -> StoreResult<()> {
        self.with_entry(key, |entries, now| {
            entries.insert(
                key.to_string(),
                Entry {
                    value: value.to_string(),
                    expires_at: Some(now + Duration::from_secs(ttl_secs)),
                },
            );
        })
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        self.with_entry(key, |entries, _| {
            entries.remove(key);
        })
    }

    async fn increment_with_expiry(&self, key: &str, ttl_secs: u64) -> StoreResult<i64> {
        self.with_entry(key, |entries, now| {
            let current = Self::increment_locked(entries, key)?;
            if current == 1 {
                if let Some(entry) = entries.get_mut(key) {
                    entry.expires_at = Some(now + Duration::from_secs(ttl_secs));
                }
            }
            Ok(current)
        })?
    }

    async fn ping(&self) -> StoreResult<()> {
        self.ensure_open()
    }

    async fn close(&self) -> StoreResult<()> {
        self.closed.store(true, Ordering::Release);
        self.entries.lock().map.clear();
        Ok(())
    }
}
