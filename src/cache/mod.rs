// Shared expiring store, its key layout, and the response cache built on it.

pub mod keys;
pub mod operations;
pub mod store;

pub use operations::{CacheError, ResponseCache};
pub use store::{CounterStore, MemoryStore, RedisStore, StoreError, StoreResult};
