//! Source key-value store abstraction
//!
//! The migration only needs three capabilities from the source store:
//! enumerate keys, read one value, and flush everything. Implementations
//! must tolerate concurrent `read` calls from every worker.

mod memory;
mod redis_store;

pub use memory::MemoryStore;
pub use redis_store::RedisStore;

use crate::error::StoreResult;

/// Trait for source store implementations
pub trait KeyValueStore: Send + Sync {
    /// List keys matching a glob pattern, in a stable order
    fn keys(&self, pattern: &str) -> StoreResult<Vec<String>>;

    /// Read the raw (encoded) value stored under a key
    fn read(&self, key: &str) -> StoreResult<String>;

    /// Remove every key from the selected database
    fn flush(&self) -> StoreResult<()>;
}
