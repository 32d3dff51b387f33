//! In-process store
//!
//! Holds values in memory and records how it was used, so the pipeline can
//! be exercised without a Redis server.

use crate::error::{StoreError, StoreResult};
use crate::store::KeyValueStore;
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Thread-safe in-memory key-value store
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: RwLock<BTreeMap<String, String>>,
    /// Keys whose reads fail
    failing: RwLock<HashSet<String>>,
    /// Enumeration failure to report, if any
    enumerate_error: Mutex<Option<String>>,
    reads: AtomicUsize,
    /// Read count observed at each flush
    flushes: Mutex<Vec<usize>>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store from key/value pairs
    pub fn from_pairs<K, V, I>(pairs: I) -> Self
    where
        K: Into<String>,
        V: Into<String>,
        I: IntoIterator<Item = (K, V)>,
    {
        let store = Self::new();
        for (key, value) in pairs {
            store.insert(key, value);
        }
        store
    }

    /// Insert or replace a value
    pub fn insert(&self, key: impl Into<String>, value: impl Into<String>) {
        self.values.write().insert(key.into(), value.into());
    }

    /// Make reads of `key` fail
    pub fn fail_reads_of(&self, key: impl Into<String>) {
        self.failing.write().insert(key.into());
    }

    /// Make enumeration fail with `reason`
    pub fn fail_enumeration(&self, reason: impl Into<String>) {
        *self.enumerate_error.lock() = Some(reason.into());
    }

    /// Number of keys currently stored
    pub fn len(&self) -> usize {
        self.values.read().len()
    }

    /// Whether the store is empty
    pub fn is_empty(&self) -> bool {
        self.values.read().is_empty()
    }

    /// Total `read` calls so far
    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    /// Read count at the time of each flush, in call order
    pub fn flushes(&self) -> Vec<usize> {
        self.flushes.lock().clone()
    }
}

/// Match a Redis-style glob supporting `*` and `?`
fn glob_match(pattern: &[u8], text: &[u8]) -> bool {
    match (pattern.first(), text.first()) {
        (None, None) => true,
        (Some(b'*'), _) => {
            glob_match(&pattern[1..], text) || (!text.is_empty() && glob_match(pattern, &text[1..]))
        }
        (Some(b'?'), Some(_)) => glob_match(&pattern[1..], &text[1..]),
        (Some(p), Some(t)) if p == t => glob_match(&pattern[1..], &text[1..]),
        _ => false,
    }
}

impl KeyValueStore for MemoryStore {
    fn keys(&self, pattern: &str) -> StoreResult<Vec<String>> {
        if let Some(reason) = self.enumerate_error.lock().clone() {
            return Err(StoreError::EnumerateFailed {
                pattern: pattern.to_string(),
                reason,
            });
        }

        Ok(self
            .values
            .read()
            .keys()
            .filter(|k| glob_match(pattern.as_bytes(), k.as_bytes()))
            .cloned()
            .collect())
    }

    fn read(&self, key: &str) -> StoreResult<String> {
        self.reads.fetch_add(1, Ordering::SeqCst);

        if self.failing.read().contains(key) {
            return Err(StoreError::ReadFailed {
                key: key.to_string(),
                reason: "injected failure".into(),
            });
        }

        self.values
            .read()
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::Missing {
                key: key.to_string(),
            })
    }

    fn flush(&self) -> StoreResult<()> {
        self.flushes.lock().push(self.read_count());
        self.values.write().clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_glob_match() {
        assert!(glob_match(b"*", b"anything"));
        assert!(glob_match(b"*", b""));
        assert!(glob_match(b"doc:*", b"doc:1"));
        assert!(!glob_match(b"doc:*", b"user:1"));
        assert!(glob_match(b"doc:?", b"doc:1"));
        assert!(!glob_match(b"doc:?", b"doc:12"));
    }

    #[test]
    fn test_keys_sorted_and_filtered() {
        let store = MemoryStore::from_pairs([("b", "1"), ("a", "2"), ("_design/x", "3")]);
        assert_eq!(store.keys("*").unwrap(), vec!["_design/x", "a", "b"]);
        assert_eq!(store.keys("a*").unwrap(), vec!["a"]);
    }

    #[test]
    fn test_read_and_failures() {
        let store = MemoryStore::from_pairs([("a", "YQ==")]);
        assert_eq!(store.read("a").unwrap(), "YQ==");
        assert!(matches!(store.read("b"), Err(StoreError::Missing { .. })));

        store.fail_reads_of("a");
        assert!(matches!(store.read("a"), Err(StoreError::ReadFailed { .. })));
        assert_eq!(store.read_count(), 3);
    }

    #[test]
    fn test_flush_records_read_count() {
        let store = MemoryStore::from_pairs([("a", "1"), ("b", "2")]);
        store.read("a").unwrap();
        store.flush().unwrap();
        assert!(store.is_empty());
        assert_eq!(store.flushes(), vec![1]);
    }

    #[test]
    fn test_enumeration_failure() {
        let store = MemoryStore::new();
        store.fail_enumeration("LOADING");
        assert!(matches!(
            store.keys("*"),
            Err(StoreError::EnumerateFailed { .. })
        ));
    }
}
