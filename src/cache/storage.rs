//! Storage Module
//!
//! Pluggable key/value backing for the cache store. Hosts provide their own
//! session-scoped storage; `MemoryStore` covers tests and plain processes.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use crate::error::{HydrateError, Result};

// == Key Value Store ==
/// Session-scoped string storage.
///
/// `set` may fail (quota, host restrictions); callers treat that as
/// "not cached" and move on.
pub trait KeyValueStore: Send + Sync {
    /// Returns the stored string for `name`, if any.
    fn get(&self, name: &str) -> Option<String>;

    /// Stores `value` under `name`, replacing any previous value.
    fn set(&self, name: &str, value: &str) -> Result<()>;

    /// Removes `name`. Removing a missing name is not an error.
    fn delete(&self, name: &str);
}

// == Memory Store ==
/// In-memory storage with an optional byte quota.
///
/// The quota counts name and value bytes, mirroring how browser session
/// storage accounts for its limit.
#[derive(Debug, Default)]
pub struct MemoryStore {
    items: Mutex<HashMap<String, String>>,
    quota: Option<usize>,
}

impl MemoryStore {
    // == Constructor ==
    /// Creates an unbounded store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store that rejects writes beyond `quota` bytes.
    pub fn with_quota(quota: usize) -> Self {
        Self {
            items: Mutex::new(HashMap::new()),
            quota: Some(quota),
        }
    }

    // == Length ==
    /// Returns the number of stored names.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    // == Is Empty ==
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Returns the bytes currently accounted against the quota.
    pub fn used_bytes(&self) -> usize {
        self.lock().iter().map(|(k, v)| k.len() + v.len()).sum()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.items.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, name: &str) -> Option<String> {
        self.lock().get(name).cloned()
    }

    fn set(&self, name: &str, value: &str) -> Result<()> {
        let mut items = self.lock();

        if let Some(quota) = self.quota {
            // The replaced value no longer counts once overwritten.
            let used: usize = items
                .iter()
                .filter(|(k, _)| k.as_str() != name)
                .map(|(k, v)| k.len() + v.len())
                .sum();
            let requested = name.len() + value.len();
            if used + requested > quota {
                return Err(HydrateError::QuotaExceeded {
                    used,
                    requested,
                    quota,
                });
            }
        }

        items.insert(name.to_string(), value.to_string());
        Ok(())
    }

    fn delete(&self, name: &str) {
        self.lock().remove(name);
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store_set_get_delete() {
        let store = MemoryStore::new();

        store.set("a", "1").unwrap();
        assert_eq!(store.get("a").as_deref(), Some("1"));

        store.delete("a");
        assert!(store.get("a").is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_delete_missing_is_noop() {
        let store = MemoryStore::new();
        store.delete("missing");
        assert_eq!(store.len(), 0);
    }

    #[test]
    fn test_quota_rejects_oversized_write() {
        let store = MemoryStore::with_quota(10);

        store.set("ab", "1234").unwrap();
        let result = store.set("cd", "12345");

        assert!(matches!(result, Err(HydrateError::QuotaExceeded { .. })));
        assert!(store.get("cd").is_none());
        assert_eq!(store.used_bytes(), 6);
    }

    #[test]
    fn test_quota_allows_overwrite_within_limit() {
        let store = MemoryStore::with_quota(10);

        store.set("ab", "12345678").unwrap();
        store.set("ab", "87654321").unwrap();

        assert_eq!(store.get("ab").as_deref(), Some("87654321"));
    }
}
