//! Cache Store Module
//!
//! Session cache of lookup outcomes on top of a pluggable key/value storage.
//! Successful and failed outcomes expire under separate TTLs; expired and
//! corrupt entries are dropped lazily when read.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, warn};

use crate::cache::entry::StoredEntry;
use crate::cache::{CacheEntry, CacheStats, Clock, KeyValueStore};
use crate::config::Config;
use crate::error::{HydrateError, Result};

// == Lookup ==
/// Outcome of a cache read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    /// A valid entry exists. `None` is a cached failure.
    Hit(Option<String>),
    /// Nothing usable; the key needs a fetch.
    Miss,
}

impl Lookup {
    pub fn is_hit(&self) -> bool {
        matches!(self, Lookup::Hit(_))
    }
}

// == Cache Store ==
/// Best-effort cache of photo lookups.
pub struct CacheStore {
    /// Backing storage
    storage: Arc<dyn KeyValueStore>,
    /// Time source for stamping and aging entries
    clock: Arc<dyn Clock>,
    /// Namespace prepended to every key
    prefix: String,
    /// TTL for entries holding a value, in milliseconds
    success_ttl_ms: u64,
    /// TTL for failed entries, in milliseconds
    failed_ttl_ms: u64,
    /// Performance statistics
    stats: Mutex<CacheStats>,
}

impl std::fmt::Debug for CacheStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheStore")
            .field("prefix", &self.prefix)
            .field("success_ttl_ms", &self.success_ttl_ms)
            .field("failed_ttl_ms", &self.failed_ttl_ms)
            .finish_non_exhaustive()
    }
}

impl CacheStore {
    // == Constructor ==
    /// Creates a new CacheStore.
    ///
    /// # Arguments
    /// * `storage` - Backing key/value storage
    /// * `clock` - Time source
    /// * `prefix` - Storage name prefix
    /// * `success_ttl_ms` - Validity of resolved values
    /// * `failed_ttl_ms` - Validity of failures, expected to be shorter
    pub fn new(
        storage: Arc<dyn KeyValueStore>,
        clock: Arc<dyn Clock>,
        prefix: impl Into<String>,
        success_ttl_ms: u64,
        failed_ttl_ms: u64,
    ) -> Self {
        Self {
            storage,
            clock,
            prefix: prefix.into(),
            success_ttl_ms,
            failed_ttl_ms,
            stats: Mutex::new(CacheStats::new()),
        }
    }

    /// Creates a CacheStore using the TTLs and prefix from `config`.
    pub fn from_config(
        config: &Config,
        storage: Arc<dyn KeyValueStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self::new(
            storage,
            clock,
            config.storage_prefix.clone(),
            config.success_ttl_ms(),
            config.failed_ttl_ms(),
        )
    }

    // == Get ==
    /// Looks up `key`.
    ///
    /// Returns `Hit` only for an entry still inside the TTL of its class.
    /// Expired or undecodable entries are removed and reported as `Miss`.
    pub fn get(&self, key: &str) -> Lookup {
        let name = self.storage_name(key);

        let Some(raw) = self.storage.get(&name) else {
            self.stats().record_miss();
            return Lookup::Miss;
        };

        let entry = match decode(key, &raw) {
            Ok(entry) => entry,
            Err(err) => {
                debug!(key, error = %err, "Discarding corrupt cache entry");
                self.storage.delete(&name);
                self.stats().record_corrupt();
                return Lookup::Miss;
            }
        };

        if entry.is_expired(self.clock.now_ms(), self.ttl_for(entry.failed)) {
            debug!(key, failed = entry.failed, "Cache entry expired");
            self.storage.delete(&name);
            self.stats().record_expired();
            return Lookup::Miss;
        }

        let mut stats = self.stats();
        if entry.failed {
            stats.record_negative_hit();
        } else {
            stats.record_hit();
        }
        Lookup::Hit(entry.value)
    }

    // == Peek ==
    /// Like `get`, but leaves the statistics and the storage untouched.
    ///
    /// For re-checking a key whose read was already accounted for.
    pub fn peek(&self, key: &str) -> Lookup {
        let Some(raw) = self.storage.get(&self.storage_name(key)) else {
            return Lookup::Miss;
        };
        match decode(key, &raw) {
            Ok(entry) if !entry.is_expired(self.clock.now_ms(), self.ttl_for(entry.failed)) => {
                Lookup::Hit(entry.value)
            }
            _ => Lookup::Miss,
        }
    }

    // == Put ==
    /// Records the outcome of a lookup, replacing any previous entry.
    ///
    /// Storage failures are logged and swallowed; the cache is best-effort.
    pub fn put(&self, key: &str, value: Option<String>) {
        match self.try_put(key, value) {
            Ok(()) => self.stats().record_write(),
            Err(err) => {
                warn!(key, error = %err, "Cache write failed, continuing uncached");
                self.stats().record_write_failure();
            }
        }
    }

    fn try_put(&self, key: &str, value: Option<String>) -> Result<()> {
        let entry = CacheEntry::new(key, value, self.clock.now_ms());
        let body = serde_json::to_string(&entry.to_stored())?;
        self.storage.set(&self.storage_name(key), &body)
    }

    // == Remove ==
    /// Drops the entry for `key`, if any.
    pub fn remove(&self, key: &str) {
        self.storage.delete(&self.storage_name(key));
    }

    // == TTL ==
    /// Returns the TTL in milliseconds for the given entry class.
    pub fn ttl_for(&self, failed: bool) -> u64 {
        if failed {
            self.failed_ttl_ms
        } else {
            self.success_ttl_ms
        }
    }

    // == Stats ==
    /// Returns a snapshot of the current statistics.
    pub fn snapshot_stats(&self) -> CacheStats {
        self.stats().clone()
    }

    fn stats(&self) -> MutexGuard<'_, CacheStats> {
        self.stats.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn storage_name(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }
}

/// Decodes a stored body, rejecting inconsistent ones.
fn decode(key: &str, raw: &str) -> Result<CacheEntry> {
    let stored: StoredEntry = serde_json::from_str(raw)?;
    CacheEntry::from_stored(key, stored).ok_or_else(|| {
        HydrateError::MalformedPayload(format!("successful cache entry for {key} has no value"))
    })
}
