//! Cache Entry Module
//!
//! Defines the structure for individual cache entries with TTL support.
//! An entry records either a resolved photo URL or the fact that the lookup
//! failed; the two kinds age out under different TTLs.

use serde::{Deserialize, Serialize};

// == Cache Entry ==
/// Represents a single lookup outcome with its write time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    /// The lookup key (item slug)
    pub key: String,
    /// Resolved value, None when the lookup failed
    pub value: Option<String>,
    /// Write timestamp (Unix milliseconds)
    pub stored_at: u64,
    /// True when the last attempt produced no value
    pub failed: bool,
}

/// Storage form of an entry. The key lives in the storage name, not the body.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct StoredEntry {
    pub value: Option<String>,
    pub stored_at: u64,
    pub failed: bool,
}

impl CacheEntry {
    // == Constructor ==
    /// Creates a new entry stamped at `now_ms`.
    ///
    /// `failed` is derived from the value: an absent value is a failure.
    pub fn new(key: impl Into<String>, value: Option<String>, now_ms: u64) -> Self {
        let failed = value.is_none();
        Self {
            key: key.into(),
            value,
            stored_at: now_ms,
            failed,
        }
    }

    // == Is Expired ==
    /// Checks if the entry has outlived `ttl_ms` at `now_ms`.
    ///
    /// Boundary condition: once the full TTL has elapsed the entry is expired,
    /// so validity is `now - stored_at < ttl`. A timestamp from the future
    /// (clock skew) counts as age zero.
    pub fn is_expired(&self, now_ms: u64, ttl_ms: u64) -> bool {
        now_ms.saturating_sub(self.stored_at) >= ttl_ms
    }

    // == Time To Live ==
    /// Returns remaining validity in milliseconds, 0 once expired.
    pub fn ttl_remaining_ms(&self, now_ms: u64, ttl_ms: u64) -> u64 {
        ttl_ms.saturating_sub(now_ms.saturating_sub(self.stored_at))
    }

    pub(crate) fn to_stored(&self) -> StoredEntry {
        StoredEntry {
            value: self.value.clone(),
            stored_at: self.stored_at,
            failed: self.failed,
        }
    }

    /// Rebuilds an entry from its stored form.
    ///
    /// Returns None for a successful entry without a value.
    pub(crate) fn from_stored(key: &str, stored: StoredEntry) -> Option<Self> {
        if !stored.failed && stored.value.is_none() {
            return None;
        }
        Some(Self {
            key: key.to_string(),
            // A failed entry never carries a value, whatever the body says.
            value: if stored.failed { None } else { stored.value },
            stored_at: stored.stored_at,
            failed: stored.failed,
        })
    }
}
