//! Cache Module
//!
//! Session-scoped, TTL-bounded cache of photo lookups with a shorter TTL for
//! failed lookups, backed by pluggable key/value storage.

mod clock;
mod entry;
mod stats;
mod storage;
mod store;

#[cfg(test)]
mod property_tests;

// Re-export public types
pub use clock::{Clock, ManualClock, SystemClock};
pub use entry::CacheEntry;
pub use stats::CacheStats;
pub use storage::{KeyValueStore, MemoryStore};
pub use store::{CacheStore, Lookup};
