//! Resolver Module
//!
//! Turns a key into its photo URL. A resolver never fails past its boundary:
//! every error maps to an absent value, which the cache records as a failure
//! under the shorter TTL.

mod extract;
mod http;

use async_trait::async_trait;
use tracing::debug;

use crate::cache::CacheStore;

pub use extract::extract_photo_url;
pub use http::HttpResolver;

// == Resolver ==
/// One network round trip from key to photo URL.
#[async_trait]
pub trait Resolver: Send + Sync {
    /// Returns the photo URL for `key`, or None on any failure.
    async fn resolve(&self, key: &str) -> Option<String>;
}

// == Resolve And Record ==
/// Runs `resolver` for `key` and writes the outcome to `cache` before returning.
///
/// The write completes before the caller gets the value back, so anything
/// reacting to the result already sees the fresh entry.
pub async fn resolve_and_record(
    resolver: &dyn Resolver,
    cache: &CacheStore,
    key: &str,
) -> Option<String> {
    let value = resolver.resolve(key).await;
    debug!(key, found = value.is_some(), "Recording lookup outcome");
    cache.put(key, value.clone());
    value
}
