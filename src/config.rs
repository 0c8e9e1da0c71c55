//! Configuration Module
//!
//! Handles loading and managing hydrator configuration from environment variables.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{HydrateError, Result};

/// JSON pointers tried, in order, when extracting a photo URL from a payload.
pub const DEFAULT_PHOTO_FIELDS: &[&str] = &[
    "/photo_url",
    "/image_url",
    "/image",
    "/photos/0/url",
    "/photos/0",
    "/data/photo_url",
    "/data/image",
];

/// Hydrator configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Maximum number of lookups in flight at once
    pub max_concurrent: usize,
    /// Maximum number of lazy-mode admissions per session
    pub max_hydrate_limit: usize,
    /// How long a successful lookup is reused, in seconds
    pub success_ttl: u64,
    /// How long a failed lookup is reused, in seconds
    pub failed_ttl: u64,
    /// Pre-fetch distance before an element enters the viewport, in pixels
    pub visibility_margin: u32,
    /// Per-lookup network timeout in milliseconds
    pub resolve_timeout_ms: u64,
    /// Prefix prepended to every key in the backing storage
    pub storage_prefix: String,
    /// Base URL of the item detail endpoint; the key is appended as a path segment
    pub api_base_url: String,
    /// JSON pointers tried when extracting the photo URL
    pub photo_fields: Vec<String>,
    /// Image shown for items without a known photo
    pub fallback_photo: String,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `HYDRATOR_MAX_CONCURRENT` - Concurrent lookups (default: 2)
    /// - `HYDRATOR_MAX_HYDRATE_LIMIT` - Lazy admissions per session (default: 60)
    /// - `HYDRATOR_SUCCESS_TTL_SECS` - Success TTL (default: 86400)
    /// - `HYDRATOR_FAILED_TTL_SECS` - Failure TTL (default: 300)
    /// - `HYDRATOR_VISIBILITY_MARGIN_PX` - Pre-fetch margin (default: 200)
    /// - `HYDRATOR_RESOLVE_TIMEOUT_MS` - Lookup timeout (default: 8000)
    /// - `HYDRATOR_STORAGE_PREFIX` - Storage key prefix (default: `photo-cache:`)
    /// - `HYDRATOR_API_BASE_URL` - Detail endpoint base URL
    /// - `HYDRATOR_PHOTO_FIELDS` - Comma-separated JSON pointers
    /// - `HYDRATOR_FALLBACK_PHOTO` - Placeholder image (default: `/images/placeholder.jpg`)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_concurrent: parse_var("HYDRATOR_MAX_CONCURRENT").unwrap_or(defaults.max_concurrent),
            max_hydrate_limit: parse_var("HYDRATOR_MAX_HYDRATE_LIMIT")
                .unwrap_or(defaults.max_hydrate_limit),
            success_ttl: parse_var("HYDRATOR_SUCCESS_TTL_SECS").unwrap_or(defaults.success_ttl),
            failed_ttl: parse_var("HYDRATOR_FAILED_TTL_SECS").unwrap_or(defaults.failed_ttl),
            visibility_margin: parse_var("HYDRATOR_VISIBILITY_MARGIN_PX")
                .unwrap_or(defaults.visibility_margin),
            resolve_timeout_ms: parse_var("HYDRATOR_RESOLVE_TIMEOUT_MS")
                .unwrap_or(defaults.resolve_timeout_ms),
            storage_prefix: env::var("HYDRATOR_STORAGE_PREFIX").unwrap_or(defaults.storage_prefix),
            api_base_url: env::var("HYDRATOR_API_BASE_URL").unwrap_or(defaults.api_base_url),
            photo_fields: env::var("HYDRATOR_PHOTO_FIELDS")
                .ok()
                .map(|raw| split_fields(&raw))
                .filter(|fields| !fields.is_empty())
                .unwrap_or(defaults.photo_fields),
            fallback_photo: env::var("HYDRATOR_FALLBACK_PHOTO").unwrap_or(defaults.fallback_photo),
        }
    }

    // == Validate ==
    /// Rejects configurations that would break scheduler invariants.
    pub fn validate(&self) -> Result<()> {
        if self.max_concurrent == 0 {
            return Err(HydrateError::InvalidConfig(
                "max_concurrent must be at least 1".to_string(),
            ));
        }
        if self.failed_ttl >= self.success_ttl {
            return Err(HydrateError::InvalidConfig(format!(
                "failed_ttl ({}s) must be shorter than success_ttl ({}s)",
                self.failed_ttl, self.success_ttl
            )));
        }
        Ok(())
    }

    /// Success TTL in milliseconds, saturating for very large values.
    pub fn success_ttl_ms(&self) -> u64 {
        self.success_ttl.saturating_mul(1000)
    }

    /// Failure TTL in milliseconds, saturating for very large values.
    pub fn failed_ttl_ms(&self) -> u64 {
        self.failed_ttl.saturating_mul(1000)
    }

    /// Per-lookup timeout as a Duration.
    pub fn resolve_timeout(&self) -> Duration {
        Duration::from_millis(self.resolve_timeout_ms)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_concurrent: 2,
            max_hydrate_limit: 60,
            success_ttl: 24 * 60 * 60,
            failed_ttl: 5 * 60,
            visibility_margin: 200,
            resolve_timeout_ms: 8000,
            storage_prefix: "photo-cache:".to_string(),
            api_base_url: "http://localhost:3000/api/villages".to_string(),
            photo_fields: DEFAULT_PHOTO_FIELDS.iter().map(|f| f.to_string()).collect(),
            fallback_photo: "/images/placeholder.jpg".to_string(),
        }
    }
}

fn parse_var<T: FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

fn split_fields(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .map(str::to_string)
        .collect()
}
