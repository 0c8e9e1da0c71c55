//! HTTP Resolver
//!
//! Looks up an item's detail payload from the backend and extracts its
//! photo URL.

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use crate::config::Config;
use crate::error::{HydrateError, Result};
use crate::resolver::{extract_photo_url, Resolver};

// == Http Resolver ==
/// Resolves keys through `GET {base_url}/{key}`.
#[derive(Debug, Clone)]
pub struct HttpResolver {
    client: reqwest::Client,
    base_url: Url,
    photo_fields: Vec<String>,
}

impl HttpResolver {
    // == Constructor ==
    /// Builds a resolver with a client that enforces the configured timeout.
    pub fn from_config(config: &Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.resolve_timeout())
            .build()?;
        Self::with_client(client, &config.api_base_url, config.photo_fields.clone())
    }

    /// Builds a resolver on top of an existing client.
    pub fn with_client(
        client: reqwest::Client,
        base_url: &str,
        photo_fields: Vec<String>,
    ) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| HydrateError::InvalidConfig(format!("api base url: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(HydrateError::InvalidConfig(format!(
                "api base url cannot be a base: {base_url}"
            )));
        }
        Ok(Self {
            client,
            base_url,
            photo_fields,
        })
    }

    // == Detail Url ==
    /// Returns the detail URL for `key`, with the key encoded as one path segment.
    pub fn detail_url(&self, key: &str) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push(key);
        }
        url
    }

    async fn fetch_photo(&self, key: &str) -> Result<String> {
        let response = self
            .client
            .get(self.detail_url(key))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    HydrateError::Timeout(key.to_string())
                } else {
                    HydrateError::Http(e)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(HydrateError::Status {
                key: key.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await?;
        let payload: Value = serde_json::from_slice(&body)
            .map_err(|e| HydrateError::MalformedPayload(e.to_string()))?;

        extract_photo_url(&payload, &self.photo_fields)
            .ok_or_else(|| HydrateError::MissingField(key.to_string()))
    }
}

#[async_trait]
impl Resolver for HttpResolver {
    async fn resolve(&self, key: &str) -> Option<String> {
        match self.fetch_photo(key).await {
            Ok(url) => {
                debug!(key, url = %url, "Resolved photo");
                Some(url)
            }
            Err(HydrateError::MissingField(_)) => {
                debug!(key, "Item has no photo");
                None
            }
            Err(err) => {
                warn!(key, error = %err, "Photo lookup failed");
                None
            }
        }
    }
}
