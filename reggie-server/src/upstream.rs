//! Fallback to the public npm registry for packages not hosted locally.

use crate::error::{ApiError, ApiResult};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

/// Configuration for the upstream npm registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Base URL of the upstream registry
    pub npm_url: String,
    /// HTTP request timeout, in seconds
    pub timeout_secs: u64,
    /// Whether unknown packages are looked up upstream
    pub enabled: bool,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            npm_url: "https://registry.npmjs.org".to_string(),
            timeout_secs: 30,
            enabled: true,
        }
    }
}

impl UpstreamConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

pub struct UpstreamClient {
    client: Client,
    config: UpstreamConfig,
}

impl UpstreamClient {
    pub fn new(config: UpstreamConfig) -> ApiResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout())
            .user_agent(concat!("reggie/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ApiError::Internal(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self { client, config })
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Upstream URL of a registry document, e.g. `["express"]` or `["express", "4.18.2"]`.
    pub fn document_url(&self, segments: &[&str]) -> ApiResult<Url> {
        let mut url = Url::parse(&self.config.npm_url)
            .map_err(|e| ApiError::Internal(format!("Invalid upstream URL: {e}")))?;
        url.path_segments_mut()
            .map_err(|()| ApiError::Internal("Upstream URL cannot be a base".to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Fetch an npm registry document.
    ///
    /// `Ok(None)` when lookups are disabled or upstream does not have the document.
    pub async fn fetch_npm_document(&self, segments: &[&str]) -> ApiResult<Option<Value>> {
        if !self.config.enabled {
            debug!(document = ?segments, "Upstream lookup disabled");
            return Ok(None);
        }

        let url = self.document_url(segments)?;
        debug!(url = %url, "Fetching npm document upstream");

        let response = self
            .client
            .get(url.clone())
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| {
                warn!(url = %url, error = %e, "Upstream request failed");
                ApiError::Upstream(e.to_string())
            })?;

        match response.status() {
            status if status.is_success() => {
                let document = response
                    .json()
                    .await
                    .map_err(|e| {
                        ApiError::Upstream(format!("Failed to parse upstream response: {e}"))
                    })?;
                info!(document = ?segments, "Served from upstream npm registry");
                Ok(Some(document))
            }
            StatusCode::NOT_FOUND => Ok(None),
            status => Err(ApiError::Upstream(format!(
                "upstream answered {status} for {url}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_url() {
        let client = UpstreamClient::new(UpstreamConfig::default()).unwrap();
        assert_eq!(
            client.document_url(&["express"]).unwrap().as_str(),
            "https://registry.npmjs.org/express"
        );
        assert_eq!(
            client
                .document_url(&["express", "4.18.2"])
                .unwrap()
                .as_str(),
            "https://registry.npmjs.org/express/4.18.2"
        );
    }

    #[test]
    fn test_document_url_keeps_base_path() {
        let client = UpstreamClient::new(UpstreamConfig {
            npm_url: "https://mirror.example.com/npm/".to_string(),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(
            client.document_url(&["left-pad"]).unwrap().as_str(),
            "https://mirror.example.com/npm/left-pad"
        );
    }

    #[tokio::test]
    async fn test_disabled_upstream_returns_none() {
        let client = UpstreamClient::new(UpstreamConfig {
            enabled: false,
            ..Default::default()
        })
        .unwrap();
        assert!(!client.is_enabled());
        let document = client.fetch_npm_document(&["express"]).await.unwrap();
        assert!(document.is_none());
    }
}
