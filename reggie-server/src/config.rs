//! # Server Configuration
//!
//! [`ServerConfig`] is loaded from an optional JSON file and then overridden by
//! command-line flags. Every field has a default, so a partial file is valid:
//!
//! ```json
//! {
//!   "port": 8080,
//!   "public_host": "registry.internal",
//!   "prefix": "/s3cr3t",
//!   "store": { "data_dir": "/srv/reggie" },
//!   "upstream": { "enabled": false }
//! }
//! ```

use crate::upstream::UpstreamConfig;
use reggie_store::StoreConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::debug;

/// Default request body limit for tarball uploads (100 MiB)
pub const DEFAULT_MAX_UPLOAD_SIZE: usize = 100 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the listener binds to
    pub host: String,
    pub port: u16,
    /// Host name clients use to reach the registry
    pub public_host: String,
    /// Externally visible registry URL, overriding the derived one
    pub registry_url: Option<String>,
    /// Path prefix every route is mounted under
    pub prefix: Option<String>,
    /// Largest accepted request body, in bytes
    pub max_upload_size: usize,
    pub store: StoreConfig,
    pub upstream: UpstreamConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            public_host: "0.0.0.0".to_string(),
            registry_url: None,
            prefix: None,
            max_upload_size: DEFAULT_MAX_UPLOAD_SIZE,
            store: StoreConfig::default(),
            upstream: UpstreamConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from a JSON file.
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        let config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Load configuration from a JSON file, falling back to defaults when it is absent.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            debug!(path = %path.display(), "Server config not found, using defaults");
            Ok(Self::default())
        }
    }

    /// Route prefix with a leading slash and no trailing slash, or `None` for the root.
    pub fn normalized_prefix(&self) -> Option<String> {
        let trimmed = self.prefix.as_deref()?.trim().trim_matches('/');
        if trimmed.is_empty() {
            None
        } else {
            Some(format!("/{trimmed}"))
        }
    }

    /// URL clients use for the registry, always ending in `/`.
    pub fn registry_url(&self) -> String {
        let url = match self.registry_url.as_deref().map(str::trim) {
            Some(url) if !url.is_empty() => url.to_string(),
            _ => format!(
                "http://{}:{}{}",
                self.public_host,
                self.port,
                self.normalized_prefix().unwrap_or_default()
            ),
        };
        if url.ends_with('/') {
            url
        } else {
            format!("{url}/")
        }
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
