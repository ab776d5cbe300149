//! # Application State
//!
//! Shared by every handler as `State<Arc<AppState>>`.

use crate::config::ServerConfig;
use crate::upstream::UpstreamClient;
use reggie_store::PackageStore;
use serde::Serialize;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    /// The package store all routes read and write
    pub store: Arc<PackageStore>,
    /// Fallback registry for packages not hosted here
    pub upstream_client: Arc<UpstreamClient>,
    /// Externally visible registry URL ending in `/`, used in tarball links
    pub registry_url: String,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    pub fn new(store: PackageStore, upstream_client: UpstreamClient, config: ServerConfig) -> Self {
        Self {
            store: Arc::new(store),
            upstream_client: Arc::new(upstream_client),
            registry_url: config.registry_url(),
            config: Arc::new(config),
        }
    }
}

/// `{"ok": true, "id": ..., "rev": ...}` acknowledgement used by npm write routes
#[derive(Serialize, Debug, PartialEq, Eq)]
pub struct NpmAck {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
}

impl NpmAck {
    pub fn ok() -> Self {
        Self {
            ok: true,
            id: None,
            rev: None,
        }
    }

    pub fn revision(id: impl Into<String>) -> Self {
        Self {
            ok: true,
            id: Some(id.into()),
            rev: Some("1-0".to_string()),
        }
    }
}
