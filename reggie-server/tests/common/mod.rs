//! Common test utilities for the HTTP tests

#![allow(dead_code)]

use anyhow::Result;
use axum_test::TestServer;
use flate2::write::GzEncoder;
use flate2::Compression;
use reggie_server::{build_router, AppState, ServerConfig, UpstreamClient};
use reggie_store::{PackageStore, StoreConfig};
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::TempDir;

pub const REGISTRY_URL: &str = "http://registry.test:8080/";

/// Test server plus the directory backing its store
pub struct TestSetup {
    pub temp_dir: TempDir,
    pub state: Arc<AppState>,
    pub server: TestServer,
}

/// Gzip tarball laid out like `npm pack` output.
pub fn tarball(manifest: &Value) -> Vec<u8> {
    let body = serde_json::to_vec(manifest).expect("manifest serializes");
    let encoder = GzEncoder::new(Vec::new(), Compression::default());
    let mut builder = tar::Builder::new(encoder);

    let mut header = tar::Header::new_gnu();
    header.set_size(body.len() as u64);
    header.set_mode(0o644);
    header.set_cksum();
    builder
        .append_data(&mut header, "package/package.json", body.as_slice())
        .expect("append manifest");

    builder
        .into_inner()
        .and_then(|encoder| encoder.finish())
        .expect("finish tarball")
}

pub fn simple_tarball(name: &str, version: &str) -> Vec<u8> {
    tarball(&json!({"name": name, "version": version}))
}

/// Server over a fresh data directory with upstream lookups disabled.
pub async fn create_test_setup() -> Result<TestSetup> {
    create_test_setup_with(|_| {}).await
}

pub async fn create_test_setup_with<F>(customize: F) -> Result<TestSetup>
where
    F: FnOnce(&mut ServerConfig),
{
    let temp_dir = TempDir::new()?;

    let mut config = ServerConfig {
        registry_url: Some(REGISTRY_URL.to_string()),
        store: StoreConfig::new(temp_dir.path()),
        ..Default::default()
    };
    config.upstream.enabled = false;
    customize(&mut config);

    let store = PackageStore::open(config.store.clone()).await?;
    let upstream_client = UpstreamClient::new(config.upstream.clone())?;
    let state = Arc::new(AppState::new(store, upstream_client, config));

    let server = TestServer::new(build_router(state.clone()))?;
    Ok(TestSetup {
        temp_dir,
        state,
        server,
    })
}

/// Upload `name@version` through the package API.
pub async fn upload(server: &TestServer, name: &str, version: &str) {
    server
        .put(&format!("/package/{name}/{version}"))
        .bytes(simple_tarball(name, version).into())
        .await
        .assert_status_ok();
}
