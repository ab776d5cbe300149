//! Shared helpers for store integration tests

#![allow(dead_code)]

use anyhow::Result;
use flate2::write::GzEncoder;
use flate2::Compression;
use reggie_store::{PackageStore, StoreConfig};
use serde_json::{json, Value};
use tempfile::TempDir;

/// Gzip tarball laid out like `npm pack` output.
pub fn tarball(manifest: &Value) -> Vec<u8> {
    let body = serde_json::to_vec_pretty(manifest).expect("manifest serializes");
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

/// A store over a fresh temporary data directory with its layout created.
pub async fn create_test_store() -> Result<(TempDir, PackageStore)> {
    let temp_dir = TempDir::new()?;
    let store = PackageStore::open(StoreConfig::new(temp_dir.path())).await?;
    Ok((temp_dir, store))
}

/// Stage and ingest a tarball for `name@version` without asserting either.
pub async fn publish(store: &PackageStore, manifest: &Value) -> Result<()> {
    let staged = store.stage_upload(&tarball(manifest), "upload", None).await?;
    store.ingest(&staged, None, None).await?;
    Ok(())
}

/// Publish a bare `name@version` manifest.
pub async fn publish_version(store: &PackageStore, name: &str, version: &str) -> Result<()> {
    publish(store, &json!({"name": name, "version": version})).await
}

pub fn temp_is_empty(store: &PackageStore) -> bool {
    std::fs::read_dir(store.config().temp_path())
        .map(|mut entries| entries.next().is_none())
        .unwrap_or(true)
}
