//! # Package Index
//!
//! In-memory map of package name to [`PackageRecord`], backed by one metadata
//! document per package at `<metadata_dir>/<name>.json`.
//!
//! ## Concurrency
//!
//! The map lives behind an [`ArcSwap`]: readers take a snapshot without locking
//! and never observe a half-applied mutation. Writers build the next record off
//! to the side, persist its document, then publish the new map in one swap.
//!
//! Mutations for a single name are serialized by a per-name [`NameGuard`]
//! obtained from [`PackageIndex::lock`]. Guards for different names never
//! contend, and there is no index-wide lock. Every mutating method takes the
//! guard as proof that the caller holds it.

use crate::error::{StoreError, StoreResult};
use crate::storage;
use crate::version;
use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info};

/// Descriptive fields taken from manifests and metadata documents
pub const DESCRIPTIVE_FIELDS: [&str; 3] = ["description", "author", "repository"];

/// One stored version of a package.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionRecord {
    /// Exact version string, equal to the one declared in the archive's manifest
    pub version: String,
    /// Full manifest from the archive
    pub data: Value,
    /// Ingestion time (modification time of the stored tarball)
    pub time: DateTime<Utc>,
    /// Location of the stored tarball
    pub path: PathBuf,
    /// SHA1 of the tarball, hex encoded
    pub shasum: String,
}

impl VersionRecord {
    /// File name of the stored tarball, `<name>-<version>.tgz`.
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageRecord {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository: Option<Value>,
    #[serde(default)]
    pub versions: BTreeMap<String, VersionRecord>,
}

impl PackageRecord {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            author: None,
            repository: None,
            versions: BTreeMap::new(),
        }
    }

    /// Copy the descriptive fields present (and non-null) in `document` over this record.
    ///
    /// Returns whether any field was taken from the document.
    pub fn merge_descriptive(&mut self, document: &Value) -> bool {
        let Some(object) = document.as_object() else {
            return false;
        };

        let mut merged = false;
        for key in DESCRIPTIVE_FIELDS {
            let Some(value) = object.get(key).filter(|v| !v.is_null()) else {
                continue;
            };
            let slot = match key {
                "description" => &mut self.description,
                "author" => &mut self.author,
                _ => &mut self.repository,
            };
            *slot = Some(value.clone());
            merged = true;
        }
        merged
    }

    /// Version strings sorted by precedence, lowest first.
    pub fn version_list(&self) -> Vec<String> {
        let mut versions: Vec<String> = self.versions.keys().cloned().collect();
        version::sort_versions(&mut versions);
        versions
    }

    /// Highest version by precedence.
    pub fn latest(&self) -> Option<String> {
        version::max_satisfying(self.versions.keys(), &version::Range::Latest)
    }
}

/// Exclusive hold on one package name.
///
/// Released on drop.
pub struct NameGuard {
    name: String,
    _guard: OwnedMutexGuard<()>,
}

impl NameGuard {
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl std::fmt::Debug for NameGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NameGuard")
            .field("name", &self.name)
            .finish()
    }
}

pub type IndexMap = HashMap<String, Arc<PackageRecord>>;

pub struct PackageIndex {
    records: ArcSwap<IndexMap>,
    guards: parking_lot::Mutex<HashMap<String, Arc<Mutex<()>>>>,
    metadata_dir: PathBuf,
}

impl PackageIndex {
    pub fn new(metadata_dir: impl Into<PathBuf>) -> Self {
        Self {
            records: ArcSwap::from_pointee(HashMap::new()),
            guards: parking_lot::Mutex::new(HashMap::new()),
            metadata_dir: metadata_dir.into(),
        }
    }

    pub fn metadata_dir(&self) -> &Path {
        &self.metadata_dir
    }

    /// Path of the metadata document for `name`.
    pub fn document_path(&self, name: &str) -> PathBuf {
        self.metadata_dir.join(format!("{name}.json"))
    }

    /// Acquire the per-name guard, creating it on first use.
    pub async fn lock(&self, name: &str) -> NameGuard {
        let mutex = {
            let mut guards = self.guards.lock();
            Arc::clone(guards.entry(name.to_string()).or_default())
        };
        let guard = mutex.lock_owned().await;
        debug!(package = %name, "Acquired package guard");
        NameGuard {
            name: name.to_string(),
            _guard: guard,
        }
    }

    /// Current state of the whole index.
    pub fn snapshot(&self) -> Arc<IndexMap> {
        self.records.load_full()
    }

    pub fn get(&self, name: &str) -> Option<Arc<PackageRecord>> {
        self.records.load().get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.records.load().contains_key(name)
    }

    /// All package names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.records.load().keys().cloned().collect();
        names.sort();
        names
    }

    /// Versions of `name` sorted by precedence; empty when the package is unknown.
    pub fn versions(&self, name: &str) -> Vec<String> {
        self.get(name)
            .map(|record| record.version_list())
            .unwrap_or_default()
    }

    /// Insert or overwrite a version, taking descriptive fields from its manifest.
    pub async fn upsert_version(
        &self,
        guard: &NameGuard,
        record: VersionRecord,
    ) -> StoreResult<Arc<PackageRecord>> {
        let name = guard.name();
        let mut package = self
            .get(name)
            .map(|current| PackageRecord::clone(&current))
            .unwrap_or_else(|| PackageRecord::new(name));

        package.merge_descriptive(&record.data);
        let version = record.version.clone();
        package.versions.insert(version.clone(), record);

        let package = Arc::new(package);
        self.persist(&package).await?;
        self.publish(name, Some(Arc::clone(&package)));

        info!(package = %name, version = %version, "Version indexed");
        Ok(package)
    }

    /// Remove a version. Returns the removed record, or `None` if it was not indexed.
    ///
    /// The package and its metadata document are dropped when its last version goes.
    pub async fn remove_version(
        &self,
        guard: &NameGuard,
        version: &str,
    ) -> StoreResult<Option<VersionRecord>> {
        let name = guard.name();
        let Some(current) = self.get(name) else {
            return Ok(None);
        };
        let mut package = PackageRecord::clone(&current);
        let Some(removed) = package.versions.remove(version) else {
            return Ok(None);
        };

        if package.versions.is_empty() {
            storage::remove_if_exists(self.document_path(name)).await?;
            self.publish(name, None);
            info!(package = %name, version = %version, "Last version removed, package dropped");
        } else {
            let package = Arc::new(package);
            self.persist(&package).await?;
            self.publish(name, Some(package));
            info!(package = %name, version = %version, "Version removed");
        }
        Ok(Some(removed))
    }

    /// Merge descriptive fields from `document` into an existing package.
    pub async fn merge_descriptive(&self, guard: &NameGuard, document: &Value) -> StoreResult<()> {
        let name = guard.name();
        let current = self
            .get(name)
            .ok_or_else(|| StoreError::NotFound(format!("package '{name}' not found")))?;
        if !document.is_object() {
            return Err(StoreError::invalid_package(
                "metadata document is not a JSON object",
            ));
        }

        let mut package = PackageRecord::clone(&current);
        if !package.merge_descriptive(document) {
            debug!(package = %name, "Metadata document carries no descriptive fields");
        }

        let package = Arc::new(package);
        self.persist(&package).await?;
        self.publish(name, Some(package));
        info!(package = %name, "Descriptive metadata merged");
        Ok(())
    }

    /// Swap in a freshly built index wholesale. Writes nothing to disk.
    pub fn replace_all(&self, records: HashMap<String, PackageRecord>) {
        let map: IndexMap = records
            .into_iter()
            .map(|(name, record)| (name, Arc::new(record)))
            .collect();
        self.records.store(Arc::new(map));
    }

    async fn persist(&self, package: &PackageRecord) -> StoreResult<()> {
        let document = serde_json::to_vec_pretty(package)?;
        let path = self.document_path(&package.name);
        storage::save_file_atomic(path, document).await?;
        Ok(())
    }

    fn publish(&self, name: &str, package: Option<Arc<PackageRecord>>) {
        // Other names may publish concurrently; rcu retries against their updates.
        self.records.rcu(|current| {
            let mut next = IndexMap::clone(current);
            match &package {
                Some(package) => {
                    next.insert(name.to_string(), Arc::clone(package));
                }
                None => {
                    next.remove(name);
                }
            }
            next
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn version_record(version: &str, manifest: Value) -> VersionRecord {
        VersionRecord {
            version: version.to_string(),
            data: manifest,
            time: Utc::now(),
            path: PathBuf::from(format!("/data/packages/foo-{version}.tgz")),
            shasum: "0".repeat(40),
        }
    }

    #[tokio::test]
    async fn test_upsert_persists_document() {
        let temp_dir = TempDir::new().unwrap();
        let index = PackageIndex::new(temp_dir.path());

        let guard = index.lock("foo").await;
        index
            .upsert_version(
                &guard,
                version_record(
                    "1.0.0",
                    json!({"name": "foo", "version": "1.0.0", "description": "first"}),
                ),
            )
            .await
            .unwrap();
        drop(guard);

        assert_eq!(index.versions("foo"), vec!["1.0.0"]);
        assert_eq!(index.names(), vec!["foo"]);

        let bytes = std::fs::read(index.document_path("foo")).unwrap();
        let document: PackageRecord = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(document.description, Some(json!("first")));
        assert!(document.versions.contains_key("1.0.0"));
    }

    #[tokio::test]
    async fn test_remove_last_version_drops_package() {
        let temp_dir = TempDir::new().unwrap();
        let index = PackageIndex::new(temp_dir.path());

        let guard = index.lock("foo").await;
        index
            .upsert_version(&guard, version_record("1.0.0", json!({})))
            .await
            .unwrap();
        index
            .upsert_version(&guard, version_record("2.0.0", json!({})))
            .await
            .unwrap();

        let missing = index.remove_version(&guard, "3.0.0").await.unwrap();
        assert!(missing.is_none());
        let removed = index.remove_version(&guard, "1.0.0").await.unwrap();
        assert!(removed.is_some());
        assert_eq!(index.versions("foo"), vec!["2.0.0"]);
        assert!(index.document_path("foo").exists());

        index.remove_version(&guard, "2.0.0").await.unwrap();
        assert!(index.get("foo").is_none());
        assert!(!index.document_path("foo").exists());
    }

    #[tokio::test]
    async fn test_merge_descriptive_requires_package() {
        let temp_dir = TempDir::new().unwrap();
        let index = PackageIndex::new(temp_dir.path());

        let guard = index.lock("ghost").await;
        let err = index
            .merge_descriptive(&guard, &json!({"description": "boo"}))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
        assert!(!index.document_path("ghost").exists());
    }

    #[tokio::test]
    async fn test_merge_descriptive_ignores_nulls() {
        let temp_dir = TempDir::new().unwrap();
        let index = PackageIndex::new(temp_dir.path());

        let guard = index.lock("foo").await;
        index
            .upsert_version(
                &guard,
                version_record("1.0.0", json!({"description": "kept", "author": "ann"})),
            )
            .await
            .unwrap();
        index
            .merge_descriptive(
                &guard,
                &json!({"description": null, "author": {"name": "Bo"}, "repository": "git://x"}),
            )
            .await
            .unwrap();

        let record = index.get("foo").unwrap();
        assert_eq!(record.description, Some(json!("kept")));
        assert_eq!(record.author, Some(json!({"name": "Bo"})));
        assert_eq!(record.repository, Some(json!("git://x")));
    }

    #[tokio::test]
    async fn test_guard_is_exclusive_per_name() {
        let temp_dir = TempDir::new().unwrap();
        let index = Arc::new(PackageIndex::new(temp_dir.path()));

        let held = index.lock("foo").await;

        // A different name is not blocked
        let other = index.lock("bar").await;
        assert_eq!(other.name(), "bar");

        let contender = {
            let index = Arc::clone(&index);
            tokio::spawn(async move { index.lock("foo").await.name().to_string() })
        };
        tokio::task::yield_now().await;
        assert!(!contender.is_finished());

        drop(held);
        assert_eq!(contender.await.unwrap(), "foo");
    }

    #[test]
    fn test_version_record_file_name() {
        let record = version_record("1.2.3", json!({}));
        assert_eq!(record.file_name(), "foo-1.2.3.tgz");
    }
}
