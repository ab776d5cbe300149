//! # Reload
//!
//! Rebuilds the index from what is on disk. Tarballs in the packages directory
//! are the ground truth for which versions exist; metadata documents only
//! contribute descriptive fields, merged over packages that still have at
//! least one tarball.
//!
//! Tarballs are decoded in file name order and each one is applied exactly as a
//! fresh ingestion would apply it. Nothing is written or deleted, so running
//! reload twice in a row yields the same index.

use crate::archive;
use crate::error::StoreResult;
use crate::hash_utils::sha1_file;
use crate::index::{PackageRecord, VersionRecord};
use crate::storage;
use crate::store::PackageStore;
use crate::validation::{
    tarball_filename, validate_package_name, validate_version, TARBALL_EXTENSION,
};
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info, warn};

/// Counts reported by [`PackageStore::reload`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReloadSummary {
    pub packages: usize,
    pub versions: usize,
    /// Tarballs that could not be decoded or are misnamed
    pub skipped: usize,
    /// Metadata documents merged over a package
    pub overlays: usize,
}

impl PackageStore {
    /// Replace the index with one rebuilt from the packages and metadata directories.
    pub async fn reload(&self) -> StoreResult<ReloadSummary> {
        let mut summary = ReloadSummary::default();
        let mut records: HashMap<String, PackageRecord> = HashMap::new();

        let packages = self.config.packages_path();
        for path in storage::list_files_sorted(&packages, TARBALL_EXTENSION).await? {
            match self.load_tarball(&path).await {
                Some((name, record)) => {
                    let package = records
                        .entry(name.clone())
                        .or_insert_with(|| PackageRecord::new(name));
                    package.merge_descriptive(&record.data);
                    package.versions.insert(record.version.clone(), record);
                    summary.versions += 1;
                }
                None => summary.skipped += 1,
            }
        }

        let metadata = self.config.metadata_path();
        for path in storage::list_files_sorted(&metadata, ".json").await? {
            let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let Some(package) = records.get_mut(name) else {
                debug!(package = %name, "Metadata document without tarballs ignored");
                continue;
            };
            match read_document(&path).await {
                Ok(document) => {
                    package.merge_descriptive(&document);
                    summary.overlays += 1;
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Unreadable metadata document skipped");
                }
            }
        }

        summary.packages = records.len();
        self.index.replace_all(records);
        info!(
            packages = summary.packages,
            versions = summary.versions,
            skipped = summary.skipped,
            overlays = summary.overlays,
            "Index reloaded"
        );
        Ok(summary)
    }

    /// Decode one stored tarball into a version record, or `None` if it must be skipped.
    async fn load_tarball(&self, path: &Path) -> Option<(String, VersionRecord)> {
        let file_name = path.file_name()?.to_string_lossy().into_owned();

        let manifest = match archive::decode(path, &self.config.temp_path()).await {
            Ok(manifest) => manifest,
            Err(e) => {
                warn!(file = %file_name, error = %e, "Skipping unreadable tarball");
                return None;
            }
        };

        if let Err(e) = validate_package_name(&manifest.name)
            .and_then(|()| validate_version(&manifest.version).map(|_| ()))
        {
            warn!(file = %file_name, error = %e, "Skipping tarball with invalid manifest");
            return None;
        }

        let expected = tarball_filename(&manifest.name, &manifest.version);
        if expected != file_name {
            warn!(file = %file_name, expected = %expected, "Skipping misnamed tarball");
            return None;
        }

        let details = async {
            let shasum = sha1_file(path).await?;
            let time = storage::modified_time(path).await?;
            Ok::<_, std::io::Error>((shasum, time))
        }
        .await;
        let (shasum, time) = match details {
            Ok(details) => details,
            Err(e) => {
                warn!(file = %file_name, error = %e, "Skipping tarball that cannot be read");
                return None;
            }
        };

        debug!(package = %manifest.name, version = %manifest.version, "Tarball loaded");
        Some((
            manifest.name,
            VersionRecord {
                version: manifest.version,
                data: manifest.document,
                time,
                path: path.to_path_buf(),
                shasum,
            },
        ))
    }
}

async fn read_document(path: &Path) -> StoreResult<Value> {
    let content = tokio::fs::read(path).await?;
    Ok(serde_json::from_slice(&content)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreConfig;
    use crate::test_utils::build_tarball;
    use serde_json::json;
    use tempfile::TempDir;

    async fn layout(temp_dir: &TempDir) -> StoreConfig {
        let config = StoreConfig::new(temp_dir.path());
        config.ensure_layout().await.unwrap();
        config
    }

    #[tokio::test]
    async fn test_reload_skips_misnamed_and_invalid_tarballs() {
        let temp_dir = TempDir::new().unwrap();
        let config = layout(&temp_dir).await;
        let packages = config.packages_path();

        std::fs::write(
            packages.join("foo-1.0.0.tgz"),
            build_tarball(&json!({"name": "foo", "version": "1.0.0"})),
        )
        .unwrap();
        std::fs::write(
            packages.join("renamed.tgz"),
            build_tarball(&json!({"name": "foo", "version": "2.0.0"})),
        )
        .unwrap();
        std::fs::write(packages.join("broken-1.0.0.tgz"), b"not a tarball")
            .unwrap();

        let store = PackageStore::new(config);
        let summary = store.reload().await.unwrap();

        assert_eq!(
            summary,
            ReloadSummary {
                packages: 1,
                versions: 1,
                skipped: 2,
                overlays: 0
            }
        );
        assert_eq!(store.list_versions("foo"), vec!["1.0.0"]);
        assert!(packages.join("broken-1.0.0.tgz").exists());
    }

    #[tokio::test]
    async fn test_reload_overlays_descriptive_fields_only() {
        let temp_dir = TempDir::new().unwrap();
        let config = layout(&temp_dir).await;

        let manifest = json!({"name": "foo", "version": "1.0.0", "description": "from tarball"});
        std::fs::write(
            config.packages_path().join("foo-1.0.0.tgz"),
            build_tarball(&manifest),
        )
        .unwrap();
        std::fs::write(
            config.metadata_path().join("foo.json"),
            serde_json::to_vec(&json!({
                "name": "foo",
                "description": "from document",
                "versions": {"9.9.9": {}}
            }))
            .unwrap(),
        )
        .unwrap();
        std::fs::write(
            config.metadata_path().join("orphan.json"),
            br#"{"description": "no tarballs"}"#,
        )
        .unwrap();

        let store = PackageStore::new(config);
        let summary = store.reload().await.unwrap();

        assert_eq!(summary.overlays, 1);
        let record = store.get_record("foo").unwrap();
        assert_eq!(record.description, Some(json!("from document")));
        assert_eq!(store.list_versions("foo"), vec!["1.0.0"]);
        assert!(store.get_record("orphan").is_none());
    }

    #[tokio::test]
    async fn test_reload_of_empty_store() {
        let temp_dir = TempDir::new().unwrap();
        let store = PackageStore::new(StoreConfig::new(temp_dir.path()));
        let summary = store.reload().await.unwrap();
        assert_eq!(summary, ReloadSummary::default());
    }
}
