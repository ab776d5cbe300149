//! Deletion of a single package version.

use crate::error::{StoreError, StoreResult};
use crate::storage;
use crate::store::PackageStore;
use std::io;
use tracing::{info, warn};

impl PackageStore {
    /// Delete `name@version`: its tarball, its index entry, and (for the last
    /// version) the package's metadata document.
    ///
    /// An absent version fails with [`StoreError::NotFound`] and changes nothing.
    pub async fn delete_version(&self, name: &str, version: &str) -> StoreResult<()> {
        let not_found = || StoreError::NotFound(format!("{name}@{version} not found"));
        if !self.index.contains(name) {
            return Err(not_found());
        }

        let guard = self.index.lock(name).await;
        let record = self
            .index
            .get(name)
            .and_then(|package| package.versions.get(version).cloned())
            .ok_or_else(not_found)?;

        // Park the tarball so it can be put back if the index update fails.
        let backup = self.config.temp_path().join(format!(
            "{}-deleted-{}",
            storage::random_suffix(),
            record.file_name()
        ));
        let parked = match tokio::fs::rename(&record.path, &backup).await {
            Ok(()) => Some(backup),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                warn!(package = %name, version = %version, path = %record.path.display(), "Tarball already missing");
                None
            }
            Err(e) => return Err(e.into()),
        };

        match self.index.remove_version(&guard, version).await {
            Ok(_) => {
                if let Some(parked) = parked {
                    storage::discard(parked).await;
                }
                info!(package = %name, version = %version, "Package version deleted");
                Ok(())
            }
            Err(e) => {
                self.restore(parked.as_deref(), &record.path).await;
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::config::StoreConfig;
    use crate::error::{ErrorKind, StoreError};
    use crate::store::PackageStore;
    use crate::test_utils::build_tarball;
    use serde_json::json;
    use tempfile::TempDir;

    async fn store_with(temp_dir: &TempDir, versions: &[&str]) -> PackageStore {
        let config = StoreConfig::new(temp_dir.path());
        config.ensure_layout().await.unwrap();
        let store = PackageStore::new(config);
        for version in versions {
            let tarball = build_tarball(&json!({"name": "foo", "version": version}));
            let staged = store
                .stage_upload(&tarball, "foo", Some(*version))
                .await
                .unwrap();
            store.ingest(&staged, None, None).await.unwrap();
        }
        store
    }

    fn temp_is_empty(store: &PackageStore) -> bool {
        std::fs::read_dir(store.config().temp_path())
            .unwrap()
            .next()
            .is_none()
    }

    #[tokio::test]
    async fn test_delete_version() {
        let temp_dir = TempDir::new().unwrap();
        let store = store_with(&temp_dir, &["1.0.0", "2.0.0"]).await;
        let path = store.config().packages_path().join("foo-1.0.0.tgz");
        assert!(path.exists());

        store.delete_version("foo", "1.0.0").await.unwrap();

        assert!(!path.exists());
        assert_eq!(store.list_versions("foo"), vec!["2.0.0"]);
        assert!(store.index().document_path("foo").exists());
        assert!(temp_is_empty(&store));
    }

    #[tokio::test]
    async fn test_delete_last_version_removes_package() {
        let temp_dir = TempDir::new().unwrap();
        let store = store_with(&temp_dir, &["1.0.0"]).await;

        store.delete_version("foo", "1.0.0").await.unwrap();

        assert!(store.get_record("foo").is_none());
        assert!(!store.index().document_path("foo").exists());
    }

    #[tokio::test]
    async fn test_delete_absent_has_no_side_effects() {
        let temp_dir = TempDir::new().unwrap();
        let store = store_with(&temp_dir, &["1.0.0"]).await;
        let document = std::fs::read(store.index().document_path("foo")).unwrap();

        let err = store.delete_version("foo", "9.9.9").await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
        let err = store.delete_version("bar", "1.0.0").await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));

        assert_eq!(store.list_versions("foo"), vec!["1.0.0"]);
        let path = store.config().packages_path().join("foo-1.0.0.tgz");
        assert!(path.exists());
        let unchanged = std::fs::read(store.index().document_path("foo")).unwrap();
        assert_eq!(unchanged, document);
    }

    #[tokio::test]
    async fn test_delete_io_failure_restores_tarball() {
        let temp_dir = TempDir::new().unwrap();
        let store = store_with(&temp_dir, &["1.0.0", "2.0.0"]).await;
        let path = store.config().packages_path().join("foo-1.0.0.tgz");
        let tarball = std::fs::read(&path).unwrap();

        // A non-empty directory where the metadata document belongs blocks persisting it.
        let document = store.index().document_path("foo");
        std::fs::remove_file(&document).unwrap();
        std::fs::create_dir_all(document.join("blocker")).unwrap();

        let err = store.delete_version("foo", "1.0.0").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::IoFailure);

        assert_eq!(std::fs::read(&path).unwrap(), tarball);
        assert_eq!(store.list_versions("foo"), vec!["1.0.0", "2.0.0"]);
        assert!(temp_is_empty(&store));
    }
}
