//! # Package Store
//!
//! [`PackageStore`] is the entry point of the crate: it owns the on-disk layout
//! described by [`StoreConfig`] and the in-memory [`PackageIndex`]. The
//! operations that mutate the store live in their own modules:
//!
//! - [`crate::ingest`]: `ingest`
//! - [`crate::deletion`]: `delete_version`
//! - [`crate::retrieval`]: `open_stream`, `open_file`, `resolve_range`
//! - [`crate::reload`]: `reload`
//!
//! Read operations here are lock-free snapshots of the index.
//!
//! ```rust,no_run
//! use reggie_store::{PackageStore, StoreConfig};
//!
//! # async fn run() -> reggie_store::StoreResult<()> {
//! let store = PackageStore::open(StoreConfig::new("/srv/reggie")).await?;
//! for name in store.list_names() {
//!     println!("{name}: {:?}", store.list_versions(&name));
//! }
//! # Ok(())
//! # }
//! ```

use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};
use crate::index::{PackageIndex, PackageRecord};
use crate::storage;
use crate::validation::TARBALL_EXTENSION;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

pub struct PackageStore {
    pub(crate) config: StoreConfig,
    pub(crate) index: PackageIndex,
}

impl PackageStore {
    /// Create an empty store over `config`. Nothing is read from disk.
    pub fn new(config: StoreConfig) -> Self {
        let index = PackageIndex::new(config.metadata_path());
        Self { config, index }
    }

    /// Create the directory layout and rebuild the index from disk.
    pub async fn open(config: StoreConfig) -> StoreResult<Self> {
        config.ensure_layout().await?;
        let store = Self::new(config);
        let summary = store.reload().await?;
        info!(
            packages = summary.packages,
            versions = summary.versions,
            skipped = summary.skipped,
            "Package store opened"
        );
        Ok(store)
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn index(&self) -> &PackageIndex {
        &self.index
    }

    /// Full record for `name`, or `None` if the package is not hosted here.
    pub fn get_record(&self, name: &str) -> Option<Arc<PackageRecord>> {
        self.index.get(name)
    }

    /// Versions of `name` sorted by precedence, lowest first. Empty if unknown.
    pub fn list_versions(&self, name: &str) -> Vec<String> {
        self.index.versions(name)
    }

    /// Names of all hosted packages, sorted.
    pub fn list_names(&self) -> Vec<String> {
        self.index.names()
    }

    /// Every hosted package from one consistent snapshot, sorted by name.
    pub fn list_records(&self) -> Vec<Arc<PackageRecord>> {
        let snapshot = self.index.snapshot();
        let mut records: Vec<Arc<PackageRecord>> = snapshot.values().cloned().collect();
        records.sort_by(|a, b| a.name.cmp(&b.name));
        records
    }

    /// Highest version of `name` by precedence.
    pub fn latest_version(&self, name: &str) -> Option<String> {
        self.index.get(name).and_then(|record| record.latest())
    }

    /// Merge the descriptive fields of `document` over an existing package.
    ///
    /// Fails with `NotFound` if the package has no versions here.
    pub async fn merge_metadata(&self, name: &str, document: &Value) -> StoreResult<()> {
        if !self.index.contains(name) {
            return Err(StoreError::NotFound(format!("package '{name}' not found")));
        }
        let guard = self.index.lock(name).await;
        self.index.merge_descriptive(&guard, document).await
    }

    /// Write an upload to a uniquely named staging file and return its path.
    ///
    /// The hints only make the file name readable; they are not trusted.
    pub async fn stage_upload(
        &self,
        bytes: &[u8],
        name_hint: &str,
        version_hint: Option<&str>,
    ) -> StoreResult<PathBuf> {
        let hint: String = match version_hint {
            Some(version) => format!("{name_hint}-{version}"),
            None => name_hint.trim_end_matches(TARBALL_EXTENSION).to_string(),
        }
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') { c } else { '_' })
        .collect();

        let path = self.config.temp_path().join(format!(
            "{}-{hint}{TARBALL_EXTENSION}",
            storage::random_suffix()
        ));
        tokio::fs::create_dir_all(self.config.temp_path()).await?;
        if let Err(e) = tokio::fs::write(&path, bytes).await {
            storage::discard(&path).await;
            return Err(e.into());
        }
        debug!(path = %path.display(), size = bytes.len(), "Upload staged");
        Ok(path)
    }
}
