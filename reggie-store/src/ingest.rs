//! # Ingestion Pipeline
//!
//! Turns a staged upload into a stored version:
//!
//! 1. decode the archive and read its manifest
//! 2. check any caller-asserted name/version against the manifest
//! 3. take the per-name guard for the manifest's name
//! 4. move the staged tarball to `<packages>/<name>-<version>.tgz`
//! 5. index the new [`VersionRecord`] and persist the metadata document
//!
//! The archive is decoded before the guard is taken because the guard is keyed
//! by the name the manifest declares. Decoding only reads the staged file, which
//! is unique to this upload.
//!
//! A failure at any step leaves the index and the packages directory as they
//! were: an overwritten tarball is parked in the temp directory until the index
//! update succeeds and put back if it does not. The staged file is removed
//! whatever the outcome.

use crate::archive::{self, Manifest};
use crate::error::{StoreError, StoreResult};
use crate::hash_utils::sha1_file;
use crate::index::{NameGuard, VersionRecord};
use crate::storage;
use crate::store::PackageStore;
use crate::validation::{tarball_filename, validate_package_name, validate_version};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

impl PackageStore {
    /// Ingest a staged archive, optionally asserting its name and version.
    ///
    /// A mismatch between an asserted value and the manifest is rejected as
    /// [`StoreError::InvalidPackage`]. The staged file is always removed.
    pub async fn ingest(
        &self,
        staged: &Path,
        name: Option<&str>,
        version: Option<&str>,
    ) -> StoreResult<VersionRecord> {
        let result = self.ingest_staged(staged, name, version).await;
        storage::discard(staged).await;

        if let Err(e) = &result {
            warn!(
                staged = %staged.display(),
                kind = e.kind().as_str(),
                error = %e,
                "Ingestion failed"
            );
        }
        result
    }

    async fn ingest_staged(
        &self,
        staged: &Path,
        name: Option<&str>,
        version: Option<&str>,
    ) -> StoreResult<VersionRecord> {
        let manifest = archive::decode(staged, &self.config.temp_path()).await?;
        check_assertion(&manifest, name, version)?;
        validate_package_name(&manifest.name)?;
        validate_version(&manifest.version)?;

        let guard = self.index.lock(&manifest.name).await;
        self.commit(&guard, staged, manifest).await
    }

    async fn commit(
        &self,
        guard: &NameGuard,
        staged: &Path,
        manifest: Manifest,
    ) -> StoreResult<VersionRecord> {
        let Manifest {
            name,
            version,
            document,
        } = manifest;
        let file_name = tarball_filename(&name, &version);
        let final_path = self.config.packages_path().join(&file_name);
        let shasum = sha1_file(staged).await?;

        let backup = self.park_existing(&final_path, &file_name).await?;
        if let Err(e) = storage::move_file(staged, &final_path).await {
            self.restore(backup.as_deref(), &final_path).await;
            return Err(e.into());
        }
        debug!(package = %name, version = %version, path = %final_path.display(), "Tarball stored");

        let indexed = async {
            let record = VersionRecord {
                version,
                data: document,
                time: storage::modified_time(&final_path).await?,
                path: final_path.clone(),
                shasum,
            };
            self.index.upsert_version(guard, record.clone()).await?;
            Ok::<_, StoreError>(record)
        }
        .await;

        match indexed {
            Ok(record) => {
                if let Some(backup) = backup {
                    storage::discard(backup).await;
                }
                info!(
                    package = %name,
                    version = %record.version,
                    shasum = %record.shasum,
                    "Package ingested"
                );
                Ok(record)
            }
            Err(e) => {
                storage::discard(&final_path).await;
                self.restore(backup.as_deref(), &final_path).await;
                Err(e)
            }
        }
    }

    /// Move an existing tarball aside so it can be put back on failure.
    async fn park_existing(
        &self,
        final_path: &Path,
        file_name: &str,
    ) -> StoreResult<Option<PathBuf>> {
        if !tokio::fs::try_exists(final_path).await? {
            return Ok(None);
        }
        let backup = self
            .config
            .temp_path()
            .join(format!("{}-replaced-{file_name}", storage::random_suffix()));
        tokio::fs::rename(final_path, &backup).await?;
        debug!(path = %final_path.display(), backup = %backup.display(), "Existing tarball parked");
        Ok(Some(backup))
    }

    pub(crate) async fn restore(&self, backup: Option<&Path>, target: &Path) {
        let Some(backup) = backup else {
            return;
        };
        if let Err(e) = tokio::fs::rename(backup, target).await {
            warn!(
                backup = %backup.display(),
                target = %target.display(),
                error = %e,
                "Failed to restore tarball"
            );
        }
    }
}

fn check_assertion(
    manifest: &Manifest,
    name: Option<&str>,
    version: Option<&str>,
) -> StoreResult<()> {
    if let Some(name) = name {
        if name != manifest.name {
            return Err(StoreError::invalid_package(format!(
                "asserted name '{name}' does not match manifest name '{}'",
                manifest.name
            )));
        }
    }
    if let Some(version) = version {
        if version != manifest.version {
            return Err(StoreError::invalid_package(format!(
                "asserted version '{version}' does not match manifest version '{}'",
                manifest.version
            )));
        }
    }
    Ok(())
}
