//! # Archive Decoder
//!
//! Unpacks a staged gzip tarball into a scratch directory and reads the
//! `package.json` manifest from it. The manifest may sit at the archive root or
//! inside a single top-level directory (`package/package.json` for tarballs made
//! by `npm pack`).
//!
//! Every failure to read the archive or its manifest is reported as
//! [`StoreError::InvalidPackage`]. The scratch directory is a [`tempfile::TempDir`]
//! and is removed when decoding finishes, whatever the outcome.

use crate::error::{StoreError, StoreResult};
use flate2::read::GzDecoder;
use serde_json::Value;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::debug;

/// File name of the manifest embedded in every archive
pub const MANIFEST_FILE: &str = "package.json";

/// Parsed manifest of a package archive.
#[derive(Debug, Clone, PartialEq)]
pub struct Manifest {
    pub name: String,
    pub version: String,
    /// The full manifest, unknown fields included
    pub document: Value,
}

impl Manifest {
    /// Build a manifest from a parsed JSON document, requiring string `name` and `version`.
    pub fn from_document(document: Value) -> StoreResult<Self> {
        let object = document
            .as_object()
            .ok_or_else(|| StoreError::invalid_package("manifest is not a JSON object"))?;

        let field = |key: &str| -> StoreResult<String> {
            object
                .get(key)
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .ok_or_else(|| {
                    StoreError::invalid_package(format!("manifest is missing the '{key}' field"))
                })
        };

        let name = field("name")?;
        let version = field("version")?;
        Ok(Self {
            name,
            version,
            document,
        })
    }
}

/// Decode a staged archive, returning its manifest.
///
/// `scratch_root` is the directory in which the temporary extraction area is
/// created; it must exist.
pub async fn decode(archive: &Path, scratch_root: &Path) -> StoreResult<Manifest> {
    let archive = archive.to_path_buf();
    let scratch_root = scratch_root.to_path_buf();
    tokio::task::spawn_blocking(move || decode_blocking(&archive, &scratch_root)).await?
}

fn decode_blocking(archive: &Path, scratch_root: &Path) -> StoreResult<Manifest> {
    let file = File::open(archive)?;

    let scratch = tempfile::Builder::new()
        .prefix("extract-")
        .tempdir_in(scratch_root)?;

    let mut tar = tar::Archive::new(GzDecoder::new(file));
    tar.unpack(scratch.path()).map_err(|e| {
        StoreError::invalid_package(format!(
            "{} is not a valid gzip tar archive: {e}",
            archive.display()
        ))
    })?;

    let manifest_path = locate_manifest(scratch.path())?
        .ok_or_else(|| StoreError::invalid_package(format!("archive has no {MANIFEST_FILE}")))?;
    debug!(archive = %archive.display(), manifest = %manifest_path.display(), "Located manifest");

    let content = std::fs::read(&manifest_path)?;
    let document: Value = serde_json::from_slice(&content).map_err(|e| {
        StoreError::invalid_package(format!("{MANIFEST_FILE} is not valid JSON: {e}"))
    })?;

    Manifest::from_document(document)
}

/// Look for the manifest at the root, then one level down in sorted directory order.
///
/// Only regular files inside real directories qualify. Symlinks unpacked from
/// the archive are never followed.
fn locate_manifest(root: &Path) -> StoreResult<Option<PathBuf>> {
    let direct = root.join(MANIFEST_FILE);
    if is_regular_file(&direct) {
        return Ok(Some(direct));
    }

    let mut dirs: Vec<PathBuf> = std::fs::read_dir(root)?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_ok_and(|kind| kind.is_dir()))
        .map(|entry| entry.path())
        .collect();
    dirs.sort();

    Ok(dirs
        .into_iter()
        .map(|dir| dir.join(MANIFEST_FILE))
        .find(|candidate| is_regular_file(candidate)))
}

fn is_regular_file(path: &Path) -> bool {
    std::fs::symlink_metadata(path)
        .is_ok_and(|meta| meta.file_type().is_file())
}
