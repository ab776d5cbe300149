//! # Store Configuration
//!
//! Describes where the store keeps its files. All directories live under one
//! data directory:
//!
//! ```text
//! <data_dir>/
//!   packages/<name>-<version>.tgz    final tarballs
//!   temp/<random>-<hint>.tgz         staged uploads and extraction scratch
//!   metadata/<name>.json             one descriptive document per package
//! ```
//!
//! ```rust,no_run
//! use reggie_store::StoreConfig;
//!
//! let config = StoreConfig::load_or_default("reggie.json")?
//!     .with_data_dir("/srv/reggie");
//! # Ok::<(), reggie_store::StoreError>(())
//! ```

use crate::error::StoreResult;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Base directory for all store files
    pub data_dir: PathBuf,
    /// Subdirectory holding final tarballs
    pub packages_dir: PathBuf,
    /// Subdirectory holding staged uploads and extraction scratch space
    pub temp_dir: PathBuf,
    /// Subdirectory holding per-package metadata documents
    pub metadata_dir: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            packages_dir: PathBuf::from("packages"),
            temp_dir: PathBuf::from("temp"),
            metadata_dir: PathBuf::from("metadata"),
        }
    }
}

impl StoreConfig {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self::default().with_data_dir(data_dir)
    }

    /// Load configuration from a JSON file.
    pub fn load<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        let config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Load configuration from a JSON file, falling back to defaults when it is absent.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            debug!(path = %path.display(), "Store config not found, using defaults");
            Ok(Self::default())
        }
    }

    pub fn with_data_dir(mut self, data_dir: impl Into<PathBuf>) -> Self {
        self.data_dir = data_dir.into();
        self
    }

    pub fn with_metadata_dir(mut self, metadata_dir: impl Into<PathBuf>) -> Self {
        self.metadata_dir = metadata_dir.into();
        self
    }

    pub fn packages_path(&self) -> PathBuf {
        self.data_dir.join(&self.packages_dir)
    }

    pub fn temp_path(&self) -> PathBuf {
        self.data_dir.join(&self.temp_dir)
    }

    pub fn metadata_path(&self) -> PathBuf {
        self.data_dir.join(&self.metadata_dir)
    }

    /// Create the packages, temp, and metadata directories if missing.
    pub async fn ensure_layout(&self) -> StoreResult<()> {
        for dir in [
            self.packages_path(),
            self.temp_path(),
            self.metadata_path(),
        ] {
            tokio::fs::create_dir_all(&dir).await?;
            debug!(dir = %dir.display(), "Ensured store directory");
        }
        Ok(())
    }
}
