//! # Reggie Package Store
//!
//! Storage and version-resolution engine of the Reggie package registry.
//! Uploaded tarballs are decoded, indexed by name and version, and served back
//! by exact version or by range expression.
//!
//! ## Key Modules
//!
//! - [`archive`]: gzip tarball decoding and manifest extraction
//! - [`version`]: range grammar and semantic-version precedence
//! - [`index`]: the in-memory package index and per-name guards
//! - [`store`]: [`PackageStore`], the entry point for every operation
//! - [`ingest`], [`deletion`], [`retrieval`], [`reload`]: store operations
//! - [`config`]: on-disk layout
//! - [`error`]: error taxonomy
//!
//! ## Layout
//!
//! Final tarballs live at `<data>/packages/<name>-<version>.tgz`, staged uploads
//! under `<data>/temp/`, and one metadata document per package at
//! `<data>/metadata/<name>.json`. The tarballs are the source of truth: the
//! index is rebuilt from them by [`PackageStore::reload`] at startup.

pub mod archive;
pub mod config;
pub mod deletion;
pub mod error;
pub mod hash_utils;
pub mod index;
pub mod ingest;
pub mod reload;
pub mod retrieval;
pub mod storage;
pub mod store;
pub mod validation;
pub mod version;

pub use config::StoreConfig;
pub use error::{ErrorKind, StoreError, StoreResult};
pub use index::{PackageIndex, PackageRecord, VersionRecord};
pub use reload::ReloadSummary;
pub use retrieval::PackageStream;
pub use store::PackageStore;
pub use version::Range;
