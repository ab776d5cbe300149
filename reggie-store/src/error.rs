//! # Store Error Types
//!
//! Every fallible operation in the store returns a [`StoreResult`]. The error
//! taxonomy is deliberately small:
//!
//! - **NotFound**: a package, version, or file is absent. Operations that have a
//!   value to return report absence as `Ok(None)` instead; this variant is used by
//!   operations that return nothing (deletion, metadata merge).
//! - **InvalidPackage**: the archive cannot be decompressed or unpacked, its
//!   manifest is missing or malformed, or a caller-asserted name/version does not
//!   match the manifest.
//! - **BadRange**: a range expression is unparsable or combines the same operator
//!   twice.
//! - **Io**: a disk read or write failed while staging, moving, or persisting.
//!
//! [`ErrorKind`] gives the machine-readable classification that outer layers map
//! onto their own status codes.

use crate::validation::ValidationError;

/// Machine-readable error classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    InvalidPackage,
    BadRange,
    IoFailure,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::NotFound => "not_found",
            ErrorKind::InvalidPackage => "invalid_package",
            ErrorKind::BadRange => "bad_range",
            ErrorKind::IoFailure => "io_failure",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{0}")]
    NotFound(String),

    #[error("Invalid package: {0}")]
    InvalidPackage(String),

    #[error("Unsupported range: {0}")]
    BadRange(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization/deserialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl StoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StoreError::NotFound(_) => ErrorKind::NotFound,
            StoreError::InvalidPackage(_) => ErrorKind::InvalidPackage,
            StoreError::BadRange(_) => ErrorKind::BadRange,
            StoreError::Io(_) | StoreError::Json(_) => ErrorKind::IoFailure,
        }
    }

    pub fn invalid_package(reason: impl Into<String>) -> Self {
        StoreError::InvalidPackage(reason.into())
    }

    pub fn bad_range(reason: impl Into<String>) -> Self {
        StoreError::BadRange(reason.into())
    }
}

impl From<ValidationError> for StoreError {
    fn from(err: ValidationError) -> Self {
        StoreError::InvalidPackage(err.to_string())
    }
}

impl From<tokio::task::JoinError> for StoreError {
    fn from(err: tokio::task::JoinError) -> Self {
        StoreError::Io(std::io::Error::other(err))
    }
}

/// Convenient result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
