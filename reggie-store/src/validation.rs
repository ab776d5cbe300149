//! # Input Validation
//!
//! Package names and tarball file names end up as path components under the
//! data directory, so they are checked before anything touches the filesystem.

use semver::Version;

/// Maximum allowed package name length
pub const MAX_PACKAGE_NAME_LENGTH: usize = 214;

/// Maximum allowed version string length
pub const MAX_VERSION_LENGTH: usize = 64;

/// Maximum allowed filename length
pub const MAX_FILENAME_LENGTH: usize = 255;

/// Extension every stored tarball carries
pub const TARBALL_EXTENSION: &str = ".tgz";

/// Error types for validation failures
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("Input too long: {actual} exceeds maximum {max}")]
    TooLong { actual: usize, max: usize },

    #[error("Input too short: {actual} is below minimum {min}")]
    TooShort { actual: usize, min: usize },

    #[error("Invalid characters in input: {input}")]
    InvalidCharacters { input: String },

    #[error("Path traversal detected: {path}")]
    PathTraversal { path: String },

    #[error("Invalid format: {reason}")]
    InvalidFormat { reason: String },

    #[error("Contains null bytes")]
    NullBytes,

    #[error("Contains control characters")]
    ControlCharacters,
}

pub type ValidationResult<T> = Result<T, ValidationError>;

fn check_common(input: &str, max: usize) -> ValidationResult<()> {
    if input.is_empty() {
        return Err(ValidationError::TooShort { actual: 0, min: 1 });
    }

    if input.len() > max {
        return Err(ValidationError::TooLong {
            actual: input.len(),
            max,
        });
    }

    if input.contains('\0') {
        return Err(ValidationError::NullBytes);
    }

    if input.chars().any(|c| c.is_control()) {
        return Err(ValidationError::ControlCharacters);
    }

    Ok(())
}

/// Validate a package name.
///
/// Names are case-sensitive. They may contain ASCII letters, digits, `.`, `-`
/// and `_`, and may not start with `.` or `_`. Scoped names (`@scope/name`) are
/// rejected because the name is used verbatim as a file name.
pub fn validate_package_name(name: &str) -> ValidationResult<()> {
    check_common(name, MAX_PACKAGE_NAME_LENGTH)?;

    if name.contains("..") || name.contains('/') || name.contains('\\') {
        return Err(ValidationError::PathTraversal {
            path: name.to_string(),
        });
    }

    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'))
    {
        return Err(ValidationError::InvalidCharacters {
            input: name.to_string(),
        });
    }

    if name.starts_with('.') || name.starts_with('_') {
        return Err(ValidationError::InvalidFormat {
            reason: "package names cannot start with . or _".to_string(),
        });
    }

    Ok(())
}

/// Validate and parse a semantic version string.
pub fn validate_version(version: &str) -> ValidationResult<Version> {
    check_common(version, MAX_VERSION_LENGTH)?;

    Version::parse(version).map_err(|e| ValidationError::InvalidFormat {
        reason: format!("'{version}' is not a semantic version: {e}"),
    })
}

/// Validate a tarball file name used for direct access under the packages directory.
pub fn validate_tarball_filename(filename: &str) -> ValidationResult<()> {
    check_common(filename, MAX_FILENAME_LENGTH)?;

    if filename.contains("..")
        || filename.contains('/')
        || filename.contains('\\')
        || filename.starts_with('.')
    {
        return Err(ValidationError::PathTraversal {
            path: filename.to_string(),
        });
    }

    if !filename.ends_with(TARBALL_EXTENSION) {
        return Err(ValidationError::InvalidFormat {
            reason: format!("expected a {TARBALL_EXTENSION} file name"),
        });
    }

    Ok(())
}

/// Deterministic tarball file name for a package version.
pub fn tarball_filename(name: &str, version: &str) -> String {
    format!("{name}-{version}{TARBALL_EXTENSION}")
}
