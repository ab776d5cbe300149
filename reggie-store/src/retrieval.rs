//! # Retrieval Service
//!
//! Opens stored tarballs for streaming. A [`PackageStream`] owns its file handle;
//! the caller reads it to the end (or drops it on error) and the handle is
//! closed with it.
//!
//! Transports usually commit to a success status before the body is fully
//! sent, so a read error partway through can only abort the transfer.

use crate::error::StoreResult;
use crate::store::PackageStore;
use crate::validation::validate_tarball_filename;
use crate::version::{max_satisfying, Range};
use std::io;
use std::path::Path;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::fs::File;
use tokio::io::{AsyncRead, ReadBuf};
use tracing::debug;

/// Sequential byte source over one stored tarball.
#[derive(Debug)]
pub struct PackageStream {
    file: File,
    len: u64,
    file_name: String,
}

impl PackageStream {
    async fn open(path: &Path) -> io::Result<Option<Self>> {
        let file = match File::open(path).await {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e),
        };
        let len = file.metadata().await?.len();
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Some(Self {
            file,
            len,
            file_name,
        }))
    }

    /// Size of the tarball in bytes.
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// `<name>-<version>.tgz`
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn into_file(self) -> File {
        self.file
    }
}

impl AsyncRead for PackageStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().file).poll_read(cx, buf)
    }
}

impl PackageStore {
    /// Open the tarball of an exact, already resolved version.
    ///
    /// `None` when the version is not indexed or its file is gone.
    pub async fn open_stream(
        &self,
        name: &str,
        version: &str,
    ) -> StoreResult<Option<PackageStream>> {
        let Some(path) = self
            .index
            .get(name)
            .and_then(|package| package.versions.get(version).map(|record| record.path.clone()))
        else {
            debug!(package = %name, version = %version, "Version not indexed");
            return Ok(None);
        };
        Ok(PackageStream::open(&path).await?)
    }

    /// Open `<packages>/<filename>` directly.
    ///
    /// File names that could leave the packages directory resolve to `None`.
    pub async fn open_file(&self, filename: &str) -> StoreResult<Option<PackageStream>> {
        if let Err(e) = validate_tarball_filename(filename) {
            debug!(filename = %filename, error = %e, "Rejected tarball file name");
            return Ok(None);
        }
        let path = self.config.packages_path().join(filename);
        Ok(PackageStream::open(&path).await?)
    }

    /// Resolve a range expression to the highest matching indexed version.
    ///
    /// An unparsable range fails with `BadRange`; no match is `None`.
    pub fn resolve_range(&self, name: &str, range: &str) -> StoreResult<Option<String>> {
        let range: Range = range.parse()?;
        let resolved = self
            .index
            .get(name)
            .and_then(|package| max_satisfying(package.versions.keys(), &range));
        debug!(package = %name, range = %range, resolved = ?resolved, "Range resolved");
        Ok(resolved)
    }
}
