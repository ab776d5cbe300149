//! Filesystem helpers shared by ingestion, deletion, and reload.

use chrono::{DateTime, Utc};
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};

/// Write `content` to `path` by writing a sibling temp file and renaming it into place.
///
/// Readers never observe a half-written document.
pub async fn save_file_atomic<P: AsRef<Path>, C: AsRef<[u8]>>(
    path: P,
    content: C,
) -> io::Result<()> {
    let path = path.as_ref();

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp_path = path.with_file_name(format!(".{file_name}.{}.tmp", random_suffix()));

    let content = content.as_ref();
    fs::write(&tmp_path, content).await?;
    if let Err(e) = fs::rename(&tmp_path, path).await {
        let _ = fs::remove_file(&tmp_path).await;
        return Err(e);
    }

    debug!(path = %path.display(), size = content.len(), "File saved");
    Ok(())
}

/// Remove a file, treating "already gone" as success. Returns whether a file was removed.
pub async fn remove_if_exists<P: AsRef<Path>>(path: P) -> io::Result<bool> {
    match fs::remove_file(path.as_ref()).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

/// Best-effort cleanup used on failure paths, where the original error must win.
pub async fn discard<P: AsRef<Path>>(path: P) {
    let path = path.as_ref();
    if let Err(e) = remove_if_exists(path).await {
        warn!(path = %path.display(), error = %e, "Failed to remove leftover file");
    }
}

/// Move a file, copying when a plain rename is not possible (e.g. across filesystems).
pub async fn move_file<P: AsRef<Path>, Q: AsRef<Path>>(from: P, to: Q) -> io::Result<()> {
    let (from, to) = (from.as_ref(), to.as_ref());
    match fs::rename(from, to).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Err(e),
        Err(e) => {
            debug!(from = %from.display(), to = %to.display(), error = %e, "Rename failed, copying");
            if let Err(copy_err) = fs::copy(from, to).await {
                discard(to).await;
                return Err(copy_err);
            }
            fs::remove_file(from).await
        }
    }
}

/// Modification time of a file as a UTC timestamp.
pub async fn modified_time<P: AsRef<Path>>(path: P) -> io::Result<DateTime<Utc>> {
    let modified = fs::metadata(path.as_ref()).await?.modified()?;
    Ok(DateTime::<Utc>::from(modified))
}

/// List the files in `dir` whose names end with `extension`, sorted by file name.
///
/// A missing directory yields an empty list.
pub async fn list_files_sorted<P: AsRef<Path>>(
    dir: P,
    extension: &str,
) -> io::Result<Vec<PathBuf>> {
    let dir = dir.as_ref();
    let mut files = Vec::new();

    let mut entries = match fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!(dir = %dir.display(), "Directory does not exist");
            return Ok(files);
        }
        Err(e) => return Err(e),
    };

    while let Some(entry) = entries.next_entry().await? {
        if !entry.file_type().await?.is_file() {
            continue;
        }
        let path = entry.path();
        let matches = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|name| name.ends_with(extension) && !name.starts_with('.'));
        if matches {
            files.push(path);
        }
    }

    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}

/// Random base-36 token used to keep staged and temporary file names unique.
pub fn random_suffix() -> String {
    const DIGITS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    let mut n: u64 = rand::random();
    let mut out = Vec::new();
    loop {
        out.push(DIGITS[(n % 36) as usize]);
        n /= 36;
        if n == 0 {
            break;
        }
    }
    out.reverse();
    String::from_utf8_lossy(&out).into_owned()
}
