//! Integrity digests for stored tarballs

use sha1::{Digest, Sha1};
use std::path::Path;

/// Calculate the SHA1 hash of data as lowercase hex (npm's `dist.shasum`).
///
/// ```
/// # use reggie_store::hash_utils::sha1_hash;
/// assert_eq!(sha1_hash(b"hello world"), "2aae6c35c94fcfb415dbe95f408b9ce91ee846ed");
/// ```
pub fn sha1_hash(data: &[u8]) -> String {
    let mut hasher = Sha1::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

/// SHA1 of a file's contents.
pub async fn sha1_file<P: AsRef<Path>>(path: P) -> std::io::Result<String> {
    let data = tokio::fs::read(path.as_ref()).await?;
    Ok(sha1_hash(&data))
}
