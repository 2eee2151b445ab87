// backup-dav/src/webdav/mod.rs
pub(crate) mod client;
pub(crate) mod multistatus;

pub use client::WebDavClient;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::Stream;
use reqwest::StatusCode;
use std::io;

use crate::errors::RemoteError;

/// One entry of a remote directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEntry {
    /// Decoded path as reported by the server.
    pub path: String,
    pub name: String,
    pub is_dir: bool,
    pub last_modified: Option<DateTime<Utc>>,
    pub size: Option<u64>,
}

impl RemoteEntry {
    pub fn is_file(&self) -> bool {
        !self.is_dir
    }
}

/// The operations the backup run needs from a WebDAV-like store.
///
/// `put_stream` reports the raw acknowledgment status; deciding what counts
/// as a successful upload is the caller's job.
pub trait RemoteStore {
    async fn list(&self, path: &str) -> Result<Vec<RemoteEntry>, RemoteError>;

    async fn create_dir(&self, path: &str) -> Result<(), RemoteError>;

    async fn delete(&self, path: &str) -> Result<(), RemoteError>;

    async fn put_stream<S>(&self, path: &str, body: S) -> Result<StatusCode, RemoteError>
    where
        S: Stream<Item = io::Result<Bytes>> + Send + Sync + 'static;
}

/// Joins a normalised directory (`/a/b` or `/`) with a basename.
pub fn join_path(dir: &str, name: &str) -> String {
    format!("{}/{}", dir.trim_end_matches('/'), name.trim_start_matches('/'))
}

/// Every prefix of `path`, from the root down to `path` itself.
///
/// `/backup/nightly` -> `["/", "/backup", "/backup/nightly"]`
pub fn path_prefixes(path: &str) -> Vec<String> {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    (0..=segments.len())
        .map(|depth| format!("/{}", segments[..depth].join("/")))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_path() {
        assert_eq!(join_path("/backup", "a.tgz"), "/backup/a.tgz");
        assert_eq!(join_path("/", "a.tgz"), "/a.tgz");
    }

    #[test]
    fn test_path_prefixes() {
        assert_eq!(path_prefixes("/backup/nightly"), vec!["/", "/backup", "/backup/nightly"]);
        assert_eq!(path_prefixes("/"), vec!["/"]);
    }
}
