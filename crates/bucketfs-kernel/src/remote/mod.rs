//! Remote store seam.
//!
//! The kernel never talks HTTP itself. It drives an injected
//! [`RemoteStore`], which the host backs with the real bucket API
//! (`bucketfs-client`) or with [`MemoryStore`] in tests and offline runs.
//!
//! Remote paths are flat object keys that look like absolute paths
//! (`/src/main.rs`). Directories do not exist remotely.

mod memory;

use std::time::SystemTime;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::DateTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::mount::RemoteConfig;

pub use memory::{MemoryStore, StoreCall};

/// Remote store error type.
#[derive(Debug, Clone, Error)]
pub enum RemoteError {
    /// The object does not exist.
    #[error("remote object not found: {0}")]
    NotFound(String),

    /// Credentials were rejected.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The store answered with an unexpected status.
    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },

    /// The request never got an answer.
    #[error("transport error: {0}")]
    Transport(String),

    /// The answer could not be decoded.
    #[error("decode error: {0}")]
    Decode(String),
}

impl RemoteError {
    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound(path.into())
    }

    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }
}

/// Remote store result type.
pub type RemoteResult<T> = Result<T, RemoteError>;

/// One entry of the remote file listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteFileInfo {
    pub path: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub content_type: String,
    /// RFC 3339 timestamp.
    #[serde(default)]
    pub modified_at: String,
}

impl RemoteFileInfo {
    pub fn new(path: impl Into<String>, size: u64) -> Self {
        Self {
            path: path.into(),
            size,
            content_type: crate::constants::DEFAULT_CONTENT_TYPE.to_string(),
            modified_at: String::new(),
        }
    }

    /// Parsed `modified_at`, if it is a valid RFC 3339 timestamp.
    pub fn modified(&self) -> Option<SystemTime> {
        DateTime::parse_from_rfc3339(&self.modified_at)
            .ok()
            .map(SystemTime::from)
    }
}

/// Operations the kernel needs from the remote bucket.
///
/// Every call receives the mounted [`RemoteConfig`], which carries the
/// endpoint and credentials.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// List every file in the bucket.
    async fn list(&self, remote: &RemoteConfig) -> RemoteResult<Vec<RemoteFileInfo>>;

    /// Fetch the content of one file.
    async fn get(&self, remote: &RemoteConfig, path: &str) -> RemoteResult<Bytes>;

    /// Create or replace a file.
    async fn put(
        &self,
        remote: &RemoteConfig,
        path: &str,
        content: Bytes,
        content_type: &str,
    ) -> RemoteResult<()>;

    /// Remove a file.
    async fn delete(&self, remote: &RemoteConfig, path: &str) -> RemoteResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_info_from_listing_json() {
        let json = r#"[{"path":"/a.txt","size":3,"content_type":"text/plain","modified_at":"2024-05-01T12:00:00.123456789Z"}]"#;
        let files: Vec<RemoteFileInfo> = serde_json::from_str(json).unwrap();
        assert_eq!(files[0].path, "/a.txt");
        assert_eq!(files[0].size, 3);
        assert!(files[0].modified().is_some());
    }

    #[test]
    fn test_file_info_bad_timestamp() {
        let info = RemoteFileInfo::new("/a", 0);
        assert!(info.modified().is_none());
    }
}
