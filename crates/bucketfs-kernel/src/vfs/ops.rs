//! VFS operations trait.
//!
//! This trait is the host-facing filesystem-provider surface: whole-file
//! reads and writes, path-based, plus a change-event subscription.

use async_trait::async_trait;
use bytes::Bytes;

use super::VfsResult;
use super::types::{DirEntry, FileAttr, RenameOptions, WriteOptions};
use crate::notify::ChangeSubscription;

/// Core VFS operations trait.
///
/// Paths are `/`-delimited and normalized by the implementation, so
/// `a/b`, `/a/b` and `/a/./b` name the same node.
#[async_trait]
pub trait VfsOps: Send + Sync {
    // ========================================================================
    // Reading
    // ========================================================================

    /// Get file attributes.
    async fn stat(&self, path: &str) -> VfsResult<FileAttr>;

    /// List directory entries, sorted by name.
    async fn read_directory(&self, path: &str) -> VfsResult<Vec<DirEntry>>;

    /// Read the whole content of a file.
    async fn read_file(&self, path: &str) -> VfsResult<Bytes>;

    // ========================================================================
    // Writing
    // ========================================================================

    /// Create or replace the content of a file.
    async fn write_file(&self, path: &str, content: Bytes, options: WriteOptions)
    -> VfsResult<()>;

    /// Move a file or directory.
    async fn rename(&self, from: &str, to: &str, options: RenameOptions) -> VfsResult<()>;

    /// Remove a file or directory (recursively).
    async fn delete(&self, path: &str) -> VfsResult<()>;

    /// Create an empty directory. The parent must exist.
    async fn create_directory(&self, path: &str) -> VfsResult<()>;

    // ========================================================================
    // Events
    // ========================================================================

    /// Subscribe to batched change events.
    fn subscribe(&self) -> ChangeSubscription;

    // ========================================================================
    // Convenience methods (default implementations)
    // ========================================================================

    /// Check if a path exists.
    async fn exists(&self, path: &str) -> bool {
        self.stat(path).await.is_ok()
    }

    /// Create or replace a file.
    async fn write_all(&self, path: &str, content: Bytes) -> VfsResult<()> {
        self.write_file(path, content, WriteOptions::upsert()).await
    }
}
