//! Core VFS types.

use serde::{Deserialize, Serialize};
use std::time::SystemTime;

/// File type enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileType {
    /// Regular file.
    File,
    /// Directory.
    Directory,
}

impl FileType {
    /// Returns true if this is a regular file.
    pub fn is_file(&self) -> bool {
        matches!(self, FileType::File)
    }

    /// Returns true if this is a directory.
    pub fn is_dir(&self) -> bool {
        matches!(self, FileType::Directory)
    }
}

/// File attributes (metadata).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileAttr {
    /// File type.
    pub kind: FileType,
    /// Files: content length. Directories: entry count.
    pub size: u64,
    /// Creation time.
    pub ctime: SystemTime,
    /// Last modification time.
    pub mtime: SystemTime,
}

impl FileAttr {
    /// Returns true if this is a regular file.
    pub fn is_file(&self) -> bool {
        self.kind.is_file()
    }

    /// Returns true if this is a directory.
    pub fn is_dir(&self) -> bool {
        self.kind.is_dir()
    }
}

/// Directory entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirEntry {
    /// Entry name (not full path).
    pub name: String,
    /// Entry type.
    pub kind: FileType,
}

impl DirEntry {
    /// Create a new directory entry.
    pub fn new(name: impl Into<String>, kind: FileType) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }

    /// Create a file entry.
    pub fn file(name: impl Into<String>) -> Self {
        Self::new(name, FileType::File)
    }

    /// Create a directory entry.
    pub fn directory(name: impl Into<String>) -> Self {
        Self::new(name, FileType::Directory)
    }
}

/// Flags for [`write_file`](super::VfsOps::write_file).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WriteOptions {
    /// Create the file if it does not exist.
    pub create: bool,
    /// Replace an existing file when `create` is set.
    pub overwrite: bool,
}

impl WriteOptions {
    /// Update an existing file only.
    pub fn update() -> Self {
        Self {
            create: false,
            overwrite: true,
        }
    }

    /// Create a new file, failing if it exists.
    pub fn create_new() -> Self {
        Self {
            create: true,
            overwrite: false,
        }
    }

    /// Create or replace.
    pub fn upsert() -> Self {
        Self {
            create: true,
            overwrite: true,
        }
    }
}

/// Flags for [`rename`](super::VfsOps::rename).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RenameOptions {
    /// Replace the destination if it exists.
    pub overwrite: bool,
}

impl RenameOptions {
    pub fn overwrite() -> Self {
        Self { overwrite: true }
    }
}
