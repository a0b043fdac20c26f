//! Virtual Filesystem abstraction.
//!
//! This module provides the path-based tree the kernel serves from memory.
//! Key components:
//!
//! - [`VfsOps`] - Host-facing filesystem operations
//! - [`Node`] - Owned file/directory tree
//! - [`path`] - Slash-delimited path normalization
//!
//! ## Design Decisions
//!
//! - **Path-based, no inodes**: Operations take normalized `/`-rooted strings.
//! - **Whole-file content**: Reads and writes move entire files, matching the
//!   remote store which only knows whole objects.
//! - **Sorted children**: Directories keep a `BTreeMap`, so listings are
//!   stable and name-ordered.

mod error;
mod node;
mod ops;
pub mod path;
mod types;

pub use error::{VfsError, VfsResult};
pub use node::{Node, NodeKind};
pub use ops::VfsOps;
pub use types::{DirEntry, FileAttr, FileType, RenameOptions, WriteOptions};
