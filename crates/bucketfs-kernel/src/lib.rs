//! # bucketfs-kernel
//!
//! In-memory virtual filesystem backed by a remote code bucket.
//!
//! The kernel presents a flat remote file store as a hierarchical tree:
//! - Mounts a bucket from a capability path (`/mtbucket::<base64>/<project>`)
//! - Hydrates the whole tree once, on first use, with bounded fetch concurrency
//! - Serves stat/list/read/write/rename/delete synchronously from memory
//! - Writes changes back asynchronously, coalesced per path
//! - Batches change notifications for the host

pub mod config;
pub mod constants;
pub mod hydrate;
pub mod memfs;
pub mod mount;
pub mod notify;
pub mod remote;
pub mod vfs;
pub mod writeback;

pub use config::{ConfigError, FsConfig};
pub use hydrate::{HydrateReport, Hydrator};
pub use memfs::MemFs;
pub use mount::{Capability, RemoteConfig};
pub use notify::{ChangeEvent, ChangeKind, ChangeSubscription, EventNotifier};
pub use remote::{MemoryStore, RemoteError, RemoteFileInfo, RemoteResult, RemoteStore};
pub use vfs::{
    DirEntry, FileAttr, FileType, Node, RenameOptions, VfsError, VfsOps, VfsResult, WriteOptions,
};
pub use writeback::{
    DeadLetter, DeadLetterReason, FlushReport, OpKind, PendingOperation, WriteBackQueue,
    WriteBackSettings,
};
