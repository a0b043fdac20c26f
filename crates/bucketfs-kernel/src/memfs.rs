//! In-memory filesystem mounted on a remote bucket.
//!
//! All reads and structural mutations are served from an owned [`Node`]
//! tree behind one mutex. Mutations inside the mount prefix enqueue a
//! write-back operation; every mutation buffers change events.
//!
//! Lifecycle:
//!
//! 1. [`MemFs::new`] starts in local-only mode: everything works in memory,
//!    nothing touches the network.
//! 2. [`MemFs::mount`] decodes a capability path once and grafts the mount
//!    scaffold (`/<marker-segment>/<project>`).
//! 3. The first operation after mount hydrates the tree from the bucket.

use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;

use crate::config::FsConfig;
use crate::hydrate::{HydrateReport, Hydrator};
use crate::mount::{Capability, RemoteConfig};
use crate::notify::{ChangeEvent, ChangeSubscription, EventNotifier};
use crate::remote::RemoteStore;
use crate::vfs::path;
use crate::vfs::{
    DirEntry, FileAttr, Node, RenameOptions, VfsError, VfsOps, VfsResult, WriteOptions,
};
use crate::writeback::{DeadLetter, FlushReport, WriteBackQueue};

#[derive(Debug)]
struct Mounted {
    remote: RemoteConfig,
    writeback: WriteBackQueue,
}

/// Remote-backed in-memory filesystem.
pub struct MemFs {
    root: Mutex<Node>,
    store: Arc<dyn RemoteStore>,
    mounted: OnceLock<Mounted>,
    hydrator: Hydrator,
    events: EventNotifier,
    config: FsConfig,
}

impl std::fmt::Debug for MemFs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemFs")
            .field("mounted", &self.mounted.get())
            .field("hydrator", &self.hydrator)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl MemFs {
    /// Create an unmounted filesystem with default settings.
    pub fn new(store: Arc<dyn RemoteStore>) -> Self {
        Self::with_config(store, FsConfig::default())
    }

    pub fn with_config(store: Arc<dyn RemoteStore>, config: FsConfig) -> Self {
        Self {
            root: Mutex::new(Node::root()),
            store,
            mounted: OnceLock::new(),
            hydrator: Hydrator::new(config.hydrate_concurrency),
            events: EventNotifier::new(config.quiescence()),
            config,
        }
    }

    pub fn config(&self) -> &FsConfig {
        &self.config
    }

    // ========================================================================
    // Mounting
    // ========================================================================

    /// Mount the bucket named by a capability path.
    ///
    /// Returns `None` if `path` carries no capability. Mounting happens at
    /// most once; later calls return the existing config.
    pub fn mount(&self, path: &str) -> Option<&RemoteConfig> {
        if let Some(mounted) = self.mounted.get() {
            return Some(&mounted.remote);
        }
        let capability = Capability::parse(path)?;
        Some(self.mount_capability(&capability))
    }

    /// Mount from an already decoded capability.
    pub fn mount_capability(&self, capability: &Capability) -> &RemoteConfig {
        let mut fresh = false;
        let mounted = self.mounted.get_or_init(|| {
            fresh = true;
            let remote = capability.remote_config();
            let writeback =
                WriteBackQueue::new(self.store.clone(), remote.clone(), self.config.writeback());
            Mounted { remote, writeback }
        });

        if !fresh {
            if mounted.remote != capability.remote_config() {
                tracing::warn!(
                    mounted = %mounted.remote.path_prefix,
                    requested = %capability.mount_path(),
                    "already mounted, ignoring capability"
                );
            }
            return &mounted.remote;
        }

        let marker_path = format!("/{}", capability.marker_segment);
        let mount_path = capability.mount_path();
        let replaced: Vec<String> = {
            let mut root = self.root.lock();
            let replaced = [&marker_path, &mount_path]
                .into_iter()
                .filter(|p| root.lookup(p).is_some_and(|node| !node.is_dir()))
                .cloned()
                .collect();
            if let Some(marker) = root.ensure_directory(&capability.marker_segment) {
                marker.ensure_directory(&capability.project);
            }
            replaced
        };
        for path in &replaced {
            tracing::warn!(path = %path, "local file replaced by mount point");
        }
        tracing::info!(
            store_id = %mounted.remote.store_id,
            endpoint = %mounted.remote.endpoint,
            project = %capability.project,
            "mounted bucket"
        );
        self.events.fire_soon(
            replaced
                .into_iter()
                .map(ChangeEvent::deleted)
                .chain([
                    ChangeEvent::created(marker_path),
                    ChangeEvent::created(mount_path),
                    ChangeEvent::changed("/"),
                ]),
        );
        &mounted.remote
    }

    pub fn remote_config(&self) -> Option<&RemoteConfig> {
        self.mounted.get().map(|m| &m.remote)
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted.get().is_some()
    }

    // ========================================================================
    // Hydration
    // ========================================================================

    /// Load the bucket into the tree if that has not happened yet.
    pub async fn ensure_loaded(&self) -> VfsResult<()> {
        self.hydrator
            .ensure_loaded(&self.root, self.store.as_ref(), self.remote_config())
            .await
    }

    pub fn is_loaded(&self) -> bool {
        self.hydrator.is_loaded()
    }

    pub fn hydrate_report(&self) -> Option<HydrateReport> {
        self.hydrator.report()
    }

    // ========================================================================
    // Write-back
    // ========================================================================

    /// The write-back queue, once mounted.
    pub fn writeback(&self) -> Option<&WriteBackQueue> {
        self.mounted.get().map(|m| &m.writeback)
    }

    /// Run one flush now. `None` when unmounted or a flush is already running.
    pub async fn flush_writeback(&self) -> Option<FlushReport> {
        self.writeback()?.flush().await
    }

    /// Flush until the queue is empty.
    pub async fn drain_writeback(&self) -> FlushReport {
        match self.writeback() {
            Some(queue) => queue.drain().await,
            None => FlushReport::default(),
        }
    }

    pub fn dead_letters(&self) -> Vec<DeadLetter> {
        self.writeback()
            .map(WriteBackQueue::dead_letters)
            .unwrap_or_default()
    }

    pub fn take_dead_letters(&self) -> Vec<DeadLetter> {
        self.writeback()
            .map(WriteBackQueue::take_dead_letters)
            .unwrap_or_default()
    }

    /// Deliver buffered change events without waiting for quiescence.
    pub fn flush_events(&self) -> usize {
        self.events.flush_now()
    }

    fn enqueue_put(&self, tree_path: &str, content: Bytes) {
        let Some(mounted) = self.mounted.get() else {
            return;
        };
        if let Some(remote_path) = mounted.remote.remote_path(tree_path) {
            mounted.writeback.put(remote_path, content);
        }
    }

    fn enqueue_delete(&self, tree_path: &str) {
        let Some(mounted) = self.mounted.get() else {
            return;
        };
        if let Some(remote_path) = mounted.remote.remote_path(tree_path) {
            mounted.writeback.delete(remote_path);
        }
    }
}

#[async_trait]
impl VfsOps for MemFs {
    async fn stat(&self, path: &str) -> VfsResult<FileAttr> {
        self.ensure_loaded().await?;
        let path = path::normalize(path);
        self.root
            .lock()
            .lookup(&path)
            .map(Node::attr)
            .ok_or_else(|| VfsError::not_found(path))
    }

    async fn read_directory(&self, path: &str) -> VfsResult<Vec<DirEntry>> {
        self.ensure_loaded().await?;
        let path = path::normalize(path);
        let root = self.root.lock();
        Ok(root.lookup_dir(&path)?.entries())
    }

    async fn read_file(&self, path: &str) -> VfsResult<Bytes> {
        self.ensure_loaded().await?;
        let path = path::normalize(path);
        let root = self.root.lock();
        let node = root
            .lookup(&path)
            .ok_or_else(|| VfsError::not_found(&path))?;
        if node.is_dir() {
            return Err(VfsError::is_a_directory(path));
        }
        node.content()
            .cloned()
            .ok_or_else(|| VfsError::not_found(path))
    }

    async fn write_file(
        &self,
        path: &str,
        content: Bytes,
        options: WriteOptions,
    ) -> VfsResult<()> {
        self.ensure_loaded().await?;
        let path = path::normalize(path);
        let (parent_path, name) =
            path::split_parent(&path).ok_or_else(|| VfsError::is_a_directory(&path))?;

        let created = {
            let mut root = self.root.lock();
            let parent = root.lookup_dir_mut(&parent_path)?;
            match parent.lookup_mut(&name) {
                Some(node) if node.is_dir() => return Err(VfsError::is_a_directory(path)),
                Some(_) if options.create && !options.overwrite => {
                    return Err(VfsError::already_exists(path));
                }
                Some(node) => {
                    node.set_content(content.clone());
                    false
                }
                None if !options.create => return Err(VfsError::not_found(path)),
                None => {
                    let mut file = Node::file(name);
                    file.set_content(content.clone());
                    parent
                        .attach(file)
                        .map_err(|_| VfsError::not_a_directory(&parent_path))?;
                    parent.touch();
                    true
                }
            }
        };

        tracing::trace!(path = %path, bytes = content.len(), created, "wrote file");
        if created {
            self.events.fire_soon([
                ChangeEvent::created(path.clone()),
                ChangeEvent::changed(path.clone()),
            ]);
        } else {
            self.events.fire_soon([ChangeEvent::changed(path.clone())]);
        }
        self.enqueue_put(&path, content);
        Ok(())
    }

    async fn rename(&self, from: &str, to: &str, options: RenameOptions) -> VfsResult<()> {
        self.ensure_loaded().await?;
        let from = path::normalize(from);
        let to = path::normalize(to);

        if from == to {
            return match self.root.lock().lookup(&from) {
                Some(_) => Ok(()),
                None => Err(VfsError::not_found(from)),
            };
        }
        let (from_parent, from_name) =
            path::split_parent(&from).ok_or_else(|| VfsError::invalid_path(&from))?;
        let (to_parent, to_name) =
            path::split_parent(&to).ok_or_else(|| VfsError::invalid_path(&to))?;
        if path::is_within(&to, &from) {
            return Err(VfsError::invalid_path(to));
        }

        let (moved, replaced) = {
            let mut root = self.root.lock();
            let source = root
                .lookup(&from)
                .ok_or_else(|| VfsError::not_found(&from))?;
            let source_is_dir = source.is_dir();
            root.lookup_dir(&to_parent)?;

            let replaced = match root.lookup(&to) {
                Some(_) if !options.overwrite => return Err(VfsError::already_exists(to)),
                Some(existing) if existing.is_dir() && !source_is_dir => {
                    return Err(VfsError::is_a_directory(to));
                }
                Some(existing) if !existing.is_dir() && source_is_dir => {
                    return Err(VfsError::not_a_directory(to));
                }
                Some(existing) => existing.files(&to),
                None => Vec::new(),
            };

            let source_parent = root.lookup_dir_mut(&from_parent)?;
            let mut node = source_parent
                .detach(&from_name)
                .ok_or_else(|| VfsError::not_found(&from))?;
            source_parent.touch();
            let moved = node.files(&from);
            node.set_name(to_name);

            let attached = match root.lookup_dir_mut(&to_parent) {
                Ok(dest) => dest.attach(node).map(|_| dest.touch()),
                Err(_) => Err(node),
            };
            if let Err(mut node) = attached {
                node.set_name(from_name);
                if let Ok(source_parent) = root.lookup_dir_mut(&from_parent) {
                    let _ = source_parent.attach(node);
                }
                return Err(VfsError::not_a_directory(to_parent));
            }
            (moved, replaced)
        };

        tracing::debug!(from = %from, to = %to, files = moved.len(), "renamed");
        self.events.fire_soon([
            ChangeEvent::deleted(from.clone()),
            ChangeEvent::created(to.clone()),
        ]);

        for (replaced_path, _) in replaced {
            self.enqueue_delete(&replaced_path);
        }
        for (old_path, content) in moved {
            let new_path = match path::strip_prefix(&old_path, &from) {
                Some(rest) => path::join(&to, &rest),
                None => continue,
            };
            self.enqueue_delete(&old_path);
            if let Some(content) = content {
                self.enqueue_put(&new_path, content);
            }
        }
        Ok(())
    }

    async fn delete(&self, path: &str) -> VfsResult<()> {
        self.ensure_loaded().await?;
        let path = path::normalize(path);
        let (parent_path, name) =
            path::split_parent(&path).ok_or_else(|| VfsError::invalid_path(&path))?;

        let removed = {
            let mut root = self.root.lock();
            let parent = root.lookup_dir_mut(&parent_path)?;
            let node = parent
                .detach(&name)
                .ok_or_else(|| VfsError::not_found(&path))?;
            parent.touch();
            node.files(&path)
        };

        tracing::debug!(path = %path, files = removed.len(), "deleted");
        self.events.fire_soon([
            ChangeEvent::changed(parent_path),
            ChangeEvent::deleted(path),
        ]);
        for (file_path, _) in removed {
            self.enqueue_delete(&file_path);
        }
        Ok(())
    }

    async fn create_directory(&self, path: &str) -> VfsResult<()> {
        self.ensure_loaded().await?;
        let path = path::normalize(path);
        let Some((parent_path, name)) = path::split_parent(&path) else {
            return Err(VfsError::already_exists(path));
        };

        {
            let mut root = self.root.lock();
            let parent = root.lookup_dir_mut(&parent_path)?;
            if parent.child(&name).is_some() {
                return Err(VfsError::already_exists(path));
            }
            parent
                .attach(Node::directory(name))
                .map_err(|_| VfsError::not_a_directory(&parent_path))?;
            parent.touch();
        }

        self.events.fire_soon([
            ChangeEvent::changed(parent_path),
            ChangeEvent::created(path),
        ]);
        Ok(())
    }

    fn subscribe(&self) -> ChangeSubscription {
        self.events.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mount::encode_capability;
    use crate::notify::ChangeKind;
    use crate::remote::{MemoryStore, StoreCall};
    use crate::writeback::OpKind;

    fn mount_path() -> String {
        format!("/{}/demo", encode_capability("b", "t", "http://bucket.test"))
    }

    fn mounted(store: &Arc<MemoryStore>) -> MemFs {
        let fs = MemFs::new(store.clone());
        fs.mount(&mount_path()).unwrap();
        fs
    }

    fn at(rel: &str) -> String {
        path::join(&mount_path(), rel)
    }

    fn queued(fs: &MemFs) -> Vec<(String, OpKind)> {
        fs.writeback()
            .unwrap()
            .pending()
            .into_iter()
            .map(|op| (op.path, op.kind))
            .collect()
    }

    #[tokio::test]
    async fn test_local_only_before_mount() {
        let store = Arc::new(MemoryStore::new());
        let fs = MemFs::new(store.clone());

        fs.create_directory("/scratch").await.unwrap();
        fs.write_all("/scratch/a.txt", Bytes::from_static(b"hi"))
            .await
            .unwrap();
        assert_eq!(fs.read_file("/scratch/a.txt").await.unwrap(), "hi");

        assert!(fs.writeback().is_none());
        assert!(!fs.is_loaded());
        assert!(store.calls().is_empty());
    }

    #[tokio::test]
    async fn test_mount_grafts_scaffold_once() {
        let store = Arc::new(MemoryStore::new());
        let fs = MemFs::new(store.clone());
        assert!(fs.mount("/plain/path").is_none());

        let prefix = fs.mount(&mount_path()).unwrap().path_prefix.clone();
        assert_eq!(prefix, mount_path());
        assert!(fs.stat(&prefix).await.unwrap().is_dir());

        let other = format!("/{}/other", encode_capability("x", "y", "z"));
        assert_eq!(fs.mount(&other).unwrap().store_id, "b");
        assert!(!fs.exists(&other).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_mount_over_local_file_reports_deletion() {
        let store = Arc::new(MemoryStore::new());
        let fs = MemFs::new(store.clone());
        let marker = path::parent(&mount_path());
        fs.write_all(&marker, Bytes::from_static(b"local"))
            .await
            .unwrap();
        fs.flush_events();
        let mut sub = fs.subscribe();

        fs.mount(&mount_path()).unwrap();

        let batch = sub.recv().await.unwrap();
        assert_eq!(
            batch,
            vec![
                ChangeEvent::deleted(marker.clone()),
                ChangeEvent::created(marker.clone()),
                ChangeEvent::created(mount_path()),
                ChangeEvent::changed("/"),
            ]
        );
        assert!(fs.stat(&marker).await.unwrap().is_dir());
    }

    #[tokio::test]
    async fn test_write_then_read() {
        let store = Arc::new(MemoryStore::new());
        let fs = mounted(&store);

        fs.write_all(&at("a.txt"), Bytes::from_static(b"hello"))
            .await
            .unwrap();
        assert_eq!(fs.read_file(&at("a.txt")).await.unwrap(), "hello");
        assert_eq!(fs.stat(&at("a.txt")).await.unwrap().size, 5);
        assert_eq!(
            queued(&fs),
            vec![("/a.txt".to_string(), OpKind::Put(Bytes::from_static(b"hello")))]
        );
    }

    #[tokio::test]
    async fn test_write_option_errors() {
        let store = Arc::new(MemoryStore::new());
        let fs = mounted(&store);
        let file = at("a.txt");

        let err = fs
            .write_file(&file, Bytes::from_static(b"x"), WriteOptions::update())
            .await
            .unwrap_err();
        assert!(matches!(err, VfsError::NotFound(_)));

        fs.write_file(&file, Bytes::from_static(b"x"), WriteOptions::create_new())
            .await
            .unwrap();
        let err = fs
            .write_file(&file, Bytes::from_static(b"y"), WriteOptions::create_new())
            .await
            .unwrap_err();
        assert!(matches!(err, VfsError::AlreadyExists(_)));

        let err = fs
            .write_all(&mount_path(), Bytes::from_static(b"y"))
            .await
            .unwrap_err();
        assert!(matches!(err, VfsError::IsADirectory(_)));

        let err = fs
            .write_all(&at("missing/b.txt"), Bytes::from_static(b"y"))
            .await
            .unwrap_err();
        assert!(matches!(err, VfsError::NotFound(_)));

        let err = fs
            .write_all(&at("a.txt/b.txt"), Bytes::from_static(b"y"))
            .await
            .unwrap_err();
        assert!(matches!(err, VfsError::NotADirectory(_)));
    }

    #[tokio::test]
    async fn test_delete_leaves_single_delete_op() {
        let store = Arc::new(MemoryStore::new());
        let fs = mounted(&store);
        let file = at("a.txt");

        fs.write_all(&file, Bytes::from_static(b"a")).await.unwrap();
        fs.delete(&file).await.unwrap();

        assert!(matches!(
            fs.stat(&file).await,
            Err(VfsError::NotFound(_))
        ));
        assert_eq!(queued(&fs), vec![("/a.txt".to_string(), OpKind::Delete)]);
        assert!(matches!(
            fs.delete(&file).await,
            Err(VfsError::NotFound(_))
        ));
        assert!(matches!(
            fs.delete("/").await,
            Err(VfsError::InvalidPath(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_directory_enqueues_every_file() {
        let store = Arc::new(MemoryStore::new());
        let fs = mounted(&store);

        fs.create_directory(&at("dir")).await.unwrap();
        fs.create_directory(&at("dir/sub")).await.unwrap();
        fs.write_all(&at("dir/a"), Bytes::from_static(b"a"))
            .await
            .unwrap();
        fs.write_all(&at("dir/sub/b"), Bytes::from_static(b"b"))
            .await
            .unwrap();
        fs.delete(&at("dir")).await.unwrap();

        assert_eq!(
            queued(&fs),
            vec![
                ("/dir/a".to_string(), OpKind::Delete),
                ("/dir/sub/b".to_string(), OpKind::Delete),
            ]
        );
    }

    #[tokio::test]
    async fn test_rename_file() {
        let store = Arc::new(MemoryStore::new());
        let fs = mounted(&store);

        fs.write_all(&at("a"), Bytes::from_static(b"content"))
            .await
            .unwrap();
        fs.writeback().unwrap().drain().await;
        fs.rename(&at("a"), &at("b"), RenameOptions::default())
            .await
            .unwrap();

        assert_eq!(fs.read_file(&at("b")).await.unwrap(), "content");
        assert!(matches!(
            fs.read_file(&at("a")).await,
            Err(VfsError::NotFound(_))
        ));
        assert_eq!(
            queued(&fs),
            vec![
                ("/a".to_string(), OpKind::Delete),
                ("/b".to_string(), OpKind::Put(Bytes::from_static(b"content"))),
            ]
        );
    }

    #[tokio::test]
    async fn test_rename_overwrite_rules() {
        let store = Arc::new(MemoryStore::new());
        let fs = mounted(&store);

        fs.write_all(&at("a"), Bytes::from_static(b"a")).await.unwrap();
        fs.write_all(&at("b"), Bytes::from_static(b"b")).await.unwrap();

        let err = fs
            .rename(&at("a"), &at("b"), RenameOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, VfsError::AlreadyExists(_)));

        fs.rename(&at("a"), &at("b"), RenameOptions::overwrite())
            .await
            .unwrap();
        assert_eq!(fs.read_file(&at("b")).await.unwrap(), "a");

        let err = fs
            .rename(&at("missing"), &at("c"), RenameOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, VfsError::NotFound(_)));

        // Same path is a no-op.
        fs.rename(&at("b"), &at("b"), RenameOptions::default())
            .await
            .unwrap();
        assert_eq!(fs.read_file(&at("b")).await.unwrap(), "a");
    }

    #[tokio::test]
    async fn test_rename_directory_moves_subtree() {
        let store = Arc::new(MemoryStore::new());
        let fs = mounted(&store);

        fs.create_directory(&at("src")).await.unwrap();
        fs.write_all(&at("src/main.rs"), Bytes::from_static(b"fn main() {}"))
            .await
            .unwrap();
        fs.writeback().unwrap().drain().await;

        fs.rename(&at("src"), &at("lib"), RenameOptions::default())
            .await
            .unwrap();
        assert_eq!(
            fs.read_file(&at("lib/main.rs")).await.unwrap(),
            "fn main() {}"
        );
        assert_eq!(
            queued(&fs),
            vec![
                ("/src/main.rs".to_string(), OpKind::Delete),
                (
                    "/lib/main.rs".to_string(),
                    OpKind::Put(Bytes::from_static(b"fn main() {}"))
                ),
            ]
        );

        let err = fs
            .rename(&at("lib"), &at("lib/nested"), RenameOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, VfsError::InvalidPath(_)));
        let err = fs
            .rename("/", &at("x"), RenameOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, VfsError::InvalidPath(_)));
    }

    #[tokio::test]
    async fn test_create_directory() {
        let store = Arc::new(MemoryStore::new());
        let fs = mounted(&store);

        fs.create_directory(&at("d")).await.unwrap();
        assert!(fs.stat(&at("d")).await.unwrap().is_dir());
        assert!(matches!(
            fs.create_directory(&at("d")).await,
            Err(VfsError::AlreadyExists(_))
        ));
        assert!(matches!(
            fs.create_directory(&at("x/y")).await,
            Err(VfsError::NotFound(_))
        ));
        assert!(fs.writeback().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_read_errors() {
        let store = Arc::new(MemoryStore::new());
        let fs = mounted(&store);
        fs.write_all(&at("f"), Bytes::from_static(b"f")).await.unwrap();

        assert!(matches!(
            fs.read_file(&mount_path()).await,
            Err(VfsError::IsADirectory(_))
        ));
        assert!(matches!(
            fs.read_directory(&at("f")).await,
            Err(VfsError::NotADirectory(_))
        ));
        assert!(matches!(
            fs.read_directory(&at("nope")).await,
            Err(VfsError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_hydrates_on_first_use() {
        let store = Arc::new(MemoryStore::new());
        store.insert("/a.txt", "a");
        store.insert("/dir/b.txt", "b");
        let fs = mounted(&store);

        let names: Vec<_> = fs
            .read_directory(&mount_path())
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.name)
            .collect();
        assert_eq!(names, vec!["a.txt", "dir"]);
        let names: Vec<_> = fs
            .read_directory(&at("dir"))
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.name)
            .collect();
        assert_eq!(names, vec!["b.txt"]);
        assert!(fs.is_loaded());
    }

    #[tokio::test]
    async fn test_paths_outside_mount_are_local_only() {
        let store = Arc::new(MemoryStore::new());
        let fs = mounted(&store);

        fs.create_directory("/tmp").await.unwrap();
        fs.write_all("/tmp/x", Bytes::from_static(b"x")).await.unwrap();
        assert!(fs.writeback().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_mutations_emit_one_batch() {
        let store = Arc::new(MemoryStore::new());
        let fs = mounted(&store);
        fs.flush_events();
        let mut sub = fs.subscribe();

        fs.write_all(&at("a"), Bytes::from_static(b"1")).await.unwrap();
        fs.write_all(&at("a"), Bytes::from_static(b"2")).await.unwrap();

        let batch = sub.recv().await.unwrap();
        let kinds: Vec<_> = batch.iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![ChangeKind::Created, ChangeKind::Changed, ChangeKind::Changed]
        );
        assert!(batch.iter().all(|e| e.path == at("a")));
    }

    #[tokio::test]
    async fn test_drain_reaches_store() {
        let store = Arc::new(MemoryStore::new());
        let fs = mounted(&store);

        fs.write_all(&at("a"), Bytes::from_static(b"1")).await.unwrap();
        fs.write_all(&at("a"), Bytes::from_static(b"2")).await.unwrap();
        let report = fs.drain_writeback().await;

        assert_eq!(report.executed, 1);
        assert_eq!(
            store.writes(),
            vec![StoreCall::Put("/a".into(), Bytes::from_static(b"2"))]
        );
    }
}
