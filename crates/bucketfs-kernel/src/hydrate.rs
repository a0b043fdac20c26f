//! One-shot hydration of the tree from the remote bucket.
//!
//! The first caller of [`Hydrator::ensure_loaded`] lists the bucket and
//! fetches every file with bounded concurrency; concurrent callers wait for
//! that same load, later callers return immediately. A failed listing leaves
//! the hydrator unloaded so the next caller starts over. Per-file fetch
//! failures are logged and skipped.
//!
//! The tree is never re-hydrated once loaded, even if the bucket changes.

use std::time::SystemTime;

use futures::StreamExt;
use futures::stream;
use parking_lot::Mutex;
use tokio::sync::OnceCell;

use crate::mount::RemoteConfig;
use crate::remote::RemoteStore;
use crate::vfs::{Node, VfsResult};

/// Outcome of a completed hydration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HydrateReport {
    /// Files in the remote listing.
    pub listed: usize,
    /// Files inserted into the tree.
    pub loaded: usize,
    /// Files skipped because their fetch or insert failed.
    pub failed: usize,
}

/// Single-flight loader.
#[derive(Debug)]
pub struct Hydrator {
    loaded: OnceCell<HydrateReport>,
    concurrency: usize,
}

impl Hydrator {
    pub fn new(concurrency: usize) -> Self {
        Self {
            loaded: OnceCell::new(),
            concurrency: concurrency.max(1),
        }
    }

    /// True once a hydration pass has completed.
    pub fn is_loaded(&self) -> bool {
        self.loaded.initialized()
    }

    /// Report of the completed pass, if any.
    pub fn report(&self) -> Option<HydrateReport> {
        self.loaded.get().copied()
    }

    /// Hydrate `tree` unless already done.
    ///
    /// With no `remote` (unmounted, local-only) this is a no-op and the
    /// hydrator stays unloaded.
    pub async fn ensure_loaded(
        &self,
        tree: &Mutex<Node>,
        store: &dyn RemoteStore,
        remote: Option<&RemoteConfig>,
    ) -> VfsResult<()> {
        let Some(remote) = remote else {
            return Ok(());
        };
        self.loaded
            .get_or_try_init(|| self.load(tree, store, remote))
            .await?;
        Ok(())
    }

    async fn load(
        &self,
        tree: &Mutex<Node>,
        store: &dyn RemoteStore,
        remote: &RemoteConfig,
    ) -> VfsResult<HydrateReport> {
        let listing = store.list(remote).await.inspect_err(|e| {
            tracing::error!(store_id = %remote.store_id, error = %e, "failed to list remote files");
        })?;

        let mut report = HydrateReport {
            listed: listing.len(),
            ..Default::default()
        };
        tracing::debug!(files = report.listed, "hydrating from remote");

        let mut accepted = Vec::with_capacity(listing.len());
        for info in listing {
            match remote.tree_path(&info.path) {
                Some(tree_path) => accepted.push((info, tree_path)),
                None => {
                    tracing::warn!(path = %info.path, "listed path escapes the mount, skipping");
                    report.failed += 1;
                }
            }
        }

        let mut fetches = stream::iter(accepted)
            .map(move |(info, tree_path)| async move {
                let result = store.get(remote, &info.path).await;
                (info, tree_path, result)
            })
            .buffer_unordered(self.concurrency);

        while let Some((info, tree_path, result)) = fetches.next().await {
            let content = match result {
                Ok(content) => content,
                Err(e) => {
                    tracing::warn!(path = %info.path, error = %e, "failed to fetch file, skipping");
                    report.failed += 1;
                    continue;
                }
            };

            let modified = info.modified().unwrap_or_else(SystemTime::now);
            let inserted = tree.lock().insert_file_at(&tree_path, content, modified);
            match inserted {
                Ok(()) => report.loaded += 1,
                Err(e) => {
                    tracing::warn!(path = %tree_path, error = %e, "remote file conflicts with tree, skipping");
                    report.failed += 1;
                }
            }
        }

        tracing::info!(
            listed = report.listed,
            loaded = report.loaded,
            failed = report.failed,
            "hydration complete"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use async_trait::async_trait;
    use bytes::Bytes;

    use crate::remote::{MemoryStore, RemoteFileInfo, RemoteResult};
    use crate::vfs::VfsError;

    fn remote() -> RemoteConfig {
        RemoteConfig::new("http://bucket.test", "b", "t", "/m/p")
    }

    #[tokio::test]
    async fn test_hydrates_nested_paths() {
        let store = MemoryStore::new();
        store.insert("/a.txt", "a");
        store.insert("/dir/b.txt", "b");
        let tree = Mutex::new(Node::root());
        let hydrator = Hydrator::new(4);

        hydrator
            .ensure_loaded(&tree, &store, Some(&remote()))
            .await
            .unwrap();

        assert!(hydrator.is_loaded());
        let root = tree.lock();
        assert_eq!(
            root.lookup("/m/p/a.txt").unwrap().content().unwrap(),
            "a"
        );
        assert!(root.lookup("/m/p/dir").unwrap().is_dir());
        assert_eq!(
            hydrator.report(),
            Some(HydrateReport {
                listed: 2,
                loaded: 2,
                failed: 0
            })
        );
    }

    #[tokio::test]
    async fn test_unmounted_is_noop() {
        let store = MemoryStore::new();
        let tree = Mutex::new(Node::root());
        let hydrator = Hydrator::new(4);

        hydrator.ensure_loaded(&tree, &store, None).await.unwrap();
        assert!(!hydrator.is_loaded());
        assert_eq!(store.list_calls(), 0);
    }

    #[tokio::test]
    async fn test_fetch_failure_is_skipped() {
        let store = MemoryStore::new();
        store.insert("/good.txt", "ok");
        store.insert("/bad.txt", "nope");
        store.fail_get("/bad.txt");
        let tree = Mutex::new(Node::root());
        let hydrator = Hydrator::new(2);

        hydrator
            .ensure_loaded(&tree, &store, Some(&remote()))
            .await
            .unwrap();

        assert!(hydrator.is_loaded());
        assert!(tree.lock().lookup("/m/p/good.txt").is_some());
        assert!(tree.lock().lookup("/m/p/bad.txt").is_none());
        assert_eq!(hydrator.report().unwrap().failed, 1);
    }

    #[tokio::test]
    async fn test_listing_failure_allows_retry() {
        let store = MemoryStore::new();
        store.insert("/a.txt", "a");
        store.fail_list(true);
        let tree = Mutex::new(Node::root());
        let hydrator = Hydrator::new(2);

        let err = hydrator
            .ensure_loaded(&tree, &store, Some(&remote()))
            .await
            .unwrap_err();
        assert!(matches!(err, VfsError::Remote(_)));
        assert!(!hydrator.is_loaded());

        store.fail_list(false);
        hydrator
            .ensure_loaded(&tree, &store, Some(&remote()))
            .await
            .unwrap();
        assert!(hydrator.is_loaded());
        assert_eq!(store.list_calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetches_respect_concurrency_limit() {
        let store = MemoryStore::new().with_latency(Duration::from_millis(10));
        for i in 0..30 {
            store.insert(&format!("/f{i}"), "x");
        }
        let tree = Mutex::new(Node::root());
        let hydrator = Hydrator::new(4);

        hydrator
            .ensure_loaded(&tree, &store, Some(&remote()))
            .await
            .unwrap();

        assert_eq!(hydrator.report().unwrap().loaded, 30);
        assert_eq!(store.peak_concurrent_gets(), 4);
    }

    /// Store whose listing is served verbatim, without path cleanup.
    struct RawListing(Vec<&'static str>);

    #[async_trait]
    impl RemoteStore for RawListing {
        async fn list(&self, _remote: &RemoteConfig) -> RemoteResult<Vec<RemoteFileInfo>> {
            Ok(self
                .0
                .iter()
                .map(|p| RemoteFileInfo {
                    path: p.to_string(),
                    size: 1,
                    content_type: "text/plain".into(),
                    modified_at: "2024-01-01T00:00:00Z".into(),
                })
                .collect())
        }

        async fn get(&self, _remote: &RemoteConfig, _path: &str) -> RemoteResult<Bytes> {
            Ok(Bytes::from_static(b"x"))
        }

        async fn put(
            &self,
            _remote: &RemoteConfig,
            _path: &str,
            _content: Bytes,
            _content_type: &str,
        ) -> RemoteResult<()> {
            Ok(())
        }

        async fn delete(&self, _remote: &RemoteConfig, _path: &str) -> RemoteResult<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_listed_paths_outside_mount_are_rejected() {
        let store = RawListing(vec!["/ok.txt", "../escape.txt", "/a/../../../etc/passwd", "/"]);
        let tree = Mutex::new(Node::root());
        let hydrator = Hydrator::new(2);

        hydrator
            .ensure_loaded(&tree, &store, Some(&remote()))
            .await
            .unwrap();

        let root = tree.lock();
        assert!(root.lookup("/m/p/ok.txt").unwrap().is_file());
        assert!(root.lookup("/m/escape.txt").is_none());
        assert!(root.lookup("/etc").is_none());
        assert!(root.lookup("/m/p").unwrap().is_dir());
        assert_eq!(
            hydrator.report(),
            Some(HydrateReport {
                listed: 4,
                loaded: 1,
                failed: 3
            })
        );
    }

    #[tokio::test]
    async fn test_loads_only_once() {
        let store = MemoryStore::new();
        store.insert("/a.txt", "a");
        let tree = Mutex::new(Node::root());
        let hydrator = Hydrator::new(2);

        for _ in 0..3 {
            hydrator
                .ensure_loaded(&tree, &store, Some(&remote()))
                .await
                .unwrap();
        }
        assert_eq!(store.list_calls(), 1);
    }
}
