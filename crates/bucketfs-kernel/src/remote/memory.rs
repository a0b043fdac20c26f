//! In-memory remote store.
//!
//! Used for tests and offline runs. Records every call and can be told to
//! fail specific operations.

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{SecondsFormat, Utc};
use parking_lot::{Mutex, RwLock};

use super::{RemoteError, RemoteFileInfo, RemoteResult, RemoteStore};
use crate::mount::RemoteConfig;
use crate::vfs::path;

/// A call observed by [`MemoryStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
    List,
    Get(String),
    Put(String, Bytes),
    Delete(String),
}

#[derive(Debug, Clone)]
struct StoredFile {
    content: Bytes,
    content_type: String,
    modified_at: String,
}

#[derive(Debug, Default)]
struct Failures {
    list: bool,
    get: HashSet<String>,
    put: HashSet<String>,
    delete: HashSet<String>,
}

/// Remote store that keeps everything in a map.
#[derive(Debug, Default)]
pub struct MemoryStore {
    files: RwLock<BTreeMap<String, StoredFile>>,
    failures: Mutex<Failures>,
    calls: Mutex<Vec<StoreCall>>,
    latency: Option<Duration>,
    gets_in_flight: AtomicUsize,
    peak_gets: AtomicUsize,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every call by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Seed a file directly, bypassing the call log.
    pub fn insert(&self, file_path: &str, content: impl Into<Bytes>) {
        let modified_at = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        self.files.write().insert(
            path::normalize(file_path),
            StoredFile {
                content: content.into(),
                content_type: crate::constants::DEFAULT_CONTENT_TYPE.to_string(),
                modified_at,
            },
        );
    }

    /// Current content of a file.
    pub fn file(&self, file_path: &str) -> Option<Bytes> {
        self.files
            .read()
            .get(&path::normalize(file_path))
            .map(|f| f.content.clone())
    }

    /// All stored paths, sorted.
    pub fn paths(&self) -> Vec<String> {
        self.files.read().keys().cloned().collect()
    }

    /// Every call made so far, in order.
    pub fn calls(&self) -> Vec<StoreCall> {
        self.calls.lock().clone()
    }

    /// Number of listing calls made so far.
    pub fn list_calls(&self) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|c| matches!(c, StoreCall::List))
            .count()
    }

    /// Only the mutating calls (put/delete), in order.
    pub fn writes(&self) -> Vec<StoreCall> {
        self.calls
            .lock()
            .iter()
            .filter(|c| matches!(c, StoreCall::Put(..) | StoreCall::Delete(_)))
            .cloned()
            .collect()
    }

    /// Highest number of `get` calls that were running at the same time.
    pub fn peak_concurrent_gets(&self) -> usize {
        self.peak_gets.load(Ordering::Acquire)
    }

    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    /// Make `list` fail.
    pub fn fail_list(&self, fail: bool) {
        self.failures.lock().list = fail;
    }

    /// Make `get` fail for one path.
    pub fn fail_get(&self, file_path: &str) {
        self.failures.lock().get.insert(path::normalize(file_path));
    }

    /// Make `put` fail for one path.
    pub fn fail_put(&self, file_path: &str) {
        self.failures.lock().put.insert(path::normalize(file_path));
    }

    /// Make `delete` fail for one path.
    pub fn fail_delete(&self, file_path: &str) {
        self.failures.lock().delete.insert(path::normalize(file_path));
    }

    /// Stop injecting failures.
    pub fn clear_failures(&self) {
        *self.failures.lock() = Failures::default();
    }

    async fn record(&self, call: StoreCall) {
        self.calls.lock().push(call);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }
}

#[async_trait]
impl RemoteStore for MemoryStore {
    async fn list(&self, _remote: &RemoteConfig) -> RemoteResult<Vec<RemoteFileInfo>> {
        self.record(StoreCall::List).await;
        if self.failures.lock().list {
            return Err(RemoteError::Status {
                status: 500,
                message: "injected list failure".into(),
            });
        }

        let files = self.files.read();
        Ok(files
            .iter()
            .map(|(file_path, file)| RemoteFileInfo {
                path: file_path.clone(),
                size: file.content.len() as u64,
                content_type: file.content_type.clone(),
                modified_at: file.modified_at.clone(),
            })
            .collect())
    }

    async fn get(&self, _remote: &RemoteConfig, file_path: &str) -> RemoteResult<Bytes> {
        let file_path = path::normalize(file_path);
        let running = self.gets_in_flight.fetch_add(1, Ordering::AcqRel) + 1;
        self.peak_gets.fetch_max(running, Ordering::AcqRel);
        self.record(StoreCall::Get(file_path.clone())).await;
        self.gets_in_flight.fetch_sub(1, Ordering::AcqRel);
        if self.failures.lock().get.contains(&file_path) {
            return Err(RemoteError::transport(format!(
                "injected get failure: {file_path}"
            )));
        }

        self.file(&file_path)
            .ok_or_else(|| RemoteError::not_found(file_path))
    }

    async fn put(
        &self,
        _remote: &RemoteConfig,
        file_path: &str,
        content: Bytes,
        content_type: &str,
    ) -> RemoteResult<()> {
        let file_path = path::normalize(file_path);
        self.record(StoreCall::Put(file_path.clone(), content.clone()))
            .await;
        if self.failures.lock().put.contains(&file_path) {
            return Err(RemoteError::transport(format!(
                "injected put failure: {file_path}"
            )));
        }

        let modified_at = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        self.files.write().insert(
            file_path,
            StoredFile {
                content,
                content_type: content_type.to_string(),
                modified_at,
            },
        );
        Ok(())
    }

    async fn delete(&self, _remote: &RemoteConfig, file_path: &str) -> RemoteResult<()> {
        let file_path = path::normalize(file_path);
        self.record(StoreCall::Delete(file_path.clone())).await;
        if self.failures.lock().delete.contains(&file_path) {
            return Err(RemoteError::transport(format!(
                "injected delete failure: {file_path}"
            )));
        }

        match self.files.write().remove(&file_path) {
            Some(_) => Ok(()),
            None => Err(RemoteError::not_found(file_path)),
        }
    }
}
