//! Asynchronous, coalesced write-back to the remote bucket.
//!
//! ```text
//!   MemFs mutation ──enqueue──▶ pending (path → newest op)
//!                                   │  debounce timer, reset on every enqueue
//!                                   ▼
//!                                flush ──sequential──▶ RemoteStore
//!                                   │
//!                 failure ──────────┴──▶ requeue (bounded) or dead letter
//! ```
//!
//! Only the most recent operation per remote path is kept, so a burst of
//! writes to one file becomes a single upload. The queue holds at most
//! `max_queue` paths; beyond that the oldest entries are evicted and
//! recorded as dead letters.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use bytes::Bytes;
use indexmap::IndexMap;
use parking_lot::Mutex;
use tokio::task::JoinHandle;

use crate::constants::{
    DEFAULT_CONTENT_TYPE, DRAIN_POLL_INTERVAL, MAX_PENDING_OPS, MAX_WRITEBACK_ATTEMPTS,
    WRITEBACK_DEBOUNCE,
};
use crate::mount::RemoteConfig;
use crate::remote::{RemoteError, RemoteResult, RemoteStore};

/// What to do with a remote path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpKind {
    Put(Bytes),
    Delete,
}

/// A queued remote mutation.
#[derive(Debug, Clone)]
pub struct PendingOperation {
    /// Remote path (mount prefix already stripped).
    pub path: String,
    pub kind: OpKind,
    pub enqueued_at: Instant,
    /// Failed executions so far.
    pub attempts: u32,
}

impl PendingOperation {
    pub fn put(path: impl Into<String>, content: Bytes) -> Self {
        Self::new(path, OpKind::Put(content))
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(path, OpKind::Delete)
    }

    fn new(path: impl Into<String>, kind: OpKind) -> Self {
        Self {
            path: path.into(),
            kind,
            enqueued_at: Instant::now(),
            attempts: 0,
        }
    }

    pub fn is_delete(&self) -> bool {
        matches!(self.kind, OpKind::Delete)
    }
}

/// Why an operation was given up on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeadLetterReason {
    /// Pushed out by the queue cap before it ran.
    Evicted,
    /// Failed on every attempt; carries the last error.
    Failed(String),
}

/// An operation that will never reach the remote store.
#[derive(Debug, Clone)]
pub struct DeadLetter {
    pub op: PendingOperation,
    pub reason: DeadLetterReason,
}

/// Counters for one flush (or a whole drain).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushReport {
    /// Operations that reached the remote store.
    pub executed: usize,
    /// Operations with nothing to send (empty uploads).
    pub skipped: usize,
    /// Operations that failed this round.
    pub failed: usize,
    /// Failed operations put back for another attempt.
    pub retried: usize,
}

impl FlushReport {
    fn merge(&mut self, other: FlushReport) {
        self.executed += other.executed;
        self.skipped += other.skipped;
        self.failed += other.failed;
        self.retried += other.retried;
    }
}

/// Queue tunables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteBackSettings {
    pub debounce: Duration,
    pub max_queue: usize,
    pub max_attempts: u32,
}

impl Default for WriteBackSettings {
    fn default() -> Self {
        Self {
            debounce: WRITEBACK_DEBOUNCE,
            max_queue: MAX_PENDING_OPS,
            max_attempts: MAX_WRITEBACK_ATTEMPTS,
        }
    }
}

struct QueueInner {
    pending: Mutex<IndexMap<String, PendingOperation>>,
    flushing: AtomicBool,
    timer: Mutex<Option<JoinHandle<()>>>,
    dead: Mutex<Vec<DeadLetter>>,
    store: Arc<dyn RemoteStore>,
    remote: RemoteConfig,
    settings: WriteBackSettings,
}

/// Debounced per-path write-back queue. Cheap to clone.
#[derive(Clone)]
pub struct WriteBackQueue {
    inner: Arc<QueueInner>,
}

impl std::fmt::Debug for WriteBackQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WriteBackQueue")
            .field("store_id", &self.inner.remote.store_id)
            .field("pending", &self.len())
            .field("flushing", &self.is_flushing())
            .field("settings", &self.inner.settings)
            .finish_non_exhaustive()
    }
}

/// Clears the flushing flag even if the flush future is dropped midway.
struct FlushGuard<'a>(&'a AtomicBool);

impl Drop for FlushGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl WriteBackQueue {
    pub fn new(
        store: Arc<dyn RemoteStore>,
        remote: RemoteConfig,
        settings: WriteBackSettings,
    ) -> Self {
        Self {
            inner: Arc::new(QueueInner {
                pending: Mutex::new(IndexMap::new()),
                flushing: AtomicBool::new(false),
                timer: Mutex::new(None),
                dead: Mutex::new(Vec::new()),
                store,
                remote,
                settings,
            }),
        }
    }

    pub fn settings(&self) -> WriteBackSettings {
        self.inner.settings
    }

    /// Queue an operation, superseding any older one for the same path, and
    /// restart the debounce timer.
    pub fn enqueue(&self, op: PendingOperation) {
        {
            let mut pending = self.inner.pending.lock();
            if pending.shift_remove(&op.path).is_some() {
                tracing::trace!(path = %op.path, "superseded pending write-back");
            }
            tracing::debug!(path = %op.path, delete = op.is_delete(), "queued write-back");
            pending.insert(op.path.clone(), op);
            self.evict_overflow(&mut pending);
        }
        self.schedule(self.inner.settings.debounce);
    }

    pub fn put(&self, path: impl Into<String>, content: Bytes) {
        self.enqueue(PendingOperation::put(path, content));
    }

    pub fn delete(&self, path: impl Into<String>) {
        self.enqueue(PendingOperation::delete(path));
    }

    /// Run every queued operation once.
    ///
    /// Returns `None` without doing anything if another flush is running.
    pub async fn flush(&self) -> Option<FlushReport> {
        let inner = &self.inner;
        if inner
            .flushing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::trace!("flush already in progress");
            return None;
        }
        let guard = FlushGuard(&inner.flushing);

        let batch = std::mem::take(&mut *inner.pending.lock());
        if batch.is_empty() {
            return Some(FlushReport::default());
        }
        tracing::debug!(ops = batch.len(), "flushing write-back queue");

        let mut report = FlushReport::default();
        let mut failures = Vec::new();
        for op in batch.into_values() {
            match self.execute(&op).await {
                Ok(true) => report.executed += 1,
                Ok(false) => report.skipped += 1,
                Err(e) => {
                    tracing::warn!(path = %op.path, attempt = op.attempts + 1, error = %e, "write-back failed");
                    report.failed += 1;
                    failures.push((op, e));
                }
            }
        }

        let arrived = {
            let mut pending = inner.pending.lock();
            let arrived = !pending.is_empty();
            // Retries are older than anything that arrived mid-flush, so they
            // go back at the front and are the first to be evicted.
            let mut front = 0;
            for (mut op, error) in failures {
                op.attempts += 1;
                if pending.contains_key(&op.path) {
                    tracing::debug!(path = %op.path, "failed write-back superseded by newer op");
                } else if op.attempts >= inner.settings.max_attempts {
                    tracing::error!(path = %op.path, attempts = op.attempts, error = %error, "giving up on write-back");
                    inner.dead.lock().push(DeadLetter {
                        op,
                        reason: DeadLetterReason::Failed(error.to_string()),
                    });
                } else {
                    report.retried += 1;
                    pending.shift_insert(front, op.path.clone(), op);
                    front += 1;
                }
            }
            self.evict_overflow(&mut pending);
            arrived
        };

        drop(guard);
        if arrived {
            self.schedule(Duration::ZERO);
        } else if !self.is_empty() {
            self.schedule(inner.settings.debounce);
        }

        tracing::debug!(
            executed = report.executed,
            skipped = report.skipped,
            failed = report.failed,
            retried = report.retried,
            "write-back flush complete"
        );
        Some(report)
    }

    /// Flush until nothing is pending, ignoring the debounce timer.
    ///
    /// Retries run back to back, so this settles once every operation has
    /// either succeeded or been dead-lettered.
    pub async fn drain(&self) -> FlushReport {
        let mut total = FlushReport::default();
        loop {
            self.cancel_timer();
            match self.flush().await {
                Some(report) => total.merge(report),
                None => tokio::time::sleep(DRAIN_POLL_INTERVAL).await,
            }
            if self.is_empty() && !self.is_flushing() {
                break;
            }
        }
        self.cancel_timer();
        total
    }

    /// Snapshot of queued operations, oldest first.
    pub fn pending(&self) -> Vec<PendingOperation> {
        self.inner.pending.lock().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.inner.pending.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.pending.lock().is_empty()
    }

    pub fn is_flushing(&self) -> bool {
        self.inner.flushing.load(Ordering::Acquire)
    }

    pub fn dead_letters(&self) -> Vec<DeadLetter> {
        self.inner.dead.lock().clone()
    }

    /// Remove and return the dead letters.
    pub fn take_dead_letters(&self) -> Vec<DeadLetter> {
        std::mem::take(&mut *self.inner.dead.lock())
    }

    async fn execute(&self, op: &PendingOperation) -> RemoteResult<bool> {
        let inner = &self.inner;
        match &op.kind {
            OpKind::Put(content) if content.is_empty() => {
                tracing::trace!(path = %op.path, "skipping empty upload");
                Ok(false)
            }
            OpKind::Put(content) => {
                inner
                    .store
                    .put(&inner.remote, &op.path, content.clone(), DEFAULT_CONTENT_TYPE)
                    .await?;
                Ok(true)
            }
            OpKind::Delete => match inner.store.delete(&inner.remote, &op.path).await {
                Ok(()) => Ok(true),
                Err(RemoteError::NotFound(_)) => {
                    tracing::debug!(path = %op.path, "remote file already gone");
                    Ok(true)
                }
                Err(e) => Err(e),
            },
        }
    }

    fn evict_overflow(&self, pending: &mut IndexMap<String, PendingOperation>) {
        let max = self.inner.settings.max_queue;
        while pending.len() > max {
            let Some((path, op)) = pending.shift_remove_index(0) else {
                break;
            };
            tracing::warn!(path = %path, max_queue = max, "write-back queue full, evicting oldest op");
            self.inner.dead.lock().push(DeadLetter {
                op,
                reason: DeadLetterReason::Evicted,
            });
        }
    }

    /// (Re)arm the flush timer. The flush runs in its own task, so a later
    /// reschedule never cancels a flush that already started.
    fn schedule(&self, delay: Duration) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::trace!("no runtime, write-back waits for an explicit flush");
            return;
        };

        let mut timer = self.inner.timer.lock();
        if let Some(previous) = timer.take() {
            previous.abort();
        }
        let queue = self.clone();
        *timer = Some(runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            tokio::spawn(async move {
                queue.flush().await;
            });
        }));
    }

    fn cancel_timer(&self) {
        let timer = self.inner.timer.lock().take();
        if let Some(timer) = timer {
            timer.abort();
        }
    }
}
