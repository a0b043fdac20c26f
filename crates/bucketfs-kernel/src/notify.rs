//! Batched change notifications.
//!
//! Mutations call [`EventNotifier::fire_soon`], which buffers the events and
//! re-arms a short quiescence timer. When the timer expires without further
//! events, the whole buffer is delivered to subscribers as one batch. A burst
//! of mutations therefore collapses into a single notification.
//!
//! Each subscriber has its own unbounded queue, so a slow subscriber never
//! loses batches; it only falls behind.
//!
//! # Example
//!
//! ```ignore
//! let mut sub = fs.subscribe();
//! fs.write_all("/p/a.txt", Bytes::from("hi")).await?;
//! let batch = sub.recv().await.unwrap();
//! assert_eq!(batch[0].kind, ChangeKind::Created);
//! ```

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// What happened to a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChangeKind {
    Created,
    Changed,
    Deleted,
}

/// A single change notification.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    pub path: String,
}

impl ChangeEvent {
    pub fn created(path: impl Into<String>) -> Self {
        Self {
            kind: ChangeKind::Created,
            path: path.into(),
        }
    }

    pub fn changed(path: impl Into<String>) -> Self {
        Self {
            kind: ChangeKind::Changed,
            path: path.into(),
        }
    }

    pub fn deleted(path: impl Into<String>) -> Self {
        Self {
            kind: ChangeKind::Deleted,
            path: path.into(),
        }
    }
}

struct NotifierInner {
    buffer: Mutex<Vec<ChangeEvent>>,
    timer: Mutex<Option<JoinHandle<()>>>,
    subscribers: Mutex<Vec<mpsc::UnboundedSender<Vec<ChangeEvent>>>>,
    quiescence: Duration,
}

/// Debounced broadcaster of change-event batches.
#[derive(Clone)]
pub struct EventNotifier {
    inner: Arc<NotifierInner>,
}

impl std::fmt::Debug for EventNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventNotifier")
            .field("quiescence", &self.inner.quiescence)
            .field("buffered", &self.inner.buffer.lock().len())
            .finish_non_exhaustive()
    }
}

impl EventNotifier {
    pub fn new(quiescence: Duration) -> Self {
        Self {
            inner: Arc::new(NotifierInner {
                buffer: Mutex::new(Vec::new()),
                timer: Mutex::new(None),
                subscribers: Mutex::new(Vec::new()),
                quiescence,
            }),
        }
    }

    /// Buffer events and re-arm the delivery timer.
    ///
    /// Outside a tokio runtime there is no timer to arm, so the buffer is
    /// delivered immediately.
    pub fn fire_soon(&self, events: impl IntoIterator<Item = ChangeEvent>) {
        self.inner.buffer.lock().extend(events);

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            self.flush_now();
            return;
        };

        let mut timer = self.inner.timer.lock();
        if let Some(pending) = timer.take() {
            pending.abort();
        }
        let notifier = self.clone();
        let quiescence = self.inner.quiescence;
        *timer = Some(runtime.spawn(async move {
            tokio::time::sleep(quiescence).await;
            notifier.flush_now();
        }));
    }

    /// Deliver everything buffered as one batch. Returns the batch size.
    pub fn flush_now(&self) -> usize {
        let batch = std::mem::take(&mut *self.inner.buffer.lock());
        if batch.is_empty() {
            return 0;
        }
        let count = batch.len();
        let mut subscribers = self.inner.subscribers.lock();
        // A failed send means the subscription was dropped.
        subscribers.retain(|tx| tx.send(batch.clone()).is_ok());
        tracing::trace!(events = count, receivers = subscribers.len(), "delivered change batch");
        count
    }

    /// Number of events waiting for the timer.
    pub fn buffered(&self) -> usize {
        self.inner.buffer.lock().len()
    }

    /// Subscribe to change batches.
    pub fn subscribe(&self) -> ChangeSubscription {
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner.subscribers.lock().push(tx);
        ChangeSubscription { rx }
    }

    /// Get the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        let mut subscribers = self.inner.subscribers.lock();
        subscribers.retain(|tx| !tx.is_closed());
        subscribers.len()
    }
}

/// Receiver of change batches.
pub struct ChangeSubscription {
    rx: mpsc::UnboundedReceiver<Vec<ChangeEvent>>,
}

impl ChangeSubscription {
    /// Receive the next batch, waiting if necessary.
    ///
    /// Returns None once the notifier is gone and every batch was read.
    pub async fn recv(&mut self) -> Option<Vec<ChangeEvent>> {
        self.rx.recv().await
    }

    /// Try to receive the next batch without blocking.
    pub fn try_recv(&mut self) -> Option<Vec<ChangeEvent>> {
        match self.rx.try_recv() {
            Ok(batch) => Some(batch),
            Err(mpsc::error::TryRecvError::Empty) => None,
            Err(mpsc::error::TryRecvError::Disconnected) => {
                tracing::trace!("change notifier dropped");
                None
            }
        }
    }

    /// Batches delivered but not yet received.
    pub fn backlog(&self) -> usize {
        self.rx.len()
    }
}

impl std::fmt::Debug for ChangeSubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeSubscription").finish_non_exhaustive()
    }
}
