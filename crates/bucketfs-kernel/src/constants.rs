//! Kernel tuning constants.
//!
//! Centralizes the default values behind [`FsConfig`](crate::FsConfig).

use std::time::Duration;

/// First-segment marker that identifies a capability path.
pub const CAPABILITY_MARKER: &str = "mtbucket";

/// Separator between the marker and the base64 payload.
pub const CAPABILITY_SEPARATOR: &str = "::";

/// Delay between the last enqueued write-back operation and the flush.
pub const WRITEBACK_DEBOUNCE: Duration = Duration::from_millis(1000);

/// Quiet period before buffered change events are delivered as one batch.
pub const EVENT_QUIESCENCE: Duration = Duration::from_millis(5);

/// Maximum number of concurrent content fetches during hydration.
pub const HYDRATE_CONCURRENCY: usize = 20;

/// Maximum number of distinct paths waiting in the write-back queue.
pub const MAX_PENDING_OPS: usize = 100;

/// Attempts per write-back operation before it is dead-lettered.
pub const MAX_WRITEBACK_ATTEMPTS: u32 = 3;

/// Per-request timeout for remote store calls.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Content type sent with every upload.
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// How long `drain` waits when another flush is already running.
pub const DRAIN_POLL_INTERVAL: Duration = Duration::from_millis(10);
