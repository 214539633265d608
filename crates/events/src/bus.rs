//! In-process event bus backed by a `tokio::sync::broadcast` channel.
//!
//! [`EventBus`] is the fan-out point for [`LogEvent`]s produced by running
//! jobs. It is shared via `Arc<EventBus>` between the orchestrator and the
//! real-time transport.
//!
//! Delivery is a live tail: at-most-once, no replay, no persistence. A
//! receiver created after an event was published never sees it, and a
//! receiver that falls more than the channel capacity behind observes
//! `RecvError::Lagged` instead of slowing the publisher down.

use chrono::Utc;
use mediarelay_core::types::{JobId, Severity, Timestamp};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

// ---------------------------------------------------------------------------
// LogEvent
// ---------------------------------------------------------------------------

/// Where a finished download can be fetched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadLink {
    pub title: String,
    pub filename: String,
    /// Server-relative URL, e.g. `/downloads/Clip.mp4`.
    pub download_url: String,
}

/// A typed, timestamped log record scoped to one job.
///
/// Serializes as `{jobId, type, message, timestamp}`, plus a `download`
/// object on the terminal event of a successful download. The job it
/// refers to may already be gone by the time an observer receives the
/// event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEvent {
    pub job_id: JobId,

    #[serde(rename = "type")]
    pub severity: Severity,

    /// Cleaned text, free of control characters.
    pub message: String,

    pub timestamp: Timestamp,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download: Option<DownloadLink>,

    /// Set on the last event of a job. Not part of the wire format.
    #[serde(skip)]
    pub terminal: bool,
}

impl LogEvent {
    /// Create a non-terminal event stamped with the current time.
    pub fn new(job_id: JobId, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            job_id,
            severity,
            message: message.into(),
            timestamp: Utc::now(),
            download: None,
            terminal: false,
        }
    }

    pub fn with_timestamp(mut self, timestamp: Timestamp) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn with_download(mut self, link: DownloadLink) -> Self {
        self.download = Some(link);
        self
    }

    /// Mark this event as the final one for its job.
    pub fn into_terminal(mut self) -> Self {
        self.terminal = true;
        self
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 1024;

/// In-process fan-out event bus.
///
/// # Usage
///
/// ```rust
/// use mediarelay_core::types::{JobId, Severity};
/// use mediarelay_events::{EventBus, LogEvent};
///
/// let bus = EventBus::default();
/// let mut rx = bus.subscribe();
///
/// bus.publish(LogEvent::new(JobId::generate(), Severity::Info, "hello"));
/// ```
pub struct EventBus {
    sender: broadcast::Sender<LogEvent>,
}

impl EventBus {
    /// Create a bus with a specific channel capacity.
    ///
    /// When the buffer is full, the oldest un-consumed messages are dropped
    /// and slow receivers will observe a `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all current subscribers. Never blocks.
    ///
    /// If there are no active subscribers the event is silently dropped.
    pub fn publish(&self, event: LogEvent) {
        // A send error only means there are zero receivers.
        let _ = self.sender.send(event);
    }

    /// Subscribe to every event published from now on.
    ///
    /// Dropping the receiver unsubscribes.
    pub fn subscribe(&self) -> broadcast::Receiver<LogEvent> {
        self.sender.subscribe()
    }

    /// Number of currently connected receivers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
