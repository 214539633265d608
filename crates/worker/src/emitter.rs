//! Per-job event publisher.

use std::sync::Arc;

use chrono::Utc;
use mediarelay_core::types::{JobId, Severity, Timestamp};
use mediarelay_events::{DownloadLink, EventBus, LogEvent};

/// Publishes the events of a single job.
///
/// Timestamps never go backwards within a job, and [`JobEmitter::finish`]
/// consumes the emitter so nothing can be published after the terminal
/// event.
pub(crate) struct JobEmitter {
    job_id: JobId,
    bus: Arc<EventBus>,
    last: Option<Timestamp>,
}

impl JobEmitter {
    pub(crate) fn new(job_id: JobId, bus: Arc<EventBus>) -> Self {
        Self {
            job_id,
            bus,
            last: None,
        }
    }

    pub(crate) fn emit(&mut self, severity: Severity, message: impl Into<String>) {
        let event = self.event(severity, message.into());
        self.bus.publish(event);
    }

    /// Publish the terminal event, carrying `download` when the job
    /// produced a file.
    pub(crate) fn finish(
        mut self,
        severity: Severity,
        message: impl Into<String>,
        download: Option<DownloadLink>,
    ) {
        let mut event = self.event(severity, message.into()).into_terminal();
        if let Some(link) = download {
            event = event.with_download(link);
        }
        self.bus.publish(event);
    }

    fn event(&mut self, severity: Severity, message: String) -> LogEvent {
        LogEvent::new(self.job_id.clone(), severity, message).with_timestamp(self.stamp())
    }

    fn stamp(&mut self) -> Timestamp {
        let now = Utc::now();
        let stamp = match self.last {
            Some(last) if last > now => last,
            _ => now,
        };
        self.last = Some(stamp);
        stamp
    }
}
