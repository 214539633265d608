//! Event-to-WebSocket forwarding.
//!
//! [`EventForwarder`] subscribes to the job event bus and pushes every
//! [`LogEvent`] to all connected observers as a JSON text frame.

use std::sync::Arc;

use axum::extract::ws::Message;
use mediarelay_events::LogEvent;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio_util::sync::CancellationToken;

use crate::ws::WsManager;

pub struct EventForwarder {
    ws_manager: Arc<WsManager>,
}

impl EventForwarder {
    pub fn new(ws_manager: Arc<WsManager>) -> Self {
        Self { ws_manager }
    }

    /// Run the forwarding loop.
    ///
    /// Exits when the bus closes, or when `cancel` fires, after forwarding
    /// whatever is already buffered in `receiver`.
    pub async fn run(self, mut receiver: broadcast::Receiver<LogEvent>, cancel: CancellationToken) {
        loop {
            tokio::select! {
                result = receiver.recv() => match result {
                    Ok(event) => self.forward(&event).await,
                    Err(RecvError::Lagged(n)) => {
                        tracing::warn!(skipped = n, "Event forwarder lagged");
                    }
                    Err(RecvError::Closed) => {
                        tracing::info!("Event bus closed, forwarder shutting down");
                        return;
                    }
                },
                _ = cancel.cancelled() => break,
            }
        }

        self.drain(&mut receiver).await;
        tracing::info!("Event forwarder stopped");
    }

    async fn drain(&self, receiver: &mut broadcast::Receiver<LogEvent>) {
        loop {
            match receiver.try_recv() {
                Ok(event) => self.forward(&event).await,
                Err(TryRecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "Event forwarder lagged while draining");
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
            }
        }
    }

    async fn forward(&self, event: &LogEvent) {
        let json = match serde_json::to_string(event) {
            Ok(json) => json,
            Err(e) => {
                tracing::error!(job_id = %event.job_id, error = %e, "Failed to serialize event");
                return;
            }
        };
        self.ws_manager.broadcast(Message::Text(json.into())).await;
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use mediarelay_core::types::Severity;
    use mediarelay_events::EventBus;

    use super::*;

    #[tokio::test]
    async fn forwards_events_as_json_text() {
        let bus = EventBus::default();
        let manager = Arc::new(WsManager::new());
        let mut rx = manager.add("c1".to_string()).await;
        let cancel = CancellationToken::new();

        let handle = tokio::spawn(
            EventForwarder::new(Arc::clone(&manager)).run(bus.subscribe(), cancel.clone()),
        );

        bus.publish(LogEvent::new("job-1".into(), Severity::Progress, "[download] 1%"));

        let msg = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("message within timeout")
            .expect("channel open");
        let Message::Text(text) = msg else {
            panic!("expected a text frame");
        };
        let json: serde_json::Value = serde_json::from_str(text.as_str()).unwrap();
        assert_eq!(json["jobId"], "job-1");
        assert_eq!(json["type"], "progress");

        cancel.cancel();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn cancellation_drains_buffered_events() {
        let bus = EventBus::default();
        let manager = Arc::new(WsManager::new());
        let mut rx = manager.add("c1".to_string()).await;
        let receiver = bus.subscribe();

        for i in 0..3 {
            bus.publish(LogEvent::new("j".into(), Severity::Info, format!("line {i}")));
        }

        let cancel = CancellationToken::new();
        cancel.cancel();
        EventForwarder::new(Arc::clone(&manager))
            .run(receiver, cancel)
            .await;

        let mut received = 0;
        while rx.try_recv().is_ok() {
            received += 1;
        }
        assert_eq!(received, 3);
    }

    #[tokio::test]
    async fn stops_when_bus_closes() {
        let bus = EventBus::default();
        let receiver = bus.subscribe();
        drop(bus);

        let manager = Arc::new(WsManager::new());
        tokio::time::timeout(
            Duration::from_secs(5),
            EventForwarder::new(manager).run(receiver, CancellationToken::new()),
        )
        .await
        .expect("forwarder exits on closed bus");
    }
}
