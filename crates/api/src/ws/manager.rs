use std::collections::HashMap;

use axum::body::Bytes;
use axum::extract::ws::Message;
use mediarelay_core::types::Timestamp;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, RwLock};

/// Outbound messages buffered per connection before events are skipped
/// for that observer.
pub const OUTBOUND_QUEUE_CAPACITY: usize = 256;

/// Channel sender half for pushing messages to a WebSocket connection.
pub type WsSender = mpsc::Sender<Message>;

/// Metadata for a single WebSocket connection.
pub struct WsConnection {
    /// Channel sender for outbound messages to this connection.
    pub sender: WsSender,
    /// When this connection was established.
    pub connected_at: Timestamp,
}

/// Manages all active WebSocket connections.
///
/// Thread-safe via interior `RwLock`; designed to be wrapped in `Arc` and
/// shared across the application. Sends never block: a connection whose
/// queue is full simply misses the message.
pub struct WsManager {
    connections: RwLock<HashMap<String, WsConnection>>,
    capacity: usize,
}

impl WsManager {
    /// Create a new, empty connection manager.
    pub fn new() -> Self {
        Self::with_capacity(OUTBOUND_QUEUE_CAPACITY)
    }

    /// Create a manager with a custom per-connection queue size.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
            capacity: capacity.max(1),
        }
    }

    /// Register a new connection.
    ///
    /// Returns the receiver half of the message channel so the caller can
    /// forward messages to the WebSocket sink.
    pub async fn add(&self, conn_id: String) -> mpsc::Receiver<Message> {
        let (tx, rx) = mpsc::channel(self.capacity);
        let conn = WsConnection {
            sender: tx,
            connected_at: chrono::Utc::now(),
        };
        self.connections.write().await.insert(conn_id, conn);
        rx
    }

    /// Remove a connection by its ID, returning it if it was still
    /// registered. `shutdown_all` may already have removed it.
    pub async fn remove(&self, conn_id: &str) -> Option<WsConnection> {
        self.connections.write().await.remove(conn_id)
    }

    /// Broadcast a message to all connected clients.
    ///
    /// Returns the number of connections the message was queued for.
    /// Full or closed queues are skipped.
    pub async fn broadcast(&self, message: Message) -> usize {
        let conns = self.connections.read().await;
        let mut delivered = 0;
        for (conn_id, conn) in conns.iter() {
            match conn.sender.try_send(message.clone()) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    tracing::debug!(conn_id = %conn_id, "Outbound queue full, skipping message");
                }
                Err(TrySendError::Closed(_)) => {}
            }
        }
        delivered
    }

    /// Return the current number of active connections.
    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }

    /// Send a Close frame to every connection, then clear the map.
    ///
    /// Used during graceful shutdown, after pending events have been
    /// forwarded.
    pub async fn shutdown_all(&self) {
        let mut conns = self.connections.write().await;
        let count = conns.len();
        for conn in conns.values() {
            let _ = conn.sender.try_send(Message::Close(None));
        }
        conns.clear();
        tracing::info!(count, "Closed all WebSocket connections");
    }

    /// Send a Ping frame to every connected client.
    pub async fn ping_all(&self) {
        let conns = self.connections.read().await;
        for conn in conns.values() {
            let _ = conn.sender.try_send(Message::Ping(Bytes::new()));
        }
    }
}

impl Default for WsManager {
    fn default() -> Self {
        Self::new()
    }
}
