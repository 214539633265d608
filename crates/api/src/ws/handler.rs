use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};

use crate::state::AppState;
use crate::ws::manager::WsManager;

/// HTTP handler that upgrades the connection to a live event observer.
///
/// Observers are receive-only: every job event is pushed to every
/// connection, and inbound data frames are ignored.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| serve_observer(socket, state.ws_manager))
}

/// Pump queued events into the socket until either side closes.
async fn serve_observer(socket: WebSocket, ws_manager: Arc<WsManager>) {
    let conn_id = uuid::Uuid::new_v4().to_string();
    let mut outbound = ws_manager.add(conn_id.clone()).await;
    let observers = ws_manager.connection_count().await;
    tracing::info!(
        conn_id = %conn_id,
        observers = observers,
        "Observer connected"
    );

    let (mut sink, mut inbound) = socket.split();

    let reason = loop {
        tokio::select! {
            queued = outbound.recv() => {
                let Some(msg) = queued else {
                    break "dropped by server";
                };
                let closing = matches!(msg, Message::Close(_));
                if let Err(e) = sink.send(msg).await {
                    tracing::debug!(conn_id = %conn_id, error = %e, "WebSocket send failed");
                    break "send failed";
                }
                if closing {
                    break "server shutdown";
                }
            }
            frame = inbound.next() => match frame {
                None | Some(Ok(Message::Close(_))) => break "peer closed",
                Some(Ok(Message::Pong(_))) => {
                    tracing::trace!(conn_id = %conn_id, "Pong received");
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::debug!(conn_id = %conn_id, error = %e, "WebSocket receive error");
                    break "receive error";
                }
            },
        }
    };

    let connected_secs = ws_manager
        .remove(&conn_id)
        .await
        .map(|conn| (chrono::Utc::now() - conn.connected_at).num_seconds());
    tracing::info!(conn_id = %conn_id, reason, ?connected_secs, "Observer disconnected");
}
