//! WebSocket infrastructure for the live event tail.
//!
//! Provides connection management, heartbeat pings, and the HTTP upgrade
//! handler mounted at `/ws`.

mod handler;
mod heartbeat;
pub mod manager;

pub use handler::ws_handler;
pub use heartbeat::{start_heartbeat, HEARTBEAT_INTERVAL};
pub use manager::WsManager;
