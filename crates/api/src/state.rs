use std::sync::Arc;

use mediarelay_events::EventBus;
use mediarelay_worker::Orchestrator;

use crate::config::ServerConfig;
use crate::ws::WsManager;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable; everything inside is behind an `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    /// Starts, lists and cancels jobs.
    pub orchestrator: Arc<Orchestrator>,
    /// WebSocket connection manager (live event observers).
    pub ws_manager: Arc<WsManager>,
    /// Job events, shared with the orchestrator.
    pub event_bus: Arc<EventBus>,
}

impl AppState {
    /// Wire up a fresh orchestrator and connection manager for `config`.
    pub fn new(config: ServerConfig) -> Self {
        let event_bus = Arc::new(EventBus::default());
        let orchestrator = Arc::new(Orchestrator::new(
            config.orchestrator_config(),
            Arc::clone(&event_bus),
        ));

        Self {
            config: Arc::new(config),
            orchestrator,
            ws_manager: Arc::new(WsManager::new()),
            event_bus,
        }
    }
}
