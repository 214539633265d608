use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mediarelay_api::config::ServerConfig;
use mediarelay_api::forwarder::EventForwarder;
use mediarelay_api::router::build_app_router;
use mediarelay_api::state::AppState;
use mediarelay_api::ws;

/// How long the forwarder gets to flush pending events at shutdown.
const FORWARDER_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "mediarelay_api=debug,mediarelay_worker=debug,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env().expect("Invalid server configuration");
    tracing::info!(
        host = %config.host,
        port = %config.port,
        tool = %config.tool.program(),
        download_dir = %config.download_dir.display(),
        "Loaded server configuration"
    );

    // --- Directories ---
    for dir in [&config.download_dir, &config.public_dir] {
        tokio::fs::create_dir_all(dir)
            .await
            .unwrap_or_else(|e| panic!("Failed to create {}: {e}", dir.display()));
    }

    // --- App state (event bus, orchestrator, WebSocket manager) ---
    let state = AppState::new(config.clone());
    let orchestrator = Arc::clone(&state.orchestrator);
    let ws_manager = Arc::clone(&state.ws_manager);
    let event_bus = Arc::clone(&state.event_bus);

    // --- Heartbeat ---
    let heartbeat_cancel = CancellationToken::new();
    let heartbeat_handle = ws::start_heartbeat(
        Arc::clone(&ws_manager),
        ws::HEARTBEAT_INTERVAL,
        heartbeat_cancel.clone(),
    );

    // --- Event forwarder (job events -> WebSocket observers) ---
    let forwarder_cancel = CancellationToken::new();
    let forwarder_handle = tokio::spawn(
        EventForwarder::new(Arc::clone(&ws_manager))
            .run(event_bus.subscribe(), forwarder_cancel.clone()),
    );

    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    // Jobs and observers are torn down before axum waits for open
    // connections, otherwise live WebSockets would hold the server open.
    let shutdown_timeout = config.shutdown_timeout();
    let shutdown = {
        let ws_manager = Arc::clone(&ws_manager);
        async move {
            shutdown_signal().await;

            let settled = orchestrator.shutdown(shutdown_timeout).await;
            tracing::info!(settled, "Jobs stopped");

            forwarder_cancel.cancel();
            if tokio::time::timeout(FORWARDER_DRAIN_TIMEOUT, forwarder_handle)
                .await
                .is_err()
            {
                tracing::warn!("Event forwarder did not drain in time");
            }

            ws_manager.shutdown_all().await;
        }
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    heartbeat_cancel.cancel();
    let _ = heartbeat_handle.await;

    // Release the event channel last.
    drop(event_bus);

    tracing::info!("Graceful shutdown complete");
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
