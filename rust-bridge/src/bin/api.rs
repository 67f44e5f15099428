//! Fila API - HTTP intake for the message bridge.
//!
//! This binary provides a thin web server that:
//! - Accepts messages on `POST /enviar`
//! - Publishes them persistently to the durable queue
//! - Answers liveness on `GET /`
//!
//! It attempts an initial broker session at startup but serves either way;
//! a failed startup connect is retried on first use through the session
//! manager.

use std::net::SocketAddr;

use anyhow::{Context, Result};
use axum::{
    routing::{get, post},
    Router,
};
use tokio::{net::TcpListener, signal};
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use fila::web::{liveness, send_message, AppState};
use fila::{Config, SessionManager, QUEUE_NAME};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize structured JSON logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().json().flatten_event(true))
        .init();

    info!("api_server_starting");

    // Load configuration
    let config = Config::from_env();
    info!(
        port = config.port,
        rabbitmq_host = %config.rabbitmq_host,
        rabbitmq_port = config.rabbitmq_port,
        queue = QUEUE_NAME,
        "config_loaded"
    );

    // Create the session manager and attempt the initial session. Failure is
    // not fatal: the server starts anyway and the first request reconnects.
    let manager = SessionManager::new(config.amqp_url(), QUEUE_NAME, config.retry_policy());

    let session = match manager.connect().await {
        Ok(session) => Some(session),
        Err(e) => {
            error!(error = %e, "startup_connect_failed");
            None
        }
    };

    // Create application state
    let state = AppState::new(config.clone(), manager, session);

    // Build the router
    let app = Router::new()
        .route("/", get(liveness))
        .route("/enviar", post(send_message))
        .layer(TraceLayer::new_for_http())
        .with_state(state.clone());

    // Bind to address
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    info!(address = %addr, "api_server_listening");

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    // Scoped release of the shared session
    if let Some(session) = state.session.lock().await.take() {
        state.manager.close(session).await;
    }

    info!("api_server_shutdown_complete");

    Ok(())
}

/// Create a future that completes when a shutdown signal is received.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT"),
        _ = terminate => info!("Received SIGTERM"),
    }

    info!("api_server_shutting_down");
}
