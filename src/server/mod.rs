//! HTTP server hosting the voice WebSocket and a status endpoint

pub mod events;
pub mod ws;

use crate::config::Config;
use crate::providers::Providers;
use crate::session::SessionRegistry;
use anyhow::{Context, Result};
use axum::extract::State;
use axum::http::HeaderValue;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// Shared server state
#[derive(Clone)]
pub struct ServerState {
    pub config: Arc<Config>,
    pub providers: Arc<Providers>,
    pub registry: Arc<SessionRegistry>,
    pub started_at: Instant,
}

/// Start the voice server and block until shutdown.
pub async fn start(config: Config) -> Result<()> {
    let providers = Arc::new(Providers::from_config(&config)?);
    let registry = Arc::new(SessionRegistry::new());
    let state = ServerState {
        config: Arc::new(config),
        providers,
        registry: registry.clone(),
        started_at: Instant::now(),
    };

    let cors = cors_layer(&state.config.server.allowed_origins)?;
    let app = Router::new()
        .route("/ws/voice", get(ws::voice_ws_handler))
        .route("/api/status", get(status_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state.clone());

    let addr: SocketAddr = format!(
        "{}:{}",
        state.config.server.host, state.config.server.port
    )
    .parse()
    .context("Invalid listen address")?;

    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("     Voiceline Server Starting");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!();
    println!("✓ Voice WebSocket: ws://{}/ws/voice", addr);
    println!("✓ Status:          http://{}/api/status", addr);
    println!();
    println!("🚀 Listening on {}", addr);
    println!();

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(registry))
        .await
        .context("Server error")?;

    Ok(())
}

/// Allow any origin when none are configured, otherwise only the listed ones.
fn cors_layer(origins: &[String]) -> Result<CorsLayer> {
    if origins.is_empty() {
        return Ok(CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any));
    }
    let mut allowed = Vec::with_capacity(origins.len());
    for origin in origins {
        allowed.push(
            origin
                .parse::<HeaderValue>()
                .with_context(|| format!("Invalid allowed origin '{origin}'"))?,
        );
    }
    Ok(CorsLayer::new()
        .allow_origin(allowed)
        .allow_methods(Any)
        .allow_headers(Any))
}

async fn shutdown_signal(registry: Arc<SessionRegistry>) {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            info!("shutdown signal received");
            registry.terminate_all().await;
        }
        Err(err) => {
            warn!("failed to listen for shutdown signal: {err}");
            std::future::pending::<()>().await;
        }
    }
}

async fn status_handler(State(state): State<ServerState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "activeSessions": state.registry.active_count().await,
        "uptimeSecs": state.started_at.elapsed().as_secs(),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
