//! Axum-based HTTP channel — serves the relay under `/api/`.
//!
//! `run()` drives the axum event loop; the [`CancellationToken`] passed in is
//! wired to axum's graceful shutdown.
//!
//! ## URL layout
//!
//! ```text
//! POST /api/generate   — { "prompt": "..." } → 200 + envelope, always
//! GET  /api/health
//! GET  /favicon.ico    → 204
//! ```

mod api;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::StatusCode,
    routing::{get, post},
};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::error::AppError;
use crate::relay::Relay;

/// Inbound JSON bodies up to this size are accepted.
const MAX_BODY_BYTES: usize = 50 * 1024 * 1024;

// ── Shared request state ──────────────────────────────────────────────────────

/// Axum router state injected into every handler via [`axum::extract::State`].
///
/// Cheap to clone — all fields are reference-counted.
#[derive(Clone)]
pub struct AppState {
    pub relay: Arc<Relay>,
}

impl AppState {
    pub fn new(relay: Relay) -> Self {
        Self { relay: Arc::new(relay) }
    }
}

// ── HttpChannel ───────────────────────────────────────────────────────────────

pub struct HttpChannel {
    listener: TcpListener,
    state: AppState,
}

impl HttpChannel {
    /// Bind `bind_addr` now so the caller learns about port conflicts before
    /// entering the run loop.
    pub async fn bind(bind_addr: &str, state: AppState) -> Result<Self, AppError> {
        let listener = TcpListener::bind(bind_addr)
            .await
            .map_err(|e| AppError::Server(format!("bind failed on {bind_addr}: {e}")))?;
        Ok(Self { listener, state })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, AppError> {
        self.listener
            .local_addr()
            .map_err(|e| AppError::Server(format!("no local address: {e}")))
    }

    /// Serve until `shutdown` is cancelled.
    pub async fn run(self, shutdown: CancellationToken) -> Result<(), AppError> {
        let addr = self.local_addr()?;
        let router = build_router(self.state);

        info!(%addr, "http channel listening");

        axum::serve(self.listener, router)
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await
            .map_err(|e| AppError::Server(format!("axum server error: {e}")))?;

        info!("http channel shut down");
        Ok(())
    }
}

// ── Router ────────────────────────────────────────────────────────────────────

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/generate", post(api::generate))
        .route("/api/health",   get(api::health))
        .route("/favicon.ico",  get(|| async { StatusCode::NO_CONTENT }))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
