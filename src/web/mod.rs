//! Browser triage UI.
//!
//! ```text
//! GET  /                  new session, upload form
//! POST /upload            multipart `files` + `sid` → table + totals
//! POST /categorize/:id    form `category` + `sid`  → table + totals
//! GET  /report?sid=…      categorised report with savings
//! GET  /health            "ok"
//! ```
//!
//! Pipeline errors are rendered as a banner on the upload page with status
//! 200; only template failures and unreadable request bodies produce error
//! statuses.

mod handlers;
mod templates;

use crate::config::{ServerConfig, TrackerConfig};
use crate::error::SubTrackError;
use crate::pipeline::llm::{CompletionClient, OpenRouterClient};
use crate::session::SessionStore;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tracing::info;

/// Shared state behind every handler.
#[derive(Clone)]
pub struct AppState {
    pub sessions: SessionStore,
    pub config: Arc<TrackerConfig>,
    pub client: Arc<dyn CompletionClient>,
}

impl AppState {
    /// State backed by a real [`OpenRouterClient`].
    pub fn new(config: TrackerConfig) -> Result<Self, SubTrackError> {
        let client = OpenRouterClient::new(&config)?;
        Ok(Self::with_client(config, Arc::new(client)))
    }

    /// State with a caller-supplied completion backend.
    pub fn with_client(config: TrackerConfig, client: Arc<dyn CompletionClient>) -> Self {
        Self {
            sessions: SessionStore::new(),
            config: Arc::new(config),
            client,
        }
    }
}

pub fn router(state: AppState, server: &ServerConfig) -> Router {
    Router::new()
        .route("/", get(handlers::index))
        .route("/upload", post(handlers::upload))
        .route("/categorize/:id", post(handlers::categorize))
        .route("/report", get(handlers::report))
        .route("/health", get(handlers::health))
        .layer(DefaultBodyLimit::max(server.max_upload_bytes))
        .with_state(state)
}

/// Bind `server.bind_addr()` and serve until the process is stopped.
pub async fn serve(state: AppState, server: &ServerConfig) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(server.bind_addr()).await?;
    info!("Listening on http://{}", listener.local_addr()?);
    axum::serve(listener, router(state, server)).await
}
