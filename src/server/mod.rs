//! HTTP server wiring

mod handler;

use axum::{
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::assembler::{HeuristicTokenCounter, TokenCounter};
use crate::config::AppConfig;
use crate::relay::Relay;

/// Shared state for the chat endpoint
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub relay: Relay,
    pub counter: Arc<dyn TokenCounter>,
}

/// Build the HTTP client used for upstream connections.
///
/// Only a connect timeout is set; the streamed response body must be able
/// to wait indefinitely between chunks.
fn build_http_client(config: &AppConfig) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(config.upstream.connect_timeout_seconds))
        .build()
}

/// Build the application router over the given state
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/chat", post(handler::chat))
        .route("/health", get(health_handler))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Run the chat relay server
pub async fn run_server(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let http_client = build_http_client(&config)?;
    let relay = Relay::new(http_client, config.upstream.clone());

    if config.upstream.resolve_api_key().is_none() {
        tracing::warn!(
            "No upstream API key configured; /chat requests will fail until one is provided"
        );
    }

    let state = AppState {
        config: Arc::new(config.clone()),
        relay,
        counter: Arc::new(HeuristicTokenCounter::default()),
    };

    let app = build_router(state);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;

    tracing::info!("chat-relay listening on {}", addr);
    tracing::info!("Relaying to {}", config.upstream.completions_url());

    Ok(axum::serve(listener, app).await?)
}

/// Health check endpoint
async fn health_handler() -> &'static str {
    "OK"
}
