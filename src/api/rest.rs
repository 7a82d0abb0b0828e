//! HTTP router and server startup.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    http::{header, Method},
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::api::handlers::{
    chat_handler, chat_stream_handler, health_handler, root_handler, ApiState,
};
use crate::config::Config;
use crate::error::Result;

/// Create the API router.
///
/// Endpoints:
/// - POST /api/chat        - Answer a question in one response
/// - POST /api/chat/stream - Answer a question as an SSE stream
/// - GET  /health          - Liveness probe
/// - GET  /                - Service banner
pub fn create_router(config: Config) -> Router {
    let state = Arc::new(ApiState::new(config));

    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_origin(Any);

    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .route("/api/chat", post(chat_handler))
        .route("/api/chat/stream", post(chat_stream_handler))
        .layer(cors)
        .with_state(state)
}

/// Bind and serve the API until the process is stopped.
pub async fn serve(config: Config) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .map_err(|e| crate::error::ConfigError::Invalid(format!("invalid server address: {e}")))?;

    let app = create_router(config);

    info!("Tabletalk API listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
