//! HTTP request handlers for the chat API.

use std::convert::Infallible;
use std::sync::{Arc, LazyLock};

use axum::{
    body::Body,
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use futures::StreamExt;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio_stream::wrappers::UnboundedReceiverStream;

use crate::config::{Config, Credentials};
use crate::error::TabletalkError;
use crate::pipeline::{Event, QueryPipeline};

/// Application state shared across handlers.
pub struct ApiState {
    /// Base configuration; per-request overrides take precedence.
    pub config: Config,
}

impl ApiState {
    /// Create new API state.
    pub fn new(config: Config) -> Self {
        Self { config }
    }
}

// ============================================================================
// Request/Response Types
// ============================================================================

/// Chat request body.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    /// The user's natural-language question.
    pub message: String,
    /// Per-request credentials and session, all optional.
    #[serde(default)]
    pub config: CredentialOverrides,
}

/// Per-request credential overrides, camelCase-keyed for the web client.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialOverrides {
    #[serde(default)]
    pub supabase_url: Option<String>,
    #[serde(default)]
    pub supabase_key: Option<String>,
    #[serde(default)]
    pub openai_key: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
}

/// Chat response body for the single-shot endpoint.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponse {
    pub response: String,
    pub query_result: Option<serde_json::Value>,
    pub error: Option<String>,
}

/// Error response.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

// ============================================================================
// Input Sanitation
// ============================================================================

static MARKUP_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[<>{}]").expect("Invalid regex"));

static INJECTION_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"--",
        r"/\*",
        r"\*/",
        r";.*--;",
        r"(?i)union\s+select",
        r"(?i)drop\s+table",
        r"(?i)delete\s+from",
        r"(?i)insert\s+into",
        r"(?i)update\s+.*\s+set",
        r"(?i)alter\s+table",
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).expect("Invalid regex"))
    .collect()
});

/// Strip markup and injection-looking fragments, capping the length.
fn sanitize_message(text: &str, max_length: usize) -> String {
    let stripped = MARKUP_CHARS.replace_all(text, "");
    let mut text: String = stripped.chars().take(max_length).collect();
    for pattern in INJECTION_PATTERNS.iter() {
        text = pattern.replace_all(&text, "").into_owned();
    }
    text.trim().to_string()
}

/// Reject empty or over-length messages, sanitizing the rest.
fn validate_message(message: &str, max_length: usize) -> std::result::Result<String, String> {
    if message.trim().is_empty() {
        return Err("Message cannot be empty".to_string());
    }
    if message.chars().count() > max_length {
        return Err(format!("Message too long (max {max_length} characters)"));
    }
    Ok(sanitize_message(message, max_length))
}

// ============================================================================
// Handler Functions
// ============================================================================

/// POST /api/chat - Answer one question in a single response.
pub async fn chat_handler(
    State(state): State<Arc<ApiState>>,
    Json(request): Json<ChatRequest>,
) -> impl IntoResponse {
    let message = match validate_message(&request.message, state.config.limits.max_message_length)
    {
        Ok(message) => message,
        Err(error) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse {
                    error,
                    code: "invalid_message".to_string(),
                }),
            )
                .into_response();
        }
    };

    let credentials = match resolve_credentials(&state.config, &request.config) {
        Ok(credentials) => credentials,
        Err(error) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse {
                    error,
                    code: "missing_credentials".to_string(),
                }),
            )
                .into_response();
        }
    };

    let pipeline = match QueryPipeline::from_config(&state.config, &credentials) {
        Ok(pipeline) => pipeline,
        Err(e) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: format!("Error processing query: {e}"),
                    code: "pipeline_init_failed".to_string(),
                }),
            )
                .into_response();
        }
    };

    let reply = pipeline
        .run(&message, request.config.session_id.as_deref())
        .await;

    (
        StatusCode::OK,
        Json(ChatResponse {
            response: reply.response,
            query_result: reply.query_result,
            error: reply.error,
        }),
    )
        .into_response()
}

/// POST /api/chat/stream - Answer one question as a server-sent event stream.
///
/// Pipeline events become `data: {json}` frames; a `done` frame closes
/// every successful stream. Failures before the pipeline starts produce
/// a single `error` frame with no `done` marker.
pub async fn chat_stream_handler(
    State(state): State<Arc<ApiState>>,
    Json(request): Json<ChatRequest>,
) -> impl IntoResponse {
    let message = match validate_message(&request.message, state.config.limits.max_message_length)
    {
        Ok(message) => message,
        Err(error) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse {
                    error,
                    code: "invalid_message".to_string(),
                }),
            )
                .into_response();
        }
    };

    let credentials = match resolve_credentials(&state.config, &request.config) {
        Ok(credentials) => credentials,
        Err(error) => return sse_error_stream(error),
    };

    let pipeline = match QueryPipeline::from_config(&state.config, &credentials) {
        Ok(pipeline) => pipeline,
        Err(e) => return sse_error_stream(e.to_string()),
    };

    let events = pipeline.run_stream(&message, request.config.session_id.as_deref());
    let frames = UnboundedReceiverStream::new(events)
        .map(|event| sse_frame(&event))
        .chain(futures::stream::once(async { sse_frame(&Event::Done) }))
        .map(Ok::<_, Infallible>);

    sse_response(Body::from_stream(frames))
}

/// GET /health - Liveness probe.
pub async fn health_handler() -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "service": "tabletalk-api",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

/// GET / - Service banner.
pub async fn root_handler() -> impl IntoResponse {
    Json(json!({
        "message": "Tabletalk API is running",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "chat": {
                "method": "POST",
                "path": "/api/chat",
                "description": "Answer a natural-language question about the database"
            },
            "chat_stream": {
                "method": "POST",
                "path": "/api/chat/stream",
                "description": "Answer with progress events over SSE"
            },
            "health": {
                "method": "GET",
                "path": "/health",
                "description": "Liveness probe"
            }
        },
    }))
}

// ============================================================================
// Helpers
// ============================================================================

fn resolve_credentials(
    config: &Config,
    overrides: &CredentialOverrides,
) -> std::result::Result<Credentials, String> {
    config
        .resolve_credentials(
            overrides.supabase_url.as_deref(),
            overrides.supabase_key.as_deref(),
            overrides.openai_key.as_deref(),
        )
        .map_err(|e| match e {
            TabletalkError::Config(config_error) => config_error.to_string(),
            other => other.to_string(),
        })
}

/// Encode one payload as a `data:` SSE frame.
fn sse_frame<T: Serialize>(payload: &T) -> String {
    match serde_json::to_string(payload) {
        Ok(json) => format!("data: {json}\n\n"),
        Err(e) => {
            tracing::error!(error = %e, "Failed to serialize stream event");
            "data: {\"type\":\"error\",\"error\":\"event serialization failed\"}\n\n".to_string()
        }
    }
}

/// One error frame and no `done` marker, for failures before the
/// pipeline starts.
fn sse_error_stream(detail: String) -> Response {
    let frame = sse_frame(&json!({"type": "error", "error": detail}));
    sse_response(Body::from(frame))
}

fn sse_response(body: Body) -> Response {
    (
        [
            (header::CONTENT_TYPE, "text/event-stream"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        body,
    )
        .into_response()
}
