//! HTTP server.
//!
//! Exposes the assistant as a JSON API for the storefront chat widget.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/api/chat` | Answer the last message of a conversation |
//! | `POST` | `/api/catalog/reload` | Reload the catalog and swap the index |
//! | `GET`  | `/health` | Health check (version and catalog size) |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "messages must not be empty" } }
//! ```
//!
//! Error codes: `bad_request` (400), `internal` (500). Collaborator failures
//! during a chat turn never produce an error response; the reply degrades
//! instead.
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so the widget can be
//! embedded on any storefront domain.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use catalog_assistant_core::models::ChatMessage;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};

use crate::chat::Assistant;
use crate::config::Config;

#[derive(Clone)]
struct AppState {
    assistant: Arc<Assistant>,
}

/// Start the server on `[server].bind` and run until the process exits.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let assistant = Arc::new(Assistant::from_config(config).await?);
    assistant
        .sessions()
        .clone()
        .spawn_sweeper(Duration::from_secs(config.sessions.sweep_interval_secs));

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    tracing::info!(addr = %listener.local_addr()?, "server listening");
    axum::serve(listener, router(assistant)).await?;

    Ok(())
}

/// The application router. Exposed for embedding and tests.
pub fn router(assistant: Arc<Assistant>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/chat", post(handle_chat))
        .route("/api/catalog/reload", post(handle_reload))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(AppState { assistant })
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

fn internal(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal".to_string(),
        message: message.into(),
    }
}

// ============ POST /api/chat ============

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChatRequest {
    #[serde(default)]
    messages: Vec<ChatMessage>,
    #[serde(default)]
    session_id: Option<String>,
}

#[derive(Serialize)]
struct ChatResponse {
    success: bool,
    message: String,
}

/// Handler for `POST /api/chat`.
///
/// Returns `400` for an empty message list or an empty last message; every
/// other turn gets `200` with a best-effort reply.
async fn handle_chat(
    State(state): State<AppState>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, AppError> {
    match req.messages.last() {
        None => return Err(bad_request("messages must not be empty")),
        Some(m) if m.content.trim().is_empty() => {
            return Err(bad_request("last message must not be empty"))
        }
        Some(_) => {}
    }

    let outcome = state
        .assistant
        .respond(&req.messages, req.session_id.as_deref())
        .await
        .map_err(|e| internal(e.to_string()))?;

    Ok(Json(ChatResponse {
        success: true,
        message: outcome.message,
    }))
}

// ============ POST /api/catalog/reload ============

#[derive(Serialize)]
struct ReloadResponse {
    success: bool,
    products: usize,
}

async fn handle_reload(State(state): State<AppState>) -> Result<Json<ReloadResponse>, AppError> {
    let products = state.assistant.catalog().reload().await.map_err(|e| {
        tracing::warn!(error = %e, "catalog reload failed");
        internal(format!("catalog reload failed: {:#}", e))
    })?;
    Ok(Json(ReloadResponse {
        success: true,
        products,
    }))
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
    products: usize,
}

async fn handle_health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        products: state.assistant.catalog().len(),
    })
}
