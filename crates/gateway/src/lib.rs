//! HTTP API gateway for NestChat.
//!
//! Exposes REST endpoints for stateless chat, context-aware chat,
//! child profiles, and conversation history.
//!
//! Built on Axum for high performance async HTTP.

pub mod chat;
pub mod history_routes;
pub mod profile_routes;

use axum::{
    Router,
    http::{HeaderMap, StatusCode},
    response::Json,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use nestchat_advisor::Orchestrator;
use nestchat_core::StoreError;
use nestchat_store::{HistoryStore, ProfileStore};

/// Shared application state for the gateway.
pub struct AppState {
    pub orchestrator: Orchestrator,
    pub profiles: ProfileStore,
    pub history: HistoryStore,
}

pub type SharedState = Arc<AppState>;

/// JSON error body returned by every failing endpoint.
#[derive(Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Build the Axum router with all gateway routes.
pub fn build_router(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/chat", post(chat::chat_handler))
        .route("/chat_with_context", post(chat::chat_with_context_handler))
        .merge(profile_routes::router())
        .merge(history_routes::router())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the gateway on the given host and port.
pub async fn serve(state: SharedState, host: &str, port: u16) -> std::io::Result<()> {
    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "gateway listening");
    axum::serve(listener, build_router(state)).await
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    service: String,
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        service: "nestchat".to_string(),
    })
}

/// Extract the required `X-User-ID` header.
pub(crate) fn require_user_id(
    headers: &HeaderMap,
) -> Result<String, (StatusCode, Json<ErrorResponse>)> {
    headers
        .get("X-User-ID")
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or_else(|| {
            (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse {
                    error: "缺少 X-User-ID 请求头".to_string(),
                }),
            )
        })
}

/// Extract the optional `X-Session-ID` header.
pub(crate) fn session_id_header(headers: &HeaderMap) -> Option<String> {
    headers
        .get("X-Session-ID")
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

pub(crate) fn storage_error(err: StoreError) -> (StatusCode, Json<ErrorResponse>) {
    tracing::error!(error = %err, "storage failure");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse {
            error: format!("存储服务异常: {err}"),
        }),
    )
}
