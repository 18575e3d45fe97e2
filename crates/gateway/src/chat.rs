//! Chat endpoints.
//!
//! `POST /chat` is stateless: the caller supplies the history inline.
//! `POST /chat_with_context` resolves the session, history window and
//! child profile server-side, keyed by the `X-User-ID` header.

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use nestchat_core::{ChatTurn, ResponseMode, Role};

use crate::{ErrorResponse, SharedState, require_user_id, session_id_header, storage_error};

/// Server-side history window bounds for `/chat_with_context`.
const MAX_HISTORY_LIMIT: usize = 20;

fn default_mode() -> String {
    "concise".to_string()
}

fn default_history_limit() -> usize {
    10
}

#[derive(Deserialize)]
pub struct ChatPayload {
    pub message: String,
    #[serde(default)]
    pub history: Vec<InlineTurn>,
    #[serde(default = "default_mode")]
    pub response_mode: String,
    #[serde(default)]
    pub child_age: Option<u8>,
}

/// A history turn supplied inline by the caller.
#[derive(Deserialize)]
pub struct InlineTurn {
    pub role: Role,
    pub content: String,
}

#[derive(Serialize, Deserialize)]
pub struct ChatResponseBody {
    pub reply: String,
}

#[derive(Deserialize)]
pub struct ContextChatPayload {
    pub message: String,
    #[serde(default = "default_mode")]
    pub response_mode: String,
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
}

#[derive(Serialize, Deserialize)]
pub struct ContextChatResponse {
    pub session_id: String,
    pub reply: String,
}

/// Unknown modes warn and fall back rather than reject.
fn resolve_mode(raw: &str) -> ResponseMode {
    if !ResponseMode::is_known(raw) {
        warn!(mode = raw, "unknown response_mode, using detailed");
    }
    ResponseMode::parse_lenient(raw)
}

pub async fn chat_handler(
    State(state): State<SharedState>,
    Json(payload): Json<ChatPayload>,
) -> Result<Json<ChatResponseBody>, (StatusCode, Json<ErrorResponse>)> {
    let mode = resolve_mode(&payload.response_mode);

    let history: Vec<ChatTurn> = payload
        .history
        .into_iter()
        .map(|t| ChatTurn {
            role: t.role,
            content: t.content,
            timestamp: Utc::now(),
        })
        .collect();

    match state
        .orchestrator
        .converse(&payload.message, &history, mode, payload.child_age)
        .await
    {
        Ok(reply) => Ok(Json(ChatResponseBody { reply })),
        Err(e) => Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                error: format!("AI 服务异常: {e}"),
            }),
        )),
    }
}

pub async fn chat_with_context_handler(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Json(payload): Json<ContextChatPayload>,
) -> Result<Json<ContextChatResponse>, (StatusCode, Json<ErrorResponse>)> {
    let user_id = require_user_id(&headers)?;

    if payload.history_limit > MAX_HISTORY_LIMIT {
        return Err((
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(ErrorResponse {
                error: format!("history_limit 不能超过 {MAX_HISTORY_LIMIT}"),
            }),
        ));
    }

    let mode = resolve_mode(&payload.response_mode);

    // Reuse the session from the header, else the most recent one,
    // else start fresh.
    let session_id = match session_id_header(&headers) {
        Some(id) => id,
        None => match state
            .history
            .current_session(&user_id)
            .await
            .map_err(storage_error)?
        {
            Some(id) => id.0,
            None => {
                state
                    .history
                    .create_session(&user_id)
                    .await
                    .map_err(storage_error)?
                    .0
            }
        },
    };

    let recent = state
        .history
        .recent_messages(&user_id, &session_id, payload.history_limit)
        .await
        .map_err(storage_error)?;

    let child_age = state
        .profiles
        .get(&user_id)
        .await
        .map_err(storage_error)?
        .and_then(|p| u8::try_from(p.age()).ok());

    // The question is recorded before the upstream call so it survives
    // an upstream failure.
    let recorded = state
        .history
        .append_message(&user_id, &session_id, Role::User, &payload.message)
        .await
        .map_err(storage_error)?;
    if !recorded {
        return Err((
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: "会话不存在".to_string(),
            }),
        ));
    }

    let reply = match state
        .orchestrator
        .converse(&payload.message, &recent, mode, child_age)
        .await
    {
        Ok(reply) => reply,
        Err(e) => {
            warn!(error = %e, %session_id, "context chat failed upstream");
            return Err((
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ErrorResponse {
                    error: format!("AI 服务异常: {e}"),
                }),
            ));
        }
    };

    // The answer is only recorded on success.
    state
        .history
        .append_message(&user_id, &session_id, Role::Assistant, &reply)
        .await
        .map_err(storage_error)?;

    info!(%session_id, "context chat round recorded");

    Ok(Json(ContextChatResponse { session_id, reply }))
}
