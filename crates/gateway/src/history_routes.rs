//! Conversation history endpoints, keyed by the `X-User-ID` header.
//!
//! A user has many sessions; the "current" session is the one written
//! to most recently. `X-Session-ID` selects an explicit session where
//! it makes sense, otherwise the current one is used.

use axum::{
    Router,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::Json,
    routing::{delete, get, post},
};
use serde::{Deserialize, Serialize};

use nestchat_core::{Role, SessionHistory};

use crate::{ErrorResponse, SharedState, require_user_id, session_id_header, storage_error};

pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/history/session", post(create_session_handler))
        .route("/history/session", get(current_session_handler))
        .route("/history/session", delete(delete_session_handler))
        .route("/history/message", post(append_message_handler))
        .route("/history/messages", delete(clear_session_handler))
        .route("/history", get(get_history_handler))
        .route("/history", delete(delete_all_handler))
}

#[derive(Serialize, Deserialize)]
pub struct SessionCreatedResponse {
    pub session_id: String,
    pub message: String,
}

#[derive(Serialize, Deserialize)]
pub struct CurrentSessionResponse {
    pub session_id: Option<String>,
}

#[derive(Deserialize)]
pub struct AppendMessagePayload {
    pub role: Role,
    pub content: String,
}

#[derive(Serialize)]
struct ActionResponse {
    message: String,
}

fn session_not_found() -> (StatusCode, Json<ErrorResponse>) {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse {
            error: "会话不存在".to_string(),
        }),
    )
}

/// The explicit session from the header, else the current one.
async fn resolve_session(
    state: &SharedState,
    headers: &HeaderMap,
    user_id: &str,
) -> Result<Option<String>, (StatusCode, Json<ErrorResponse>)> {
    match session_id_header(headers) {
        Some(id) => Ok(Some(id)),
        None => Ok(state
            .history
            .current_session(user_id)
            .await
            .map_err(storage_error)?
            .map(|id| id.0)),
    }
}

async fn create_session_handler(
    State(state): State<SharedState>,
    headers: HeaderMap,
) -> Result<Json<SessionCreatedResponse>, (StatusCode, Json<ErrorResponse>)> {
    let user_id = require_user_id(&headers)?;

    let session_id = state
        .history
        .create_session(&user_id)
        .await
        .map_err(storage_error)?;

    Ok(Json(SessionCreatedResponse {
        session_id: session_id.0,
        message: "新会话已创建".to_string(),
    }))
}

async fn current_session_handler(
    State(state): State<SharedState>,
    headers: HeaderMap,
) -> Result<Json<CurrentSessionResponse>, (StatusCode, Json<ErrorResponse>)> {
    let user_id = require_user_id(&headers)?;

    let session_id = state
        .history
        .current_session(&user_id)
        .await
        .map_err(storage_error)?;

    Ok(Json(CurrentSessionResponse {
        session_id: session_id.map(|id| id.0),
    }))
}

async fn append_message_handler(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Json(payload): Json<AppendMessagePayload>,
) -> Result<Json<ActionResponse>, (StatusCode, Json<ErrorResponse>)> {
    let user_id = require_user_id(&headers)?;

    if payload.role == Role::System {
        return Err((
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(ErrorResponse {
                error: "role 只能是 user 或 assistant".to_string(),
            }),
        ));
    }

    let Some(session_id) = resolve_session(&state, &headers, &user_id).await? else {
        return Err(session_not_found());
    };

    let recorded = state
        .history
        .append_message(&user_id, &session_id, payload.role, &payload.content)
        .await
        .map_err(storage_error)?;

    if recorded {
        Ok(Json(ActionResponse {
            message: "消息已保存".to_string(),
        }))
    } else {
        Err(session_not_found())
    }
}

async fn get_history_handler(
    State(state): State<SharedState>,
    headers: HeaderMap,
) -> Result<Json<SessionHistory>, (StatusCode, Json<ErrorResponse>)> {
    let user_id = require_user_id(&headers)?;
    let session_id = session_id_header(&headers);

    match state
        .history
        .history(&user_id, session_id.as_deref())
        .await
        .map_err(storage_error)?
    {
        Some(history) => Ok(Json(history)),
        None => Err(session_not_found()),
    }
}

async fn clear_session_handler(
    State(state): State<SharedState>,
    headers: HeaderMap,
) -> Result<Json<ActionResponse>, (StatusCode, Json<ErrorResponse>)> {
    let user_id = require_user_id(&headers)?;

    let Some(session_id) = resolve_session(&state, &headers, &user_id).await? else {
        return Err(session_not_found());
    };

    if state
        .history
        .clear_session(&user_id, &session_id)
        .await
        .map_err(storage_error)?
    {
        Ok(Json(ActionResponse {
            message: "会话消息已清空".to_string(),
        }))
    } else {
        Err(session_not_found())
    }
}

async fn delete_session_handler(
    State(state): State<SharedState>,
    headers: HeaderMap,
) -> Result<Json<ActionResponse>, (StatusCode, Json<ErrorResponse>)> {
    let user_id = require_user_id(&headers)?;

    let Some(session_id) = session_id_header(&headers) else {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: "缺少 X-Session-ID 请求头".to_string(),
            }),
        ));
    };

    if state
        .history
        .delete_session(&user_id, &session_id)
        .await
        .map_err(storage_error)?
    {
        Ok(Json(ActionResponse {
            message: "会话已删除".to_string(),
        }))
    } else {
        Err(session_not_found())
    }
}

async fn delete_all_handler(
    State(state): State<SharedState>,
    headers: HeaderMap,
) -> Result<Json<ActionResponse>, (StatusCode, Json<ErrorResponse>)> {
    let user_id = require_user_id(&headers)?;

    state
        .history
        .delete_all_sessions(&user_id)
        .await
        .map_err(storage_error)?;

    Ok(Json(ActionResponse {
        message: "全部会话已删除".to_string(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build_router;
    use crate::testutil::{ScriptedClient, test_state};
    use axum::Router;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use serde_json::{Value, json};
    use tower::ServiceExt;

    async fn app() -> Router {
        build_router(test_state(ScriptedClient::replying("好的")).await)
    }

    async fn request(
        app: Router,
        method: &str,
        uri: &str,
        headers: &[(&str, &str)],
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        for (k, v) in headers {
            builder = builder.header(*k, *v);
        }
        let req = match body {
            Some(v) => builder
                .header("content-type", "application/json")
                .body(Body::from(v.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let response = app.oneshot(req).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    #[tokio::test]
    async fn create_session_then_it_is_current() {
        let app = app().await;
        let user = [("X-User-ID", "u1")];

        let (status, created) =
            request(app.clone(), "POST", "/history/session", &user, None).await;
        assert_eq!(status, StatusCode::OK);
        let session_id = created["session_id"].as_str().unwrap().to_string();

        let (status, current) = request(app, "GET", "/history/session", &user, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(current["session_id"], session_id.as_str());
    }

    #[tokio::test]
    async fn current_session_is_null_for_new_user() {
        let app = app().await;
        let (status, current) =
            request(app, "GET", "/history/session", &[("X-User-ID", "new")], None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(current["session_id"].is_null());
    }

    #[tokio::test]
    async fn append_message_lands_in_transcript() {
        let app = app().await;
        let user = [("X-User-ID", "u1")];

        request(app.clone(), "POST", "/history/session", &user, None).await;

        let (status, _) = request(
            app.clone(),
            "POST",
            "/history/message",
            &user,
            Some(json!({ "role": "user", "content": "孩子挑食" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, transcript) = request(app, "GET", "/history", &user, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(transcript["message_count"], 1);
        assert_eq!(transcript["messages"][0]["content"], "孩子挑食");
    }

    #[tokio::test]
    async fn append_without_any_session_is_404() {
        let app = app().await;
        let (status, _) = request(
            app,
            "POST",
            "/history/message",
            &[("X-User-ID", "u1")],
            Some(json!({ "role": "user", "content": "你好" })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn append_rejects_system_role() {
        let app = app().await;
        let user = [("X-User-ID", "u1")];
        request(app.clone(), "POST", "/history/session", &user, None).await;

        let (status, _) = request(
            app,
            "POST",
            "/history/message",
            &user,
            Some(json!({ "role": "system", "content": "越权" })),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn foreign_session_is_invisible() {
        let app = app().await;

        let (_, created) =
            request(app.clone(), "POST", "/history/session", &[("X-User-ID", "owner")], None)
                .await;
        let session_id = created["session_id"].as_str().unwrap().to_string();

        let intruder = [("X-User-ID", "intruder"), ("X-Session-ID", session_id.as_str())];

        let (status, _) = request(
            app.clone(),
            "POST",
            "/history/message",
            &intruder,
            Some(json!({ "role": "user", "content": "偷看" })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = request(app.clone(), "GET", "/history", &intruder, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = request(app, "DELETE", "/history/session", &intruder, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn clear_keeps_session_but_drops_messages() {
        let app = app().await;
        let user = [("X-User-ID", "u1")];

        let (_, created) = request(app.clone(), "POST", "/history/session", &user, None).await;
        let session_id = created["session_id"].as_str().unwrap().to_string();

        request(
            app.clone(),
            "POST",
            "/history/message",
            &user,
            Some(json!({ "role": "user", "content": "你好" })),
        )
        .await;

        let (status, _) = request(app.clone(), "DELETE", "/history/messages", &user, None).await;
        assert_eq!(status, StatusCode::OK);

        let (status, transcript) = request(app.clone(), "GET", "/history", &user, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(transcript["session_id"], session_id.as_str());
        assert_eq!(transcript["message_count"], 0);

        let (status, current) = request(app, "GET", "/history/session", &user, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(current["session_id"], session_id.as_str());
    }

    #[tokio::test]
    async fn delete_session_requires_header_and_removes_it() {
        let app = app().await;
        let user = [("X-User-ID", "u1")];

        let (_, created) = request(app.clone(), "POST", "/history/session", &user, None).await;
        let session_id = created["session_id"].as_str().unwrap().to_string();

        let (status, _) = request(app.clone(), "DELETE", "/history/session", &user, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let with_session = [("X-User-ID", "u1"), ("X-Session-ID", session_id.as_str())];
        let (status, _) =
            request(app.clone(), "DELETE", "/history/session", &with_session, None).await;
        assert_eq!(status, StatusCode::OK);

        let (status, current) = request(app, "GET", "/history/session", &user, None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(current["session_id"].is_null());
    }

    #[tokio::test]
    async fn delete_all_clears_only_that_user() {
        let app = app().await;
        let u1 = [("X-User-ID", "u1")];
        let u2 = [("X-User-ID", "u2")];

        request(app.clone(), "POST", "/history/session", &u1, None).await;
        request(app.clone(), "POST", "/history/session", &u2, None).await;

        let (status, _) = request(app.clone(), "DELETE", "/history", &u1, None).await;
        assert_eq!(status, StatusCode::OK);

        let (_, current) = request(app.clone(), "GET", "/history/session", &u1, None).await;
        assert!(current["session_id"].is_null());

        let (_, current) = request(app, "GET", "/history/session", &u2, None).await;
        assert!(current["session_id"].is_string());
    }

    #[tokio::test]
    async fn history_without_sessions_is_404() {
        let app = app().await;
        let (status, _) = request(app, "GET", "/history", &[("X-User-ID", "u1")], None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
