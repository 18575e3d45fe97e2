//! Child profile CRUD, keyed by the `X-User-ID` header.
//!
//! One profile per user. The stored field is the birth date; the age
//! in responses is derived at read time.

use axum::{
    Router,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::Json,
    routing::{delete, get, post, put},
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use nestchat_core::{ChildProfile, StoreError};
use nestchat_store::{NewProfile, ProfileUpdate};

use crate::{ErrorResponse, SharedState, require_user_id, storage_error};

pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/profile", post(create_profile_handler))
        .route("/profile", get(get_profile_handler))
        .route("/profile", put(update_profile_handler))
        .route("/profile", delete(delete_profile_handler))
}

#[derive(Serialize, Deserialize)]
pub struct ProfileResponse {
    pub user_id: String,
    pub nickname: String,
    pub birth_date: NaiveDate,
    pub age: i32,
    pub grade: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<ChildProfile> for ProfileResponse {
    fn from(p: ChildProfile) -> Self {
        let age = p.age();
        Self {
            user_id: p.user_id,
            nickname: p.nickname,
            birth_date: p.birth_date,
            age,
            grade: p.grade,
            notes: p.notes,
            created_at: p.created_at,
            updated_at: p.updated_at,
        }
    }
}

#[derive(Serialize)]
struct DeletedResponse {
    message: String,
}

fn not_found() -> (StatusCode, Json<ErrorResponse>) {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse {
            error: "档案不存在".to_string(),
        }),
    )
}

async fn create_profile_handler(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Json(payload): Json<NewProfile>,
) -> Result<(StatusCode, Json<ProfileResponse>), (StatusCode, Json<ErrorResponse>)> {
    let user_id = require_user_id(&headers)?;

    match state.profiles.create(&user_id, payload).await {
        Ok(profile) => Ok((StatusCode::CREATED, Json(profile.into()))),
        Err(StoreError::AlreadyExists(_)) => Err((
            StatusCode::CONFLICT,
            Json(ErrorResponse {
                error: "档案已存在，请使用更新接口".to_string(),
            }),
        )),
        Err(e) => Err(storage_error(e)),
    }
}

async fn get_profile_handler(
    State(state): State<SharedState>,
    headers: HeaderMap,
) -> Result<Json<ProfileResponse>, (StatusCode, Json<ErrorResponse>)> {
    let user_id = require_user_id(&headers)?;

    match state.profiles.get(&user_id).await.map_err(storage_error)? {
        Some(profile) => Ok(Json(profile.into())),
        None => Err(not_found()),
    }
}

async fn update_profile_handler(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Json(payload): Json<ProfileUpdate>,
) -> Result<Json<ProfileResponse>, (StatusCode, Json<ErrorResponse>)> {
    let user_id = require_user_id(&headers)?;

    match state
        .profiles
        .update(&user_id, payload)
        .await
        .map_err(storage_error)?
    {
        Some(profile) => Ok(Json(profile.into())),
        None => Err(not_found()),
    }
}

async fn delete_profile_handler(
    State(state): State<SharedState>,
    headers: HeaderMap,
) -> Result<Json<DeletedResponse>, (StatusCode, Json<ErrorResponse>)> {
    let user_id = require_user_id(&headers)?;

    if state
        .profiles
        .delete(&user_id)
        .await
        .map_err(storage_error)?
    {
        Ok(Json(DeletedResponse {
            message: "档案已删除".to_string(),
        }))
    } else {
        Err(not_found())
    }
}
