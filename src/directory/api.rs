//! User directory endpoints.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use super::types::{
    normalize_user_id, normalize_username, validate_username, UpsertRequest, UserSummary,
};
use crate::error::{Error, Result};
use crate::AppState;

/// Create or update a user record.
///
/// POST /users/upsert
/// Body: { "userId": "...", "email": "...", "name": "...", "picture": "...", "username": "..." }
pub async fn upsert(
    State(state): State<AppState>,
    Json(request): Json<UpsertRequest>,
) -> Result<impl IntoResponse> {
    let raw_id = request
        .user_id
        .as_deref()
        .filter(|id| !id.trim().is_empty())
        .or(request.email.as_deref())
        .unwrap_or("");
    let user_id = normalize_user_id(raw_id);
    if user_id.is_empty() {
        return Err(Error::InvalidRequest("userId required".into()));
    }

    let username = match request.username.as_deref() {
        Some(raw) => {
            let normalized = normalize_username(raw);
            validate_username(&normalized).map_err(Error::InvalidRequest)?;
            Some(normalized)
        }
        None => None,
    };

    let email = request
        .email
        .as_deref()
        .filter(|e| !e.is_empty())
        .unwrap_or(&user_id);
    let user = state.directory.upsert(
        &user_id,
        email,
        request.name.as_deref().unwrap_or(""),
        request.picture.as_deref().unwrap_or(""),
        username.as_deref(),
    )?;

    tracing::debug!(user = user.user_id.as_str(), "User upserted");
    Ok(Json(json!({ "user": user })))
}

/// Query parameters for the username availability check.
#[derive(Debug, Deserialize)]
pub struct CheckUsernameQuery {
    #[serde(default)]
    pub username: Option<String>,
}

/// Check whether a username is valid and unclaimed.
///
/// GET /users/check-username?username=bob
///
/// Validation failures respond 400 with `available: false` and the reason;
/// a valid name responds 200 with the availability flag.
pub async fn check_username(
    State(state): State<AppState>,
    Query(query): Query<CheckUsernameQuery>,
) -> std::result::Result<Response, Error> {
    let normalized = normalize_username(query.username.as_deref().unwrap_or(""));
    if let Err(reason) = validate_username(&normalized) {
        return Ok((
            StatusCode::BAD_REQUEST,
            Json(json!({ "available": false, "error": reason })),
        )
            .into_response());
    }

    let available = state.directory.username_available(&normalized)?;
    Ok(Json(json!({ "available": available })).into_response())
}

/// Profile summary with the last-known presence mirror.
///
/// GET /users/summary/:userId
pub async fn summary(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<UserSummary>> {
    let normalized = normalize_user_id(&user_id);
    if normalized.is_empty() {
        return Err(Error::InvalidRequest("userId required".into()));
    }

    let user = state
        .directory
        .find_by_id(&normalized)?
        .ok_or_else(|| Error::NotFound("User not found".into()))?;

    Ok(Json(UserSummary::from(user)))
}
