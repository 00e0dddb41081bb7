//! User directory types and identifier normalization.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Minimum username length.
pub const USERNAME_MIN_LENGTH: usize = 3;

/// Maximum username length.
pub const USERNAME_MAX_LENGTH: usize = 20;

/// A row in the user directory.
///
/// `is_online`/`last_seen` are a best-effort mirror of the presence relay's
/// in-memory state, kept for clients that query over HTTP instead of holding
/// a socket open. The relay's connection map is the source of truth.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    pub user_id: String,
    pub email: String,
    pub username: Option<String>,
    pub name: String,
    pub picture: String,
    pub is_online: bool,
    pub last_seen: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Trim and lowercase a user-supplied identifier before using it as a key.
pub fn normalize_user_id(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Usernames are stored and compared in normalized (lowercase) form.
pub fn normalize_username(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Validate a username: 3–20 characters, letters, digits, and underscores.
pub fn validate_username(name: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err("Username required".into());
    }
    if name.len() < USERNAME_MIN_LENGTH {
        return Err(format!(
            "Username must be at least {} characters",
            USERNAME_MIN_LENGTH
        ));
    }
    if name.len() > USERNAME_MAX_LENGTH {
        return Err(format!(
            "Username must be {} characters or less",
            USERNAME_MAX_LENGTH
        ));
    }
    if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err("Username can only contain letters, numbers, and underscores".into());
    }
    Ok(())
}

/// Best-available display name for a user: username, else profile name,
/// else the stored identifier, else the raw identifier the caller already
/// has. First non-empty value wins; a deleted user record falls all the way
/// through to the raw identifier.
pub fn display_name(record: Option<&UserRecord>, fallback_id: &str) -> String {
    if let Some(user) = record {
        if let Some(username) = user.username.as_deref() {
            if !username.is_empty() {
                return username.to_string();
            }
        }
        if !user.name.is_empty() {
            return user.name.clone();
        }
        if !user.user_id.is_empty() {
            return user.user_id.clone();
        }
    }
    fallback_id.to_string()
}

/// Request body for `POST /users/upsert`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpsertRequest {
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub picture: Option<String>,
    /// Optional username claim; validated and unique.
    #[serde(default)]
    pub username: Option<String>,
}

/// Profile summary served by `GET /users/summary/:userId`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub user_id: String,
    pub username: Option<String>,
    pub name: String,
    pub picture: String,
    pub is_online: bool,
    pub last_seen: Option<DateTime<Utc>>,
}

impl From<UserRecord> for UserSummary {
    fn from(user: UserRecord) -> Self {
        Self {
            user_id: user.user_id,
            username: user.username,
            name: user.name,
            picture: user.picture,
            is_online: user.is_online,
            last_seen: user.last_seen,
        }
    }
}
