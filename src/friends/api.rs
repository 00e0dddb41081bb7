//! Friend-request endpoints.
//!
//! Accept/reject deliberately collapse "doesn't exist", "wrong status", and
//! "wrong receiver" into one 404 — a caller probing with foreign request ids
//! learns nothing about other users' pending requests.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::types::{FriendView, PendingRequestView, RequestStatus};
use crate::directory::types::{display_name, normalize_user_id};
use crate::error::{Error, Result};
use crate::AppState;

/// Body for `POST /friend-requests`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendRequestBody {
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub friend_username: Option<String>,
}

/// Body for `PATCH /friend-requests/:requestId`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RespondBody {
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub action: Option<String>,
}

/// Body for `DELETE /friends`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveFriendBody {
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub friend_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendRequestResponse {
    pub success: bool,
    pub request_id: String,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ActionResponse {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ReceivedRequestsResponse {
    pub requests: Vec<PendingRequestView>,
}

#[derive(Debug, Serialize)]
pub struct FriendsResponse {
    pub friends: Vec<FriendView>,
}

/// Send a friend request to a user addressed by username.
///
/// POST /friend-requests
/// Body: { "userId": "...", "friendUsername": "..." }
pub async fn send_request(
    State(state): State<AppState>,
    Json(body): Json<SendRequestBody>,
) -> Result<(StatusCode, Json<SendRequestResponse>)> {
    let requester_id = normalize_user_id(body.user_id.as_deref().unwrap_or(""));
    let friend_username = body.friend_username.unwrap_or_default();
    if requester_id.is_empty() || friend_username.trim().is_empty() {
        return Err(Error::InvalidRequest(
            "userId and friendUsername are required".into(),
        ));
    }

    let receiver = state
        .directory
        .find_by_username(&friend_username)?
        .ok_or_else(|| Error::NotFound("User not found".into()))?;

    if requester_id == receiver.user_id {
        return Err(Error::InvalidRequest(
            "Cannot send friend request to yourself".into(),
        ));
    }

    if let Some(existing) = state.friends.find_between(&requester_id, &receiver.user_id)? {
        return Err(match existing.status {
            RequestStatus::Pending => Error::Conflict("Friend request already pending".into()),
            RequestStatus::Accepted => Error::Conflict("Already friends".into()),
        });
    }

    let record = state
        .friends
        .insert_pending(&requester_id, &receiver.user_id)?;

    tracing::info!(
        requester = requester_id.as_str(),
        receiver = receiver.user_id.as_str(),
        "Friend request sent"
    );

    Ok((
        StatusCode::CREATED,
        Json(SendRequestResponse {
            success: true,
            request_id: record.id,
            message: "Friend request sent".into(),
        }),
    ))
}

/// List pending requests addressed to a user, newest first, each enriched
/// with the requester's display name.
///
/// GET /friend-requests/:userId
pub async fn list_received(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<ReceivedRequestsResponse>> {
    let normalized = normalize_user_id(&user_id);
    if normalized.is_empty() {
        return Err(Error::InvalidRequest("userId required".into()));
    }

    let records = state.friends.pending_for_receiver(&normalized)?;
    let mut requests = Vec::with_capacity(records.len());
    for record in records {
        let requester = state.directory.find_by_id(&record.requester_id)?;
        requests.push(PendingRequestView {
            id: record.id,
            requester_username: display_name(requester.as_ref(), &record.requester_id),
            requester_id: record.requester_id,
            receiver_id: record.receiver_id,
            status: record.status,
            created_at: record.created_at,
        });
    }

    Ok(Json(ReceivedRequestsResponse { requests }))
}

/// Accept or reject a pending request. Only the receiver can respond, and
/// only while the request is still pending.
///
/// PATCH /friend-requests/:requestId
/// Body: { "userId": "...", "action": "accept" | "reject" }
pub async fn respond(
    State(state): State<AppState>,
    Path(request_id): Path<String>,
    Json(body): Json<RespondBody>,
) -> Result<Json<ActionResponse>> {
    if Uuid::parse_str(&request_id).is_err() {
        return Err(Error::InvalidRequest("Invalid requestId format".into()));
    }

    let user_id = normalize_user_id(body.user_id.as_deref().unwrap_or(""));
    let action = body.action.unwrap_or_default();
    if user_id.is_empty() || action.is_empty() {
        return Err(Error::InvalidRequest("userId and action are required".into()));
    }

    let (processed, message) = match action.as_str() {
        "accept" => (
            state.friends.accept(&request_id, &user_id)?,
            "Friend request accepted",
        ),
        "reject" => (
            state.friends.reject(&request_id, &user_id)?,
            "Friend request rejected",
        ),
        _ => {
            return Err(Error::InvalidRequest(
                "Invalid action. Use \"accept\" or \"reject\"".into(),
            ))
        }
    };

    if !processed {
        return Err(Error::NotFound(
            "Friend request not found or already processed".into(),
        ));
    }

    tracing::info!(
        request = request_id.as_str(),
        user = user_id.as_str(),
        action = action.as_str(),
        "Friend request processed"
    );

    Ok(Json(ActionResponse {
        success: true,
        message: message.into(),
    }))
}

/// List a user's confirmed friends with their last-known presence.
///
/// GET /friends/:userId
pub async fn list_friends(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<FriendsResponse>> {
    let normalized = normalize_user_id(&user_id);
    if normalized.is_empty() {
        return Err(Error::InvalidRequest("userId required".into()));
    }

    let records = state.friends.accepted_for_user(&normalized)?;
    let mut friends = Vec::with_capacity(records.len());
    for record in records {
        let other = record.other_party(&normalized).to_string();
        let user = state.directory.find_by_id(&other)?;
        friends.push(FriendView {
            username: display_name(user.as_ref(), &other),
            is_online: user.as_ref().map(|u| u.is_online).unwrap_or(false),
            last_seen: user.and_then(|u| u.last_seen),
            id: other,
        });
    }

    Ok(Json(FriendsResponse { friends }))
}

/// Remove an established friendship, whichever side initiated it.
///
/// DELETE /friends
/// Body: { "userId": "...", "friendId": "..." }
pub async fn remove_friend(
    State(state): State<AppState>,
    Json(body): Json<RemoveFriendBody>,
) -> Result<Json<ActionResponse>> {
    let user_id = normalize_user_id(body.user_id.as_deref().unwrap_or(""));
    let friend_id = normalize_user_id(body.friend_id.as_deref().unwrap_or(""));
    if user_id.is_empty() || friend_id.is_empty() {
        return Err(Error::InvalidRequest("userId and friendId are required".into()));
    }

    if !state.friends.remove_friendship(&user_id, &friend_id)? {
        return Err(Error::NotFound("Friendship not found".into()));
    }

    tracing::info!(
        user = user_id.as_str(),
        friend = friend_id.as_str(),
        "Friendship removed"
    );

    Ok(Json(ActionResponse {
        success: true,
        message: "Friend removed successfully".into(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::test_state;

    fn seed_user(state: &AppState, user_id: &str, username: &str, name: &str) {
        state
            .directory
            .upsert(user_id, user_id, name, "", Some(username))
            .unwrap();
    }

    fn send_body(user_id: &str, friend_username: &str) -> Json<SendRequestBody> {
        Json(SendRequestBody {
            user_id: Some(user_id.to_string()),
            friend_username: Some(friend_username.to_string()),
        })
    }

    fn respond_body(user_id: &str, action: &str) -> Json<RespondBody> {
        Json(RespondBody {
            user_id: Some(user_id.to_string()),
            action: Some(action.to_string()),
        })
    }

    async fn send(state: &AppState, user_id: &str, friend_username: &str) -> Result<String> {
        let (status, Json(body)) =
            send_request(State(state.clone()), send_body(user_id, friend_username)).await?;
        assert_eq!(status, StatusCode::CREATED);
        assert!(body.success);
        Ok(body.request_id)
    }

    #[tokio::test]
    async fn test_send_request_creates_pending_record() {
        let state = test_state();
        seed_user(&state, "alice@x.com", "alice", "Alice");
        seed_user(&state, "bob@x.com", "bob", "Bob");

        let request_id = send(&state, " Alice@X.com ", "bob").await.unwrap();

        let stored = state
            .friends
            .find_between("alice@x.com", "bob@x.com")
            .unwrap()
            .unwrap();
        assert_eq!(stored.id, request_id);
        assert_eq!(stored.status, RequestStatus::Pending);
        assert_eq!(stored.requester_id, "alice@x.com");
        assert_eq!(stored.receiver_id, "bob@x.com");
    }

    #[tokio::test]
    async fn test_send_request_validation() {
        let state = test_state();
        seed_user(&state, "alice@x.com", "alice", "Alice");

        let missing = send(&state, "", "alice").await;
        assert!(matches!(missing, Err(Error::InvalidRequest(_))));

        let unknown = send(&state, "alice@x.com", "nobody").await;
        assert!(matches!(unknown, Err(Error::NotFound(_))));

        let own = send(&state, "alice@x.com", "alice").await;
        assert!(matches!(own, Err(Error::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn test_send_request_duplicate_and_already_friends() {
        let state = test_state();
        seed_user(&state, "alice@x.com", "alice", "Alice");
        seed_user(&state, "bob@x.com", "bob", "Bob");

        let request_id = send(&state, "alice@x.com", "bob").await.unwrap();

        // Duplicate in either direction while pending.
        let dup = send(&state, "alice@x.com", "bob").await;
        assert!(matches!(dup, Err(Error::Conflict(_))));
        let reverse = send(&state, "bob@x.com", "alice").await;
        assert!(matches!(reverse, Err(Error::Conflict(_))));

        respond(
            State(state.clone()),
            Path(request_id),
            respond_body("bob@x.com", "accept"),
        )
        .await
        .unwrap();

        let already = send(&state, "alice@x.com", "bob").await;
        assert!(matches!(already, Err(Error::Conflict(_))));
    }

    #[tokio::test]
    async fn test_list_received_enriches_display_name() {
        let state = test_state();
        seed_user(&state, "alice@x.com", "alice", "Alice");
        seed_user(&state, "bob@x.com", "bob", "Bob");
        // Carol has a record but never claimed a username.
        state
            .directory
            .upsert("carol@x.com", "carol@x.com", "Carol", "", None)
            .unwrap();

        send(&state, "alice@x.com", "bob").await.unwrap();
        state
            .friends
            .insert_pending("carol@x.com", "bob@x.com")
            .unwrap();
        state
            .friends
            .insert_pending("ghost@x.com", "bob@x.com")
            .unwrap();

        let Json(listed) = list_received(State(state.clone()), Path("bob@x.com".into()))
            .await
            .unwrap();
        assert_eq!(listed.requests.len(), 3);

        let by_id = |id: &str| {
            listed
                .requests
                .iter()
                .find(|r| r.requester_id == id)
                .unwrap()
        };
        assert_eq!(by_id("alice@x.com").requester_username, "alice");
        assert_eq!(by_id("carol@x.com").requester_username, "Carol");
        // Requester with no user record falls back to the raw identifier.
        assert_eq!(by_id("ghost@x.com").requester_username, "ghost@x.com");
    }

    #[tokio::test]
    async fn test_respond_validation() {
        let state = test_state();

        let malformed = respond(
            State(state.clone()),
            Path("not-a-uuid".into()),
            respond_body("bob@x.com", "accept"),
        )
        .await;
        assert!(matches!(malformed, Err(Error::InvalidRequest(_))));

        let id = Uuid::new_v4().to_string();
        let missing_action = respond(
            State(state.clone()),
            Path(id.clone()),
            Json(RespondBody {
                user_id: Some("bob@x.com".into()),
                action: None,
            }),
        )
        .await;
        assert!(matches!(missing_action, Err(Error::InvalidRequest(_))));

        let bad_action = respond(
            State(state.clone()),
            Path(id.clone()),
            respond_body("bob@x.com", "block"),
        )
        .await;
        assert!(matches!(bad_action, Err(Error::InvalidRequest(_))));

        let unknown = respond(State(state), Path(id), respond_body("bob@x.com", "accept")).await;
        assert!(matches!(unknown, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn test_respond_succeeds_at_most_once() {
        let state = test_state();
        seed_user(&state, "alice@x.com", "alice", "Alice");
        seed_user(&state, "bob@x.com", "bob", "Bob");
        let request_id = send(&state, "alice@x.com", "bob").await.unwrap();

        // Only the receiver may respond, and the failure is the same 404.
        let wrong_receiver = respond(
            State(state.clone()),
            Path(request_id.clone()),
            respond_body("alice@x.com", "accept"),
        )
        .await;
        assert!(matches!(wrong_receiver, Err(Error::NotFound(_))));

        respond(
            State(state.clone()),
            Path(request_id.clone()),
            respond_body("bob@x.com", "accept"),
        )
        .await
        .unwrap();

        let second = respond(
            State(state),
            Path(request_id),
            respond_body("bob@x.com", "accept"),
        )
        .await;
        assert!(matches!(second, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn test_accept_round_trip_and_removal() {
        let state = test_state();
        seed_user(&state, "alice@x.com", "alice", "Alice");
        seed_user(&state, "bob@x.com", "bob", "Bob");
        let request_id = send(&state, "alice@x.com", "bob").await.unwrap();

        respond(
            State(state.clone()),
            Path(request_id),
            respond_body("bob@x.com", "accept"),
        )
        .await
        .unwrap();

        // The pair appears in both friend lists.
        let Json(alice_view) = list_friends(State(state.clone()), Path("alice@x.com".into()))
            .await
            .unwrap();
        assert_eq!(alice_view.friends.len(), 1);
        assert_eq!(alice_view.friends[0].id, "bob@x.com");
        assert_eq!(alice_view.friends[0].username, "bob");
        assert!(!alice_view.friends[0].is_online);

        let Json(bob_view) = list_friends(State(state.clone()), Path("bob@x.com".into()))
            .await
            .unwrap();
        assert_eq!(bob_view.friends.len(), 1);
        assert_eq!(bob_view.friends[0].id, "alice@x.com");

        // Removal makes it disappear from both.
        remove_friend(
            State(state.clone()),
            Json(RemoveFriendBody {
                user_id: Some("bob@x.com".into()),
                friend_id: Some("alice@x.com".into()),
            }),
        )
        .await
        .unwrap();

        let Json(alice_view) = list_friends(State(state.clone()), Path("alice@x.com".into()))
            .await
            .unwrap();
        assert!(alice_view.friends.is_empty());
        let Json(bob_view) = list_friends(State(state.clone()), Path("bob@x.com".into()))
            .await
            .unwrap();
        assert!(bob_view.friends.is_empty());

        // Removing again is a 404.
        let again = remove_friend(
            State(state),
            Json(RemoveFriendBody {
                user_id: Some("bob@x.com".into()),
                friend_id: Some("alice@x.com".into()),
            }),
        )
        .await;
        assert!(matches!(again, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn test_reject_then_rerequest() {
        let state = test_state();
        seed_user(&state, "alice@x.com", "alice", "Alice");
        seed_user(&state, "bob@x.com", "bob", "Bob");
        let request_id = send(&state, "alice@x.com", "bob").await.unwrap();

        respond(
            State(state.clone()),
            Path(request_id),
            respond_body("bob@x.com", "reject"),
        )
        .await
        .unwrap();

        // Rejection is a hard delete, so the same pair can re-request.
        send(&state, "alice@x.com", "bob").await.unwrap();
    }

    #[tokio::test]
    async fn test_friend_list_reflects_presence_mirror() {
        let state = test_state();
        seed_user(&state, "alice@x.com", "alice", "Alice");
        seed_user(&state, "bob@x.com", "bob", "Bob");
        let request_id = send(&state, "alice@x.com", "bob").await.unwrap();
        respond(
            State(state.clone()),
            Path(request_id),
            respond_body("bob@x.com", "accept"),
        )
        .await
        .unwrap();

        state
            .directory
            .set_presence("bob@x.com", true, chrono::Utc::now())
            .unwrap();

        let Json(view) = list_friends(State(state), Path("alice@x.com".into()))
            .await
            .unwrap();
        assert!(view.friends[0].is_online);
        assert!(view.friends[0].last_seen.is_some());
    }

    #[tokio::test]
    async fn test_remove_friend_validation() {
        let state = test_state();
        let missing = remove_friend(
            State(state),
            Json(RemoveFriendBody {
                user_id: Some("alice@x.com".into()),
                friend_id: None,
            }),
        )
        .await;
        assert!(matches!(missing, Err(Error::InvalidRequest(_))));
    }
}
