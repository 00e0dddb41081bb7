//! Friend-request records and response views.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of a friend request. There is no rejected terminal
/// state — rejection deletes the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Accepted,
}

impl RequestStatus {
    /// Convert to the database string.
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Accepted => "accepted",
        }
    }

    /// Parse from the database string.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(RequestStatus::Pending),
            "accepted" => Some(RequestStatus::Accepted),
            _ => None,
        }
    }
}

/// A persisted friend-request row.
#[derive(Debug, Clone)]
pub struct FriendRequestRecord {
    pub id: String,
    pub requester_id: String,
    pub receiver_id: String,
    pub status: RequestStatus,
    pub created_at: DateTime<Utc>,
}

impl FriendRequestRecord {
    /// The party on the other side of the relationship from `user_id`.
    pub fn other_party(&self, user_id: &str) -> &str {
        if self.requester_id == user_id {
            &self.receiver_id
        } else {
            &self.requester_id
        }
    }
}

/// A pending request as listed for its receiver, enriched with the
/// requester's best-available display name.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingRequestView {
    pub id: String,
    pub requester_id: String,
    pub requester_username: String,
    pub receiver_id: String,
    pub status: RequestStatus,
    pub created_at: DateTime<Utc>,
}

/// A confirmed friend as listed for either party. Presence is the
/// point-in-time snapshot mirrored on the user row.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FriendView {
    pub id: String,
    pub username: String,
    pub is_online: bool,
    pub last_seen: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip() {
        assert_eq!(RequestStatus::parse("pending"), Some(RequestStatus::Pending));
        assert_eq!(
            RequestStatus::parse("accepted"),
            Some(RequestStatus::Accepted)
        );
        assert_eq!(RequestStatus::parse("rejected"), None);
        assert_eq!(RequestStatus::Pending.as_str(), "pending");
        assert_eq!(RequestStatus::Accepted.as_str(), "accepted");
    }

    #[test]
    fn test_status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&RequestStatus::Pending).unwrap(),
            "\"pending\""
        );
    }

    #[test]
    fn test_other_party() {
        let record = FriendRequestRecord {
            id: "r1".into(),
            requester_id: "alice@x.com".into(),
            receiver_id: "bob@x.com".into(),
            status: RequestStatus::Accepted,
            created_at: Utc::now(),
        };
        assert_eq!(record.other_party("alice@x.com"), "bob@x.com");
        assert_eq!(record.other_party("bob@x.com"), "alice@x.com");
    }
}
