//! Presence relay wire protocol.
//!
//! JSON events over WebSocket, tagged by `type`. Event and field names match
//! what the browser client already speaks.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ── Client → Relay ────────────────────────────────────────────────────────────

/// Events sent from a client to the relay.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ClientEvent {
    /// Claim an identity for this connection and mark it online.
    /// A connection may announce at any time; re-announcing re-broadcasts.
    UserOnline { user_id: String },

    /// Echo of a liveness probe, carrying the probe's original timestamp so
    /// the relay can compute the round trip.
    LatencyPong { client_timestamp: i64 },
}

// ── Relay → Client ────────────────────────────────────────────────────────────

/// Events sent from the relay to clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ServerEvent {
    /// Liveness probe; clients echo `ts` back in a `latency-pong`.
    LatencyPing { ts: i64 },

    /// A user's online status changed. Broadcast to every connection — the
    /// relay has no concept of relationship scoping.
    UserStatusChange {
        user_id: String,
        is_online: bool,
        last_seen: DateTime<Utc>,
    },
}
