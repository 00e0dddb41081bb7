//! Presence tracking and connection metrics.
//!
//! Owns the process-wide `user → connections` mapping and the per-connection
//! broadcast registry. The mapping is the sole source of truth for presence
//! membership: a user is online iff their connection set is non-empty. The
//! user row's `is_online` column is a best-effort mirror written by the
//! handler, not consulted here.
//!
//! Metrics (totals, durations, round-trip latencies, disconnect reasons) are
//! purely observational.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::protocol::ServerEvent;

/// Maximum retained round-trip samples.
const MAX_LATENCIES: usize = 1000;

/// Round-trip samples considered for the p95 snapshot.
const RECENT_LATENCIES: usize = 500;

/// Maximum retained connection durations and disconnect reasons.
const MAX_DISCONNECTS: usize = 200;

/// Disconnect reasons included in a snapshot.
const SNAPSHOT_REASONS: usize = 20;

/// A connected client's outbound channel.
pub type ClientSender = mpsc::UnboundedSender<ServerEvent>;

/// One entry in the disconnect log.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DisconnectEntry {
    pub reason: String,
    pub at: DateTime<Utc>,
}

/// Point-in-time metrics snapshot served by `/stats`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub connections_total: u64,
    pub disconnects_total: u64,
    pub current_connections: usize,
    pub online_users: usize,
    pub avg_connection_duration_ms: Option<u64>,
    pub p95_latency_ms: Option<u64>,
    pub disconnect_reasons: Vec<DisconnectEntry>,
}

/// Tracks which users are online and fans events out to every connection.
#[derive(Clone, Default)]
pub struct PresenceTracker {
    /// Normalized user id → connection ids currently announcing it.
    user_connections: Arc<DashMap<String, HashSet<Uuid>>>,

    /// Connection id → outbound channel, for broadcast.
    clients: Arc<DashMap<Uuid, ClientSender>>,

    /// Connection id → connect time, for duration metrics.
    connection_starts: Arc<DashMap<Uuid, DateTime<Utc>>>,

    connections_total: Arc<AtomicU64>,
    disconnects_total: Arc<AtomicU64>,
    durations_ms: Arc<Mutex<Vec<u64>>>,
    latencies_ms: Arc<Mutex<Vec<u64>>>,
    disconnect_reasons: Arc<Mutex<Vec<DisconnectEntry>>>,
}

fn push_bounded<T>(buffer: &mut Vec<T>, value: T, max: usize) {
    if buffer.len() >= max {
        buffer.remove(0);
    }
    buffer.push(value);
}

impl PresenceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Connection Lifecycle ──────────────────────────────────────────────

    /// Register a new connection and its outbound channel.
    /// Returns the assigned connection id.
    pub fn connect(&self, sender: ClientSender) -> Uuid {
        let conn_id = Uuid::new_v4();
        self.clients.insert(conn_id, sender);
        self.connection_starts.insert(conn_id, Utc::now());
        self.connections_total.fetch_add(1, Ordering::Relaxed);
        conn_id
    }

    /// Add a connection to a user's set, creating the set if absent.
    pub fn announce(&self, user_id: &str, conn_id: Uuid) {
        self.user_connections
            .entry(user_id.to_string())
            .or_default()
            .insert(conn_id);
    }

    /// Remove a connection. Returns the user that went offline, if this was
    /// their last connection.
    pub fn disconnect(&self, conn_id: Uuid, reason: &str) -> Option<String> {
        self.clients.remove(&conn_id);
        self.disconnects_total.fetch_add(1, Ordering::Relaxed);

        if let Some((_, started)) = self.connection_starts.remove(&conn_id) {
            let duration = (Utc::now() - started).num_milliseconds().max(0) as u64;
            push_bounded(&mut self.durations_ms.lock(), duration, MAX_DISCONNECTS);
        }
        push_bounded(
            &mut self.disconnect_reasons.lock(),
            DisconnectEntry {
                reason: reason.to_string(),
                at: Utc::now(),
            },
            MAX_DISCONNECTS,
        );

        // The map is keyed by user, not connection, so find the owning set
        // by linear scan.
        let mut now_offline = None;
        for mut entry in self.user_connections.iter_mut() {
            if entry.value_mut().remove(&conn_id) {
                if entry.value().is_empty() {
                    now_offline = Some(entry.key().clone());
                }
                break;
            }
        }

        if let Some(ref user_id) = now_offline {
            self.user_connections.remove(user_id);
        }
        now_offline
    }

    // ── Broadcast ─────────────────────────────────────────────────────────

    /// Send an event to every connected client. Channels whose receiver is
    /// already gone are skipped; their connections are mid-teardown.
    pub fn broadcast(&self, event: ServerEvent) {
        for entry in self.clients.iter() {
            let _ = entry.value().send(event.clone());
        }
    }

    // ── Queries ───────────────────────────────────────────────────────────

    /// Whether a user has at least one announced connection.
    pub fn is_online(&self, user_id: &str) -> bool {
        self.user_connections.contains_key(user_id)
    }

    /// Number of distinct users with a non-empty connection set.
    pub fn online_count(&self) -> usize {
        self.user_connections.len()
    }

    /// Number of open connections, announced or not.
    pub fn current_connections(&self) -> usize {
        self.clients.len()
    }

    // ── Metrics ───────────────────────────────────────────────────────────

    /// Record a round-trip sample from a probe echo. Clock-skewed negative
    /// samples are discarded.
    pub fn record_latency(&self, rtt_ms: i64) {
        if rtt_ms >= 0 {
            push_bounded(&mut self.latencies_ms.lock(), rtt_ms as u64, MAX_LATENCIES);
        }
    }

    /// Assemble a metrics snapshot for `/stats`.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let durations = self.durations_ms.lock();
        let avg_connection_duration_ms = if durations.is_empty() {
            None
        } else {
            Some(durations.iter().sum::<u64>() / durations.len() as u64)
        };
        drop(durations);

        let latencies = self.latencies_ms.lock();
        let recent_start = latencies.len().saturating_sub(RECENT_LATENCIES);
        let mut recent: Vec<u64> = latencies[recent_start..].to_vec();
        drop(latencies);
        recent.sort_unstable();
        let p95_latency_ms = if recent.is_empty() {
            None
        } else {
            let index = ((recent.len() as f64 * 0.95) as usize).min(recent.len() - 1);
            Some(recent[index])
        };

        let reasons = self.disconnect_reasons.lock();
        let reason_start = reasons.len().saturating_sub(SNAPSHOT_REASONS);
        let disconnect_reasons = reasons[reason_start..].to_vec();
        drop(reasons);

        MetricsSnapshot {
            connections_total: self.connections_total.load(Ordering::Relaxed),
            disconnects_total: self.disconnects_total.load(Ordering::Relaxed),
            current_connections: self.current_connections(),
            online_users: self.online_count(),
            avg_connection_duration_ms,
            p95_latency_ms,
            disconnect_reasons,
        }
    }
}
