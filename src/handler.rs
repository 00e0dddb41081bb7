//! WebSocket connection handler for the presence relay.
//!
//! Runs for the lifetime of one connection: a spawned sender task drains the
//! outbound channel onto the socket, a spawned probe task sends liveness
//! pings, and the receive loop processes client events until the connection
//! closes. Presence-map mutations happen synchronously in the event handler
//! before the store write, so the map and the broadcast never disagree about
//! ordering on a single connection.

use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use chrono::Utc;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::directory::types::normalize_user_id;
use crate::protocol::{ClientEvent, ServerEvent};
use crate::AppState;

/// Handle a single WebSocket connection.
pub async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut ws_sender, mut ws_receiver) = socket.split();

    // Outbound channel for this client: broadcasts and probes both land here.
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerEvent>();

    let conn_id = state.presence.connect(tx.clone());
    tracing::info!(connection = %conn_id, "Socket connected");

    // ── Sender Task ───────────────────────────────────────────────────────

    let sender_task = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            match serde_json::to_string(&event) {
                Ok(json) => {
                    if ws_sender.send(Message::Text(json)).await.is_err() {
                        break; // Connection closed
                    }
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to serialize server event");
                }
            }
        }
    });

    // ── Liveness Probes ───────────────────────────────────────────────────

    // One probe immediately (the first tick fires at once), then on the
    // configured interval. The client echoes each probe's timestamp back in
    // a latency-pong, producing a round-trip sample.
    let probe_tx = tx.clone();
    let probe_interval = state.config.ping_interval_secs;
    let probe_task = tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(probe_interval));
        loop {
            interval.tick().await;
            let probe = ServerEvent::LatencyPing {
                ts: Utc::now().timestamp_millis(),
            };
            if probe_tx.send(probe).is_err() {
                break; // Sender task is gone
            }
        }
    });

    // ── Receive Loop ──────────────────────────────────────────────────────

    let mut close_reason = "transport close".to_string();

    while let Some(msg_result) = ws_receiver.next().await {
        match msg_result {
            Ok(Message::Text(text)) => match serde_json::from_str::<ClientEvent>(&text) {
                Ok(event) => handle_client_event(&state, conn_id, event).await,
                Err(e) => {
                    tracing::warn!(
                        connection = %conn_id,
                        error = %e,
                        "Failed to parse client event"
                    );
                }
            },
            Ok(Message::Close(_)) => {
                close_reason = "client disconnect".to_string();
                break;
            }
            Ok(_) => {} // Binary, Ping, Pong — protocol pings are answered by axum
            Err(e) => {
                close_reason = e.to_string();
                break;
            }
        }
    }

    // ── Cleanup ───────────────────────────────────────────────────────────

    probe_task.abort();
    sender_task.abort();

    if let Some(user_id) = state.presence.disconnect(conn_id, &close_reason) {
        let last_seen = Utc::now();
        if let Err(e) = state.directory.set_presence(&user_id, false, last_seen) {
            tracing::error!(
                user = user_id.as_str(),
                error = %e,
                "Failed to persist offline status"
            );
        }
        state.presence.broadcast(ServerEvent::UserStatusChange {
            user_id: user_id.clone(),
            is_online: false,
            last_seen,
        });
        tracing::info!(user = user_id.as_str(), "User is now offline");
    }

    tracing::info!(connection = %conn_id, reason = close_reason.as_str(), "Socket disconnected");
}

/// Handle a parsed client event.
async fn handle_client_event(state: &AppState, conn_id: Uuid, event: ClientEvent) {
    match event {
        ClientEvent::UserOnline { user_id } => {
            let normalized = normalize_user_id(&user_id);
            if normalized.is_empty() {
                return;
            }

            // Map first, then mirror: the set is the source of truth and the
            // DB write is the suspension point.
            let already_online = state.presence.is_online(&normalized);
            state.presence.announce(&normalized, conn_id);

            let last_seen = Utc::now();
            if let Err(e) = state.directory.set_presence(&normalized, true, last_seen) {
                tracing::error!(
                    user = normalized.as_str(),
                    error = %e,
                    "Failed to persist online status"
                );
                return;
            }

            state.presence.broadcast(ServerEvent::UserStatusChange {
                user_id: normalized.clone(),
                is_online: true,
                last_seen,
            });
            tracing::info!(
                user = normalized.as_str(),
                already_online,
                "User is now online"
            );
        }

        ClientEvent::LatencyPong { client_timestamp } => {
            let rtt = Utc::now().timestamp_millis() - client_timestamp;
            state.presence.record_latency(rtt);
        }
    }
}
