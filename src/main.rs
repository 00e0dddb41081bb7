//! QuestMate Server
//!
//! Friend and presence backend for the QuestMate focus app:
//!
//! 1. **Friend requests**: send / list / accept / reject / remove over a
//!    small JSON HTTP API, backed by SQLite. A pair of users has at most one
//!    relationship record; rejection deletes it so they can try again.
//!
//! 2. **Presence relay**: clients hold a WebSocket open and announce which
//!    user they are. Online/offline transitions are broadcast to every
//!    connection and mirrored onto the user record for HTTP readers.
//!
//! 3. **User directory**: profile upsert, username validation/claiming, and
//!    profile summaries — the identity layer the friend flow resolves
//!    usernames against.

mod db;
mod directory;
mod error;
mod friends;
mod handler;
mod presence;
mod protocol;

use axum::{
    extract::{State, WebSocketUpgrade},
    http::Method,
    response::IntoResponse,
    routing::{delete, get, post},
    Json, Router,
};
use clap::Parser;
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use db::Db;
use directory::store::Directory;
use friends::store::FriendStore;
use presence::PresenceTracker;

// ── CLI Arguments ─────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "questmate-server",
    version,
    about = "Friend and presence backend for QuestMate"
)]
struct Args {
    /// Port to listen on
    #[arg(short, long, default_value_t = 8080, env = "QUESTMATE_PORT")]
    port: u16,

    /// SQLite database path (":memory:" for an ephemeral store)
    #[arg(long, default_value = "questmate.db", env = "QUESTMATE_DB")]
    database: String,

    /// Liveness probe interval in seconds
    #[arg(long, default_value_t = 5, env = "PING_INTERVAL_SECS")]
    ping_interval_secs: u64,
}

// ── Shared State ──────────────────────────────────────────────────────────────

/// Runtime configuration shared with handlers.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub ping_interval_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            ping_interval_secs: 5,
        }
    }
}

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub directory: Directory,
    pub friends: FriendStore,
    pub presence: PresenceTracker,
    pub config: ServerConfig,
}

// ── Entry Point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "questmate_server=info,tower_http=info".into()),
        )
        .init();

    let args = Args::parse();

    // The store connection is established once, before the listener binds.
    let db = if args.database == ":memory:" {
        Db::open_in_memory()
    } else {
        Db::open(&args.database)
    }
    .expect("database");
    tracing::info!(database = args.database.as_str(), "Database ready");

    let state = AppState {
        directory: Directory::new(db.clone()),
        friends: FriendStore::new(db),
        presence: PresenceTracker::new(),
        config: ServerConfig {
            ping_interval_secs: args.ping_interval_secs,
        },
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE])
        .allow_headers(Any);

    let app = router(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    let addr = format!("0.0.0.0:{}", args.port);
    tracing::info!("QuestMate server starting on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind address");

    axum::serve(listener, app).await.expect("Server error");
}

// ── Router ────────────────────────────────────────────────────────────────────

fn router(state: AppState) -> Router {
    Router::new()
        .route("/friend-requests", post(friends::api::send_request))
        // GET takes a userId, PATCH a requestId — one route, two readings.
        .route(
            "/friend-requests/:param",
            get(friends::api::list_received).patch(friends::api::respond),
        )
        .route("/friends", delete(friends::api::remove_friend))
        .route("/friends/:user_id", get(friends::api::list_friends))
        .route("/users/upsert", post(directory::api::upsert))
        .route("/users/check-username", get(directory::api::check_username))
        .route("/users/summary/:user_id", get(directory::api::summary))
        .route("/ws", get(ws_handler))
        .route("/health", get(health_handler))
        .route("/stats", get(stats_handler))
        .with_state(state)
}

// ── Route Handlers ────────────────────────────────────────────────────────────

/// WebSocket upgrade handler for presence connections.
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handler::handle_socket(socket, state))
}

/// Health check endpoint.
async fn health_handler() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "questmate-server",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Socket metrics snapshot.
async fn stats_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.presence.snapshot())
}

// ── Test Support ──────────────────────────────────────────────────────────────


#[cfg(test)]
mod tests {
    use super::*;
    use test_support::test_state;

    #[test]
    fn test_health_json_structure() {
        let json_val = json!({
            "status": "ok",
            "service": "questmate-server",
            "version": env!("CARGO_PKG_VERSION"),
        });
        assert_eq!(json_val["status"], "ok");
        assert_eq!(json_val["service"], "questmate-server");
    }

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.ping_interval_secs, 5);
    }

    #[test]
    fn test_router_builds() {
        let _ = router(test_state());
    }

    #[tokio::test]
    async fn test_stats_snapshot_starts_empty() {
        let state = test_state();
        let snapshot = state.presence.snapshot();
        assert_eq!(snapshot.connections_total, 0);
        assert_eq!(snapshot.online_users, 0);
        assert!(snapshot.p95_latency_ms.is_none());
    }
}
