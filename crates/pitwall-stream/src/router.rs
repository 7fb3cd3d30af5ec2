//! Axum router construction for the stream server.
//!
//! Assembles the stream transports and REST routes into a single
//! [`Router`] with CORS enabled for the dashboard.

use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;
use crate::{handlers, sse, ws};

/// Build the complete Axum router for the stream server.
///
/// The router includes:
/// - `GET /` -- minimal HTML status page
/// - `GET /f1-stream/` -- SSE stream (also without the trailing slash)
/// - `GET /ws/stream` -- `WebSocket` stream
/// - `GET /api/status` -- connector state and counters
/// - `GET /api/topics` -- known topic names
/// - `GET /api/topics/{topic}` -- one topic's latest envelope
/// - `GET /api/laps` -- lap log page
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Status page
        .route("/", get(handlers::index))
        // Stream transports
        .route("/f1-stream/", get(sse::f1_stream))
        .route("/f1-stream", get(sse::f1_stream))
        .route("/ws/stream", get(ws::ws_stream))
        // REST API
        .route("/api/status", get(handlers::get_status))
        .route("/api/topics", get(handlers::list_topics))
        .route("/api/topics/{topic}", get(handlers::get_topic))
        .route("/api/laps", get(handlers::list_laps))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
