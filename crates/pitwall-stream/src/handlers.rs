//! REST endpoint handlers for the stream server.
//!
//! All handlers read from the shared [`StateStore`](pitwall_core::StateStore)
//! and connector status through [`AppState`]; none of them write.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET` | `/` | Minimal HTML status page |
//! | `GET` | `/api/status` | Connector state and relay counters |
//! | `GET` | `/api/topics` | Names of all known topics |
//! | `GET` | `/api/topics/{topic}` | Latest envelope for one topic |
//! | `GET` | `/api/laps` | Page through the lap log |

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::response::{Html, IntoResponse};
use chrono::{DateTime, Utc};
use pitwall_core::store::{DEFAULT_LAP_LIMIT, LapQuery, MAX_LAP_LIMIT};
use pitwall_types::{Envelope, FeedState, LapRecord, Topic};
use serde::Serialize;

use crate::error::StreamError;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Query parameter and response structs
// ---------------------------------------------------------------------------

/// Query parameters for the `GET /api/laps` endpoint.
#[derive(Debug, serde::Deserialize)]
pub struct LapsQuery {
    /// Matching laps to skip (default 0).
    pub offset: Option<usize>,
    /// Maximum number of laps to return (default 100, max 1000).
    pub limit: Option<usize>,
    /// Only laps for this racing number.
    pub racing_number: Option<String>,
}

/// Body of `GET /api/status`.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    /// Last known connector state.
    pub feed_state: FeedState,
    /// When that state was entered.
    pub feed_state_since: DateTime<Utc>,
    /// Newest upstream timestamp seen.
    pub last_source_time: Option<DateTime<Utc>>,
    /// Whether the relay has been told to stop.
    pub stopping: bool,
    /// Store revision.
    pub revision: u64,
    /// Number of known topics.
    pub topics: usize,
    /// Number of laps in the log.
    pub laps: usize,
    /// Open stream sessions.
    pub subscribers: usize,
}

/// Body of `GET /api/laps`.
#[derive(Debug, Serialize)]
pub struct LapsResponse {
    /// Offset applied.
    pub offset: usize,
    /// Limit applied, after clamping.
    pub limit: usize,
    /// Laps in the whole log.
    pub total: usize,
    /// The page, in insertion order.
    pub laps: Vec<LapRecord>,
}

// ---------------------------------------------------------------------------
// GET / -- minimal HTML status page
// ---------------------------------------------------------------------------

/// Serve a minimal HTML page with the relay state and links.
pub async fn index(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let feed = state.ctx.status.state();
    let topics = state.ctx.store.topics().len();
    let laps = state.ctx.store.lap_count();
    let subscribers = state.active_sessions();

    Html(format!(
        r#"<!DOCTYPE html>
<html>
<head><title>Pitwall</title></head>
<body>
  <h1>Pitwall live timing relay</h1>
  <p>Feed: <strong>{feed}</strong> | Topics: {topics} | Laps: {laps} | Subscribers: {subscribers}</p>
  <ul>
    <li><a href="/f1-stream/">/f1-stream/</a> -- SSE stream (snapshot then live)</li>
    <li><code>/ws/stream</code> -- WebSocket stream</li>
    <li><a href="/api/status">/api/status</a></li>
    <li><a href="/api/topics">/api/topics</a></li>
    <li><a href="/api/laps">/api/laps</a> -- ?offset=N&amp;limit=N&amp;racing_number=X</li>
  </ul>
</body>
</html>"#
    ))
}

// ---------------------------------------------------------------------------
// GET /api/status
// ---------------------------------------------------------------------------

/// Report connector state and relay counters.
pub async fn get_status(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    let status = &state.ctx.status;
    let store = &state.ctx.store;
    Json(StatusResponse {
        feed_state: status.state(),
        feed_state_since: status.since(),
        last_source_time: status.last_source_time(),
        stopping: state.ctx.shutdown.is_triggered(),
        revision: store.revision(),
        topics: store.topics().len(),
        laps: store.lap_count(),
        subscribers: state.active_sessions(),
    })
}

// ---------------------------------------------------------------------------
// Topics
// ---------------------------------------------------------------------------

/// List the names of all known topics.
pub async fn list_topics(State(state): State<Arc<AppState>>) -> Json<Vec<Topic>> {
    Json(state.ctx.store.topics())
}

/// Return the latest stored envelope for one topic.
pub async fn get_topic(
    State(state): State<Arc<AppState>>,
    Path(topic): Path<String>,
) -> Result<Json<Envelope>, StreamError> {
    let payload = state
        .ctx
        .store
        .get(&topic)
        .ok_or_else(|| StreamError::NotFound(format!("topic {topic}")))?;
    Ok(Json(Envelope::new(Topic::from(topic), payload)))
}

// ---------------------------------------------------------------------------
// GET /api/laps
// ---------------------------------------------------------------------------

/// Page through the lap log in insertion order.
///
/// # Query Parameters
///
/// - `offset`: Matching laps to skip.
/// - `limit`: Page size (default 100, clamped to 1000).
/// - `racing_number`: Restrict to one car.
pub async fn list_laps(
    State(state): State<Arc<AppState>>,
    Query(params): Query<LapsQuery>,
) -> Result<Json<LapsResponse>, StreamError> {
    let limit = params.limit.unwrap_or(DEFAULT_LAP_LIMIT);
    if limit == 0 {
        return Err(StreamError::InvalidQuery("limit must be at least 1".to_owned()));
    }

    let query = LapQuery {
        offset: params.offset.unwrap_or(0),
        limit: limit.min(MAX_LAP_LIMIT),
        racing_number: params.racing_number.filter(|n| !n.is_empty()),
    };
    let laps = state.ctx.store.list_laps(&query);

    Ok(Json(LapsResponse {
        offset: query.offset,
        limit: query.limit,
        total: state.ctx.store.lap_count(),
        laps,
    }))
}
