//! Server-sent event transport for stream sessions.
//!
//! Clients connect to `GET /f1-stream/` and receive one `data:` event per
//! envelope: the snapshot replay first, then live updates. Connector state
//! changes arrive as `event: status`. The response ends when the session
//! does, which is how the stop sentinel closes the stream server-side.

use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::Stream;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::ReceiverStream;
use tracing::warn;

use crate::session::{self, SessionEvent};
use crate::state::AppState;

/// Open an SSE stream session.
///
/// # Route
///
/// `GET /f1-stream/`
pub async fn f1_stream(State(state): State<Arc<AppState>>) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let events = ReceiverStream::new(session::open(&state, "sse"))
        .filter_map(|event| to_sse(&event))
        .map(Ok);

    Sse::new(events).keep_alive(KeepAlive::new().interval(state.config.keep_alive()))
}

fn to_sse(event: &SessionEvent) -> Option<Event> {
    match event.data() {
        Ok(data) => {
            let sse = Event::default().data(data);
            Some(match event.event_name() {
                Some(name) => sse.event(name),
                None => sse,
            })
        }
        Err(e) => {
            warn!("Failed to serialize stream event: {e}");
            None
        }
    }
}
