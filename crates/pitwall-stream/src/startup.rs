//! Stream server startup helper for embedding in the engine binary.
//!
//! [`spawn_stream_server`] binds eagerly, so a bad address or a port in use
//! is reported to the caller before anything runs in the background, then
//! serves on a background Tokio task until the relay stops.
//!
//! # Usage
//!
//! ```rust,ignore
//! use pitwall_stream::startup::spawn_stream_server;
//! use pitwall_stream::state::AppState;
//! use std::sync::Arc;
//!
//! let state = Arc::new(AppState::new(ctx, config.stream.clone()));
//! let server = spawn_stream_server(state).await?;
//! // ... later, after the stop signal:
//! server.handle.await?;
//! ```

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::server::{self, ServerError};
use crate::state::AppState;

/// Errors that can occur when spawning the stream server.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    /// The server failed to bind or start.
    #[error("server start error: {0}")]
    Server(#[from] ServerError),
}

/// A stream server running in the background.
#[derive(Debug)]
pub struct RunningServer {
    /// The bound address (useful when the configured port is 0).
    pub addr: SocketAddr,
    /// The serving task; it finishes after the stop signal fires.
    pub handle: JoinHandle<()>,
}

/// Bind and spawn the stream server on a background task.
///
/// # Errors
///
/// Returns [`StartupError::Server`] if the address is invalid or cannot be
/// bound.
pub async fn spawn_stream_server(state: Arc<AppState>) -> Result<RunningServer, StartupError> {
    let listener = server::bind(&state.config).await?;
    let addr = listener
        .local_addr()
        .map_err(|e| ServerError::Bind(format!("no local address: {e}")))?;
    let stop = state.ctx.shutdown.listener();

    let handle = tokio::spawn(async move {
        if let Err(e) = server::serve(listener, state, stop).await {
            tracing::error!(error = %e, "Stream server exited with error");
        }
    });

    tracing::info!(%addr, "Stream server spawned on background task");

    Ok(RunningServer { addr, handle })
}
