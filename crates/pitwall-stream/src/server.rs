//! Stream server lifecycle management.
//!
//! [`bind`] resolves and binds the listening socket; [`serve`] runs the
//! Axum server on it until the relay's stop signal fires, then lets open
//! streams finish (every session ends on the same signal).

use std::net::SocketAddr;
use std::sync::Arc;

use pitwall_core::ShutdownListener;
use pitwall_core::config::StreamConfig;
use tokio::net::TcpListener;
use tracing::info;

use crate::router::build_router;
use crate::state::AppState;

/// Errors that can occur when starting or running the stream server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Failed to bind to the network address.
    #[error("bind error: {0}")]
    Bind(String),

    /// The server encountered a fatal error while serving.
    #[error("serve error: {0}")]
    Serve(String),
}

/// Bind the listening socket described by `config`.
pub async fn bind(config: &StreamConfig) -> Result<TcpListener, ServerError> {
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .map_err(|e| ServerError::Bind(format!("invalid address: {e}")))?;

    TcpListener::bind(addr)
        .await
        .map_err(|e| ServerError::Bind(format!("bind failed on {addr}: {e}")))
}

/// Serve requests on `listener` until `stop` resolves.
pub async fn serve(
    listener: TcpListener,
    state: Arc<AppState>,
    mut stop: ShutdownListener,
) -> Result<(), ServerError> {
    let addr = listener
        .local_addr()
        .map_err(|e| ServerError::Bind(format!("no local address: {e}")))?;
    let router = build_router(state);

    info!(%addr, "Stream server listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            let reason = stop.wait().await;
            info!(reason = reason.as_str(), "Stream server shutting down");
        })
        .await
        .map_err(|e| ServerError::Serve(format!("serve error: {e}")))?;

    Ok(())
}
