//! Relay binary for the pitwall live timing relay.
//!
//! Wires the upstream feed service and the downstream stream server
//! around one shared [`Context`] and runs until a stop is triggered by
//! Ctrl-C, the inactivity watchdog, or a fatal connector error.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `$PITWALL_CONFIG` (default `pitwall-config.yaml`)
//! 2. Initialize structured logging (tracing)
//! 3. Create the shared context (in-memory store, bus, stop signal)
//! 4. Bind and spawn the stream server
//! 5. Start the feed service (connector, watchdog, pipeline)
//! 6. Wait for a stop, then join every task

mod error;

use std::path::PathBuf;
use std::sync::Arc;

use pitwall_core::config::{LoggingConfig, PitwallConfig};
use pitwall_core::{Context, StopReason};
use pitwall_feed::FeedService;
use pitwall_stream::startup::spawn_stream_server;
use pitwall_stream::state::AppState;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::error::EngineError;

/// Environment variable naming the configuration file.
const CONFIG_PATH_ENV: &str = "PITWALL_CONFIG";

/// Configuration file used when `PITWALL_CONFIG` is unset.
const DEFAULT_CONFIG_PATH: &str = "pitwall-config.yaml";

/// Application entry point for the relay.
///
/// # Errors
///
/// Returns an error if configuration or startup fails, or if the feed
/// stops because of an unrecoverable failure.
#[tokio::main]
async fn main() -> Result<(), EngineError> {
    // 1. Load configuration. Logging is not up yet, so errors surface
    //    through the returned error.
    let config_path = config_path();
    let config = PitwallConfig::load(&config_path)?;

    // 2. Initialize structured logging.
    init_logging(&config.logging)?;
    info!(
        config = %config_path.display(),
        feed_url = %config.feed.url,
        topics = config.feed.topics.len(),
        bind = %format!("{}:{}", config.stream.host, config.stream.port),
        "pitwall-engine starting"
    );

    // 3. Shared context.
    let ctx = Context::in_memory(config.bus.capacity);

    // 4. Stream server.
    let state = Arc::new(AppState::new(ctx.clone(), config.stream.clone()));
    let server = spawn_stream_server(state).await?;
    info!(addr = %server.addr, "Stream server listening");

    // 5. Feed service.
    let feed = FeedService::start(&ctx, &config);

    {
        let shutdown = ctx.shutdown.clone();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    info!("Ctrl-C received, stopping");
                    shutdown.trigger(StopReason::Requested);
                }
                Err(e) => warn!(error = %e, "Failed to listen for Ctrl-C"),
            }
        });
    }

    // 6. Wait for the stop and drain.
    let reason = feed.join().await;
    server.handle.await.map_err(|e| EngineError::StreamTask {
        message: format!("{e}"),
    })?;

    info!(reason = reason.as_str(), "pitwall-engine shutdown complete");

    match reason {
        StopReason::Failed => Err(EngineError::Feed { reason }),
        StopReason::Requested | StopReason::Inactivity => Ok(()),
    }
}

/// Resolve the configuration file path from the environment.
fn config_path() -> PathBuf {
    std::env::var_os(CONFIG_PATH_ENV).map_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH), PathBuf::from)
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over the configured level.
fn init_logging(logging: &LoggingConfig) -> Result<(), EngineError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);

    let installed = if logging.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    installed.map_err(|e| EngineError::Logging {
        message: format!("{e}"),
    })
}
