//! The feed service: connector, watchdog and pipeline as one unit.
//!
//! [`FeedService::start`] and [`FeedHandle::stop`] are the only entry
//! points an external scheduler needs. All three tasks share the context's
//! stop signal, so a stop from any source (operator, watchdog, or a fatal
//! connector error) winds down the whole service.

use std::sync::Arc;

use pitwall_core::config::PitwallConfig;
use pitwall_core::{Context, Shutdown, StopReason};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::backoff::Backoff;
use crate::connector::Connector;
use crate::pipeline::{Pipeline, PipelineStats};
use crate::watchdog::{self, ActivityTracker, Watchdog};

/// Starts the ingest side of the relay.
#[derive(Debug, Clone, Copy)]
pub struct FeedService;

impl FeedService {
    /// Spawn the connector, watchdog and pipeline tasks.
    pub fn start(ctx: &Context, config: &PitwallConfig) -> FeedHandle {
        let (tx, rx) = mpsc::channel(config.pipeline.queue_capacity.max(1));
        let activity = Arc::new(ActivityTracker::new());
        let shutdown = ctx.shutdown.clone();

        let connector = Connector::new(
            &config.feed,
            Backoff::from_config(&config.reconnect),
            tx,
            Arc::clone(&activity),
            shutdown.clone(),
        );
        let connector = {
            let shutdown = shutdown.clone();
            tokio::spawn(async move {
                if let Err(err) = connector.run().await {
                    error!(error = %err, "Feed connector failed");
                    shutdown.trigger(StopReason::Failed);
                }
            })
        };

        let watchdog = tokio::spawn(watchdog::run(
            Watchdog::new(activity, config.watchdog.inactivity_timeout()),
            config.watchdog,
            shutdown.clone(),
        ));

        let pipeline = tokio::spawn(Pipeline::new(ctx.clone(), rx).run());

        info!(
            topics = config.feed.topics.len(),
            queue_capacity = config.pipeline.queue_capacity,
            "Feed service started"
        );

        FeedHandle {
            shutdown,
            connector,
            watchdog,
            pipeline,
        }
    }
}

/// Handle to a running feed service.
#[derive(Debug)]
pub struct FeedHandle {
    shutdown: Shutdown,
    connector: JoinHandle<()>,
    watchdog: JoinHandle<()>,
    pipeline: JoinHandle<PipelineStats>,
}

impl FeedHandle {
    /// Request a graceful stop. Idempotent.
    pub fn stop(&self) {
        self.shutdown.trigger(StopReason::Requested);
    }

    /// Wait for a stop from any source, then for every task to finish.
    pub async fn join(self) -> StopReason {
        let reason = self.shutdown.listener().wait().await;

        for (name, task) in [("connector", self.connector), ("watchdog", self.watchdog)] {
            if let Err(err) = task.await {
                error!(task = name, error = %err, "Feed task panicked");
            }
        }
        match self.pipeline.await {
            Ok(stats) => info!(frames = stats.frames, laps = stats.laps, "Feed service joined"),
            Err(err) => error!(task = "pipeline", error = %err, "Feed task panicked"),
        }

        info!(reason = reason.as_str(), "Feed service stopped");
        reason
    }
}
