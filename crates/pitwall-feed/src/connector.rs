//! Upstream connection lifecycle.
//!
//! The connector walks `Disconnected -> Connecting -> Subscribing ->
//! Streaming` and back to `Disconnected` on any transport failure, waiting
//! out the [`Backoff`] delay before the next attempt. It never touches the
//! store or the bus: raw frames and state transitions both go onto the
//! internal queue, and the pipeline is the single consumer.

use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use pitwall_core::config::FeedConfig;
use pitwall_core::{Shutdown, ShutdownListener};
use pitwall_types::FeedState;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use crate::backoff::Backoff;
use crate::error::FeedError;
use crate::handshake::{FeedSocket, Handshake};
use crate::watchdog::ActivityTracker;

/// One item on the internal queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedFrame {
    /// A raw text frame as received.
    Text(String),
    /// The connector entered a new state.
    State(FeedState),
}

/// Build the hub subscription message.
pub fn subscribe_message(hub: &str, topics: &[String]) -> String {
    serde_json::json!({
        "H": hub,
        "M": "Subscribe",
        "A": [topics],
        "I": 1,
    })
    .to_string()
}

/// Owns the upstream socket and the reconnect loop.
pub struct Connector {
    handshake: Handshake,
    subscribe: String,
    connect_timeout: Duration,
    backoff: Backoff,
    queue: mpsc::Sender<FeedFrame>,
    activity: Arc<ActivityTracker>,
    shutdown: Shutdown,
    http: reqwest::Client,
}

impl Connector {
    /// Create a connector that feeds `queue`.
    pub fn new(
        config: &FeedConfig,
        backoff: Backoff,
        queue: mpsc::Sender<FeedFrame>,
        activity: Arc<ActivityTracker>,
        shutdown: Shutdown,
    ) -> Self {
        Self {
            handshake: Handshake::from_config(config),
            subscribe: subscribe_message(&config.hub, &config.topics),
            connect_timeout: config.connect_timeout(),
            backoff,
            queue,
            activity,
            shutdown,
            http: reqwest::Client::new(),
        }
    }

    /// Connect, stream and reconnect until the stop signal fires.
    ///
    /// Transport and negotiation failures are retried forever. Only a
    /// closed internal queue ends the loop with an error.
    pub async fn run(mut self) -> Result<(), FeedError> {
        let mut stop = self.shutdown.listener();
        info!(mode = self.handshake.mode(), "Feed connector starting");

        let result = loop {
            match self.session(&mut stop).await {
                Ok(()) => break Ok(()),
                Err(err) if err.is_retryable() => {
                    self.transition(FeedState::Disconnected, &mut stop).await;
                    let delay = self.backoff.next_delay();
                    warn!(
                        error = %err,
                        attempt = self.backoff.failures(),
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        "Feed connection lost, retrying"
                    );
                    tokio::select! {
                        _ = stop.wait() => break Ok(()),
                        () = tokio::time::sleep(delay) => {}
                    }
                }
                Err(err) => break Err(err),
            }
        };

        self.transition(FeedState::Disconnected, &mut stop).await;
        info!("Feed connector stopped");
        result
    }

    /// One connection attempt. `Ok(())` means the stop signal ended it.
    async fn session(&mut self, stop: &mut ShutdownListener) -> Result<(), FeedError> {
        self.transition(FeedState::Connecting, stop).await;
        let connected = tokio::select! {
            _ = stop.wait() => None,
            socket = self.handshake.connect(&self.http, self.connect_timeout) => Some(socket),
        };
        let Some(socket) = connected else {
            return Ok(());
        };
        let mut socket = socket?;

        self.transition(FeedState::Subscribing, stop).await;
        socket.send(Message::text(self.subscribe.clone())).await?;
        debug!(message = %self.subscribe, "Subscription sent");

        self.transition(FeedState::Streaming, stop).await;
        self.backoff.reset();
        info!("Feed streaming");

        loop {
            let received = tokio::select! {
                _ = stop.wait() => None,
                message = socket.next() => Some(message),
            };
            let Some(message) = received else {
                self.close(socket, stop).await;
                return Ok(());
            };

            let text = match message {
                Some(Ok(Message::Text(text))) => text.as_str().to_owned(),
                Some(Ok(Message::Binary(bytes))) => String::from_utf8_lossy(&bytes).into_owned(),
                Some(Ok(Message::Ping(payload))) => {
                    socket.send(Message::Pong(payload)).await?;
                    continue;
                }
                Some(Ok(Message::Pong(_) | Message::Frame(_))) => continue,
                Some(Ok(Message::Close(frame))) => {
                    return Err(FeedError::Transport(format!("upstream closed the socket: {frame:?}")));
                }
                Some(Err(err)) => return Err(err.into()),
                None => return Err(FeedError::Transport("upstream stream ended".to_owned())),
            };

            self.activity.observe(&text);
            let queued = tokio::select! {
                _ = stop.wait() => None,
                sent = self.queue.send(FeedFrame::Text(text)) => Some(sent),
            };
            match queued {
                Some(sent) => sent?,
                None => {
                    self.close(socket, stop).await;
                    return Ok(());
                }
            }
        }
    }

    async fn close(&self, mut socket: FeedSocket, stop: &mut ShutdownListener) {
        self.transition(FeedState::Closing, stop).await;
        if let Err(err) = socket.close(None).await {
            debug!(error = %err, "Feed socket close failed");
        }
    }

    /// Queue a state change behind any frames already waiting.
    ///
    /// Waits for room like a frame does; gives up only once the stop signal
    /// fires, since the pipeline records `Disconnected` itself on exit.
    async fn transition(&self, state: FeedState, stop: &mut ShutdownListener) {
        debug!(state = state.as_str(), "Feed connector state");
        let queued = tokio::select! {
            biased;
            sent = self.queue.send(FeedFrame::State(state)) => Some(sent),
            _ = stop.wait() => None,
        };
        match queued {
            Some(Ok(())) => {}
            Some(Err(err)) => debug!(state = state.as_str(), error = %err, "State change not queued"),
            None => debug!(state = state.as_str(), "State change dropped at shutdown"),
        }
    }
}
