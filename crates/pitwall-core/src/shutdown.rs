//! Process-wide cooperative stop signal.
//!
//! Every long-running loop holds a [`ShutdownListener`] and selects on
//! [`ShutdownListener::wait`] at each suspension point. The first
//! [`Shutdown::trigger`] wins; later triggers are ignored, so a stop fires
//! exactly once regardless of how many parties request it.

use std::sync::Arc;

use tokio::sync::watch;

/// Why the service is stopping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// An operator or the scheduler asked for a graceful stop.
    Requested,
    /// No meaningful upstream data arrived within the inactivity threshold.
    Inactivity,
    /// A task hit an unrecoverable failure.
    Failed,
}

impl StopReason {
    /// Lowercase name used in logs.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Requested => "requested",
            Self::Inactivity => "inactivity",
            Self::Failed => "failed",
        }
    }
}

/// Handle that can trigger a stop and hand out listeners.
#[derive(Debug, Clone)]
pub struct Shutdown {
    tx: Arc<watch::Sender<Option<StopReason>>>,
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

impl Shutdown {
    /// Create an untriggered signal.
    pub fn new() -> Self {
        let (tx, _) = watch::channel(None);
        Self { tx: Arc::new(tx) }
    }

    /// Request a stop. Returns `true` only for the call that actually
    /// triggered it.
    pub fn trigger(&self, reason: StopReason) -> bool {
        self.tx.send_if_modified(|current| {
            if current.is_some() {
                return false;
            }
            *current = Some(reason);
            true
        })
    }

    /// The reason the stop was triggered with, if it has been.
    pub fn reason(&self) -> Option<StopReason> {
        *self.tx.borrow()
    }

    /// Whether a stop has been triggered.
    pub fn is_triggered(&self) -> bool {
        self.reason().is_some()
    }

    /// A listener that resolves once the stop is triggered.
    pub fn listener(&self) -> ShutdownListener {
        ShutdownListener {
            rx: self.tx.subscribe(),
        }
    }
}

/// Awaitable side of a [`Shutdown`].
#[derive(Debug, Clone)]
pub struct ShutdownListener {
    rx: watch::Receiver<Option<StopReason>>,
}

impl ShutdownListener {
    /// Resolve with the stop reason once a stop is triggered.
    ///
    /// Resolves immediately if the stop already happened. Cancel-safe.
    pub async fn wait(&mut self) -> StopReason {
        loop {
            let current = *self.rx.borrow_and_update();
            if let Some(reason) = current {
                return reason;
            }
            if self.rx.changed().await.is_err() {
                return StopReason::Requested;
            }
        }
    }
}
