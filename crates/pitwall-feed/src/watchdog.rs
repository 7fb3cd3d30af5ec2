//! Inactivity watchdog.
//!
//! The connector stamps an [`ActivityTracker`] for every meaningful frame
//! (anything but the empty `{}` heartbeat). The watchdog task checks the
//! elapsed silence on a fixed interval; once it exceeds the threshold the
//! whole service is stopped, not merely reconnected, because a feed that
//! has gone quiet for that long means the session is over.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use pitwall_core::config::WatchdogConfig;
use pitwall_core::{Shutdown, StopReason};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, warn};

use crate::error::FeedError;

/// Whether a raw frame counts as upstream activity.
pub fn is_meaningful(frame: &str) -> bool {
    let trimmed = frame.trim();
    !trimmed.is_empty() && trimmed != "{}"
}

/// Time of the last meaningful upstream frame.
#[derive(Debug)]
pub struct ActivityTracker {
    last: Mutex<Instant>,
}

impl Default for ActivityTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ActivityTracker {
    /// A tracker that treats "now" as the last activity.
    pub fn new() -> Self {
        Self {
            last: Mutex::new(Instant::now()),
        }
    }

    /// Stamp activity at the current instant.
    pub fn record(&self) {
        *self.last.lock() = Instant::now();
    }

    /// Stamp activity if `frame` is meaningful. Returns whether it was.
    pub fn observe(&self, frame: &str) -> bool {
        let meaningful = is_meaningful(frame);
        if meaningful {
            self.record();
        }
        meaningful
    }

    /// Instant of the last recorded activity.
    pub fn last_activity(&self) -> Instant {
        *self.last.lock()
    }
}

/// Decides when silence has lasted too long. Fires at most once.
#[derive(Debug)]
pub struct Watchdog {
    activity: Arc<ActivityTracker>,
    threshold: Duration,
    fired: bool,
}

impl Watchdog {
    /// Watch `activity` for silences longer than `threshold`.
    pub const fn new(activity: Arc<ActivityTracker>, threshold: Duration) -> Self {
        Self {
            activity,
            threshold,
            fired: false,
        }
    }

    /// Silence as of `now`.
    pub fn idle_for(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.activity.last_activity())
    }

    /// Returns `true` the first time the silence as of `now` exceeds the
    /// threshold and `false` on every other call.
    pub fn check(&mut self, now: Instant) -> bool {
        if self.fired || self.idle_for(now) <= self.threshold {
            return false;
        }
        self.fired = true;
        true
    }

    /// Whether the watchdog has fired.
    pub const fn has_fired(&self) -> bool {
        self.fired
    }
}

/// Run the watchdog until it fires or the service stops.
///
/// On firing it triggers [`StopReason::Inactivity`].
pub async fn run(mut watchdog: Watchdog, config: WatchdogConfig, shutdown: Shutdown) {
    let mut stop = shutdown.listener();
    let mut ticker = tokio::time::interval(config.check_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            reason = stop.wait() => {
                debug!(reason = reason.as_str(), "Watchdog stopping");
                return;
            }
            _ = ticker.tick() => {
                let now = Instant::now();
                if watchdog.check(now) {
                    let timeout = FeedError::InactivityTimeout(watchdog.idle_for(now));
                    warn!(
                        error = %timeout,
                        threshold_ms = config.inactivity_timeout_ms,
                        "Stopping feed"
                    );
                    shutdown.trigger(StopReason::Inactivity);
                    return;
                }
            }
        }
    }
}
