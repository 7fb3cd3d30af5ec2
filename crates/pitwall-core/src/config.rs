//! Configuration loading and typed config structures for the relay.
//!
//! The configuration lives in `pitwall-config.yaml` at the project root.
//! Every field has a default, so an empty or missing file yields a working
//! setup pointed at the local replay simulator.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// The configuration parsed but holds an unusable value.
    #[error("invalid config: {0}")]
    Invalid(String),
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level relay configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PitwallConfig {
    /// Upstream feed connection.
    #[serde(default)]
    pub feed: FeedConfig,

    /// Reconnect backoff policy.
    #[serde(default)]
    pub reconnect: ReconnectConfig,

    /// Inactivity watchdog.
    #[serde(default)]
    pub watchdog: WatchdogConfig,

    /// Internal queue between connector and pipeline.
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Broadcast bus sizing.
    #[serde(default)]
    pub bus: BusConfig,

    /// Downstream stream server.
    #[serde(default)]
    pub stream: StreamConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl PitwallConfig {
    /// Load configuration from a YAML file, falling back to defaults when
    /// the file does not exist.
    ///
    /// Environment variables override YAML values:
    /// - `PITWALL_FEED_URL` overrides `feed.url`
    /// - `PITWALL_NEGOTIATE_URL` overrides `feed.negotiate_url`
    /// - `PITWALL_STREAM_HOST` overrides `stream.host`
    /// - `PITWALL_STREAM_PORT` overrides `stream.port`
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            Self::from_yaml(&contents)?
        } else {
            Self::default()
        };
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a YAML string without env overrides.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let config = Self::from_yaml(yaml)?;
        config.validate()?;
        Ok(config)
    }

    fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yml::from_str(yaml)?)
    }

    /// Override fields from `PITWALL_*` environment variables when set.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Ok(val) = std::env::var("PITWALL_FEED_URL") {
            self.feed.url = val;
        }
        if let Ok(val) = std::env::var("PITWALL_NEGOTIATE_URL") {
            self.feed.negotiate_url = Some(val).filter(|url| !url.is_empty());
        }
        if let Ok(val) = std::env::var("PITWALL_STREAM_HOST") {
            self.stream.host = val;
        }
        if let Ok(val) = std::env::var("PITWALL_STREAM_PORT") {
            self.stream.port = val
                .parse()
                .map_err(|e| ConfigError::Invalid(format!("PITWALL_STREAM_PORT={val}: {e}")))?;
        }
        Ok(())
    }

    /// Reject values the relay cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: &str| Err(ConfigError::Invalid(msg.to_owned()));

        if self.feed.url.trim().is_empty() {
            return invalid("feed.url must not be empty");
        }
        if self.feed.topics.is_empty() {
            return invalid("feed.topics must list at least one topic");
        }
        if self.feed.connect_timeout_ms == 0 {
            return invalid("feed.connect_timeout_ms must be positive");
        }
        if self.reconnect.initial_backoff_ms == 0 {
            return invalid("reconnect.initial_backoff_ms must be positive");
        }
        if self.reconnect.initial_backoff_ms > self.reconnect.max_backoff_ms {
            return invalid("reconnect.initial_backoff_ms exceeds reconnect.max_backoff_ms");
        }
        if self.watchdog.check_interval_ms == 0 || self.watchdog.inactivity_timeout_ms == 0 {
            return invalid("watchdog intervals must be positive");
        }
        if self.pipeline.queue_capacity == 0 {
            return invalid("pipeline.queue_capacity must be positive");
        }
        if self.bus.capacity == 0 {
            return invalid("bus.capacity must be positive");
        }
        if self.stream.keep_alive_secs == 0 {
            return invalid("stream.keep_alive_secs must be positive");
        }
        if self.stream.lap_batch_size == 0 || self.stream.subscriber_buffer == 0 {
            return invalid("stream.lap_batch_size and stream.subscriber_buffer must be positive");
        }
        Ok(())
    }
}

/// Upstream feed connection settings.
///
/// With `negotiate_url` set the connector performs the `SignalR` negotiation
/// before upgrading; without it `url` is dialled directly.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FeedConfig {
    /// WebSocket URL (direct mode) or WebSocket base URL (`SignalR` mode).
    #[serde(default = "default_feed_url")]
    pub url: String,

    /// HTTP base URL for the negotiation call.
    #[serde(default)]
    pub negotiate_url: Option<String>,

    /// Hub name used in negotiation and the subscribe message.
    #[serde(default = "default_hub")]
    pub hub: String,

    /// Topics to subscribe to.
    #[serde(default = "default_topics")]
    pub topics: Vec<String>,

    /// Timeout for the negotiation call and socket upgrade.
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

impl FeedConfig {
    /// Connect timeout as a [`Duration`].
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            url: default_feed_url(),
            negotiate_url: None,
            hub: default_hub(),
            topics: default_topics(),
            connect_timeout_ms: default_connect_timeout_ms(),
        }
    }
}

/// Reconnect backoff policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct ReconnectConfig {
    /// Delay after the first consecutive failure.
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    /// Upper bound on the delay.
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

/// Inactivity watchdog settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct WatchdogConfig {
    /// How often the watchdog checks for activity.
    #[serde(default = "default_check_interval_ms")]
    pub check_interval_ms: u64,

    /// Silence longer than this stops the service.
    #[serde(default = "default_inactivity_timeout_ms")]
    pub inactivity_timeout_ms: u64,
}

impl WatchdogConfig {
    /// Check interval as a [`Duration`].
    pub const fn check_interval(&self) -> Duration {
        Duration::from_millis(self.check_interval_ms)
    }

    /// Inactivity threshold as a [`Duration`].
    pub const fn inactivity_timeout(&self) -> Duration {
        Duration::from_millis(self.inactivity_timeout_ms)
    }
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self {
            check_interval_ms: default_check_interval_ms(),
            inactivity_timeout_ms: default_inactivity_timeout_ms(),
        }
    }
}

/// Internal queue settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct PipelineConfig {
    /// Frames buffered between connector and pipeline before the connector
    /// waits.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
        }
    }
}

/// Broadcast bus settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct BusConfig {
    /// Unread messages held per subscriber before the oldest are dropped.
    #[serde(default = "default_bus_capacity")]
    pub capacity: usize,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            capacity: default_bus_capacity(),
        }
    }
}

/// Stream server settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StreamConfig {
    /// Bind address.
    #[serde(default = "default_stream_host")]
    pub host: String,

    /// Bind port.
    #[serde(default = "default_stream_port")]
    pub port: u16,

    /// Lap events per `LapData` message during snapshot replay.
    #[serde(default = "default_lap_batch_size")]
    pub lap_batch_size: usize,

    /// SSE keep-alive comment interval.
    #[serde(default = "default_keep_alive_secs")]
    pub keep_alive_secs: u64,

    /// Outgoing messages buffered per session.
    #[serde(default = "default_subscriber_buffer")]
    pub subscriber_buffer: usize,
}

impl StreamConfig {
    /// Keep-alive interval as a [`Duration`].
    pub const fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.keep_alive_secs)
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            host: default_stream_host(),
            port: default_stream_port(),
            lap_batch_size: default_lap_batch_size(),
            keep_alive_secs: default_keep_alive_secs(),
            subscriber_buffer: default_subscriber_buffer(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive (overridden by `RUST_LOG`).
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Default value functions for serde
// ---------------------------------------------------------------------------

fn default_feed_url() -> String {
    "ws://127.0.0.1:8001/ws/f1-data".to_owned()
}

fn default_hub() -> String {
    "Streaming".to_owned()
}

fn default_topics() -> Vec<String> {
    [
        "TimingData",
        "SessionInfo",
        "DriverList",
        "LapCount",
        "TrackStatus",
        "RaceControlMessages",
        "WeatherData",
        "Heartbeat",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

const fn default_connect_timeout_ms() -> u64 {
    10_000
}

const fn default_initial_backoff_ms() -> u64 {
    1_000
}

const fn default_max_backoff_ms() -> u64 {
    60_000
}

const fn default_check_interval_ms() -> u64 {
    10_000
}

const fn default_inactivity_timeout_ms() -> u64 {
    60_000
}

const fn default_queue_capacity() -> usize {
    1024
}

const fn default_bus_capacity() -> usize {
    1024
}

fn default_stream_host() -> String {
    "0.0.0.0".to_owned()
}

const fn default_stream_port() -> u16 {
    8080
}

const fn default_lap_batch_size() -> usize {
    50
}

const fn default_keep_alive_secs() -> u64 {
    15
}

const fn default_subscriber_buffer() -> usize {
    256
}

fn default_log_level() -> String {
    "info".to_owned()
}
