//! Core data path of the pitwall live timing relay.
//!
//! Everything here is synchronous and bounded except the bus receiver and
//! the shutdown listener, which are the only suspension points.
//!
//! # Modules
//!
//! - [`dialect`] -- Repair of the upstream feed's non-compliant JSON dialect
//! - [`merge`] -- Deep merge over [`serde_json::Value`]
//! - [`laps`] -- Lap completion extraction from `TimingData` updates
//! - [`store`] -- [`StateStore`] contract and the in-memory implementation
//! - [`bus`] -- Broadcast bus between the pipeline and stream sessions
//! - [`shutdown`] -- Process-wide cooperative stop signal
//! - [`context`] -- The owned [`Context`] handed to every component
//! - [`config`] -- YAML configuration
//! - [`error`] -- Per-frame error types

pub mod bus;
pub mod config;
pub mod context;
pub mod dialect;
pub mod error;
pub mod laps;
pub mod merge;
pub mod shutdown;
pub mod store;

pub use bus::{BroadcastBus, BusMessage, BusReceiver, Published};
pub use config::{ConfigError, PitwallConfig};
pub use context::{Context, FeedStatus};
pub use error::CoreError;
pub use shutdown::{Shutdown, ShutdownListener, StopReason};
pub use store::{InMemoryStore, LapQuery, Snapshot, StateStore};
