//! Upstream live timing ingestion for the pitwall relay.
//!
//! The [`Connector`] owns the upstream WebSocket and pushes raw frames onto
//! a bounded queue. The [`Pipeline`] drains that queue, repairs and decodes
//! each frame, writes the store and publishes on the bus. The watchdog
//! stops everything once the feed has been silent for too long.
//!
//! # Modules
//!
//! - [`handshake`] -- Direct dial or `SignalR` negotiation and upgrade
//! - [`connector`] -- Connection state machine and reconnect loop
//! - [`backoff`] -- Exponential reconnect delay policy
//! - [`watchdog`] -- Inactivity detection
//! - [`frame`] -- Classification of decoded `R`/`M` frames
//! - [`pipeline`] -- Queue consumer applying frames to store and bus
//! - [`service`] -- Start/stop entry points tying the tasks together
//! - [`error`] -- [`FeedError`]

pub mod backoff;
pub mod connector;
pub mod error;
pub mod frame;
pub mod handshake;
pub mod pipeline;
pub mod service;
pub mod watchdog;

pub use backoff::Backoff;
pub use connector::{Connector, FeedFrame};
pub use error::FeedError;
pub use handshake::Handshake;
pub use pipeline::{Pipeline, PipelineStats};
pub use service::{FeedHandle, FeedService};
