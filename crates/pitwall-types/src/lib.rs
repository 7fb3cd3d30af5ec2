//! Shared type definitions for the pitwall live timing relay.
//!
//! These types cross every crate boundary in the workspace and are also
//! consumed by the dashboard frontend, so the wire-facing ones derive
//! `ts-rs` bindings.
//!
//! # Modules
//!
//! - [`ids`] -- Type-safe UUID wrappers (subscriber identities)
//! - [`envelope`] -- [`Topic`] and the [`Envelope`] unit stored and broadcast
//! - [`lap`] -- Derived [`LapEvent`] records and their stored form
//! - [`status`] -- Connector lifecycle states

pub mod envelope;
pub mod ids;
pub mod lap;
pub mod status;

pub use envelope::{Envelope, Topic};
pub use ids::SubscriberId;
pub use lap::{LapEvent, LapRecord};
pub use status::FeedState;
