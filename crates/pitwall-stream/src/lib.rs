//! Stream server for the pitwall live timing relay.
//!
//! Serves each subscriber the current snapshot followed by the live tail
//! of the broadcast bus, over server-sent events or `WebSocket`, plus a
//! small read-only REST API over the state store.
//!
//! # Modules
//!
//! - [`session`] -- Snapshot replay and gap-free live tail per subscriber
//! - [`sse`] -- `GET /f1-stream/` transport
//! - [`ws`] -- `GET /ws/stream` transport
//! - [`handlers`] -- REST endpoints
//! - [`router`] -- Route assembly
//! - [`server`] / [`startup`] -- Binding and background serving
//! - [`state`] -- Shared [`AppState`](state::AppState)
//! - [`error`] -- REST error responses

pub mod error;
pub mod handlers;
pub mod router;
pub mod server;
pub mod session;
pub mod sse;
pub mod startup;
pub mod state;
pub mod ws;
