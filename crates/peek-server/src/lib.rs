//! # peek-server
//!
//! The relay's HTTP surface: task submission and control, live SSE
//! streams, frame replay, health, and Prometheus metrics.
//!
//! The server owns the wiring between the browser layer and viewers: a
//! [`hub::StreamHub`] keeps at most one screencast session per task and
//! fans its frames out to any number of SSE subscribers.

#![deny(unsafe_code)]

pub mod config;
pub mod error;
pub mod health;
pub mod hub;
pub mod metrics;
pub mod routes;
pub mod server;
pub mod shutdown;
pub mod stream;

pub use config::RelayConfig;
pub use error::ApiError;
pub use hub::StreamHub;
pub use server::{AppState, RelayServer};
pub use shutdown::ShutdownCoordinator;
