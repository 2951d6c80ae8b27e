//! # peek-browser
//!
//! Per-task Chrome process supervision and CDP screencast streaming.
//!
//! Each automation task gets its own headless Chrome on its own debug port:
//!
//! - **Port allocation**: bind-and-release probing over a bounded range
//! - **Discovery**: `CHROME_PATH` override plus an ordered candidate list
//! - **Supervision**: spawn, readiness polling, idempotent teardown
//! - **Registry**: injectable concurrency-safe map of live task instances
//! - **Screencast**: CDP over WebSocket, frame-and-ack loop feeding a sink
//!
//! Chrome-dependent integration tests live behind the `browser-integration`
//! feature; everything else is covered by unit tests against fakes.

#![deny(unsafe_code)]

pub mod cdp;
pub mod chrome;
pub mod driver;
pub mod error;
pub mod port;
pub mod registry;
pub mod screencast;
pub mod supervisor;
pub mod tabs;

pub use driver::{AgentDriver, DriverError, NoopDriver};
pub use error::{LaunchError, RegistryError, StreamError};
pub use registry::{TaskRegistry, TaskSnapshot};
pub use screencast::ScreencastSession;
pub use supervisor::ProcessSupervisor;
