//! # peek-core
//!
//! Foundation types for the browser session relay.
//!
//! This crate provides the shared vocabulary the relay crates depend on:
//!
//! - **Branded IDs**: `TaskId` as a newtype for type safety
//! - **Task status**: `TaskStatus` lifecycle enum with legal-transition checks
//! - **Frames**: `Frame` and `FrameMetadata`, one captured screencast image
//! - **Stream events**: `StreamEvent`, the JSON envelope pushed to viewers

#![deny(unsafe_code)]

pub mod events;
pub mod frame;
pub mod ids;
pub mod status;

pub use events::StreamEvent;
pub use frame::{Frame, FrameMetadata, unix_millis};
pub use ids::TaskId;
pub use status::TaskStatus;
