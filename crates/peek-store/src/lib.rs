//! # peek-store
//!
//! Frame persistence and replay.
//!
//! [`FrameSink`] is the single writer for a task's frames: it assigns
//! sequence numbers, persists each frame to disk, and fans the frame out to
//! live viewers over a bounded broadcast channel. [`ReplayStore`] is the
//! read-only view over the same directory layout after the fact.

#![deny(unsafe_code)]

pub mod error;
pub mod replay;
pub mod sink;

pub use error::StoreError;
pub use replay::{FrameEntry, ReplayStore};
pub use sink::FrameSink;
