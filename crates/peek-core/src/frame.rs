//! Captured screencast frames.

use crate::ids::TaskId;
use serde::{Deserialize, Serialize};

/// Current Unix time in milliseconds.
#[must_use]
pub fn unix_millis() -> u64 {
    let ms = chrono::Utc::now().timestamp_millis();
    u64::try_from(ms).unwrap_or(0)
}

/// Capture dimensions reported by the browser alongside a frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameMetadata {
    /// Viewport width in pixels, when reported.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    /// Viewport height in pixels, when reported.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
}

/// One captured screencast frame, already sequence-numbered.
///
/// `data` is the base64-encoded PNG exactly as the browser produced it, so
/// the bytes are decoded once (for disk) and forwarded verbatim to viewers.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Frame {
    /// The task this frame belongs to.
    pub task_id: TaskId,
    /// Sequence number, starting at 1 with no gaps per task.
    pub seq: u64,
    /// Base64-encoded PNG bytes.
    pub data: String,
    /// Capture timestamp, Unix milliseconds.
    pub timestamp: u64,
    /// Capture dimensions, when the browser reported them.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<FrameMetadata>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
