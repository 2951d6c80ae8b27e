//! Typed model of the CDP WebSocket traffic the relay speaks.
//!
//! Incoming JSON is decoded into [`CdpMessage`] once, at the socket edge,
//! so the session loop matches on variants instead of probing raw JSON for
//! field presence.

use peek_core::FrameMetadata;
use serde_json::{Value, json};

/// Screencast capture parameters sent with `Page.startScreencast`.
#[derive(Clone, Copy, Debug)]
pub struct ScreencastParams {
    /// Image quality, 0-100.
    pub quality: u8,
    /// Maximum capture width.
    pub max_width: u32,
    /// Maximum capture height.
    pub max_height: u32,
    /// Capture every Nth frame.
    pub every_nth_frame: u32,
}

impl Default for ScreencastParams {
    fn default() -> Self {
        Self {
            quality: 80,
            max_width: 1920,
            max_height: 1080,
            every_nth_frame: 1,
        }
    }
}

/// An outgoing CDP command, serialized with an integer correlation id.
#[derive(Clone, Debug)]
pub struct CdpCommand {
    /// Correlation id echoed back in the reply.
    pub id: u64,
    method: &'static str,
    params: Value,
}

impl CdpCommand {
    /// `Page.enable`.
    #[must_use]
    pub fn page_enable(id: u64) -> Self {
        Self {
            id,
            method: "Page.enable",
            params: json!({}),
        }
    }

    /// `Page.startScreencast` (PNG capture).
    #[must_use]
    pub fn start_screencast(id: u64, params: &ScreencastParams) -> Self {
        Self {
            id,
            method: "Page.startScreencast",
            params: json!({
                "format": "png",
                "quality": params.quality,
                "maxWidth": params.max_width,
                "maxHeight": params.max_height,
                "everyNthFrame": params.every_nth_frame,
            }),
        }
    }

    /// `Page.screencastFrameAck`. Mandatory after every frame; the browser
    /// withholds the next frame until the previous one is acked.
    #[must_use]
    pub fn frame_ack(id: u64, session_id: &Value) -> Self {
        Self {
            id,
            method: "Page.screencastFrameAck",
            params: json!({ "sessionId": session_id }),
        }
    }

    /// `Page.stopScreencast`.
    #[must_use]
    pub fn stop_screencast(id: u64) -> Self {
        Self {
            id,
            method: "Page.stopScreencast",
            params: json!({}),
        }
    }

    /// Wire-format JSON text.
    #[must_use]
    pub fn encode(&self) -> String {
        json!({
            "id": self.id,
            "method": self.method,
            "params": self.params,
        })
        .to_string()
    }
}

/// One decoded incoming CDP message.
#[derive(Clone, Debug)]
pub enum CdpMessage {
    /// Successful reply to a command we sent.
    Reply {
        /// The command's correlation id.
        id: u64,
    },
    /// Error reply to a command we sent.
    ReplyError {
        /// The command's correlation id.
        id: u64,
        /// The browser's error message.
        message: String,
    },
    /// A `Page.screencastFrame` event.
    ScreencastFrame {
        /// Base64-encoded image bytes.
        data: String,
        /// Opaque ack token; CDP sends an integer here, other fields vary
        /// by browser version, so it is echoed back verbatim.
        session_id: Value,
        /// Capture dimensions, when reported.
        metadata: Option<FrameMetadata>,
    },
    /// Any other event.
    Event {
        /// The event's method name.
        method: String,
    },
}

impl CdpMessage {
    /// Decode one WebSocket text payload. `None` for unparseable input or
    /// messages that are neither replies nor events.
    #[must_use]
    pub fn decode(text: &str) -> Option<Self> {
        let value: Value = serde_json::from_str(text).ok()?;

        if let Some(id) = value.get("id").and_then(Value::as_u64) {
            if let Some(error) = value.get("error") {
                let message = error
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown CDP error")
                    .to_owned();
                return Some(Self::ReplyError { id, message });
            }
            return Some(Self::Reply { id });
        }

        let method = value.get("method").and_then(Value::as_str)?;
        if method == "Page.screencastFrame" {
            let params = value.get("params")?;
            let data = params.get("data").and_then(Value::as_str)?.to_owned();
            let session_id = params.get("sessionId").cloned().unwrap_or(Value::Null);
            let metadata = params.get("metadata").map(|meta| FrameMetadata {
                width: meta
                    .get("screenWidth")
                    .and_then(Value::as_f64)
                    .map(|w| w as u32),
                height: meta
                    .get("screenHeight")
                    .and_then(Value::as_f64)
                    .map(|h| h as u32),
            });
            return Some(Self::ScreencastFrame {
                data,
                session_id,
                metadata,
            });
        }

        Some(Self::Event {
            method: method.to_owned(),
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
