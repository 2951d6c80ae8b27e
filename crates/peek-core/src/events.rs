//! Outbound stream event envelope.
//!
//! Every message pushed to a viewer is one of these variants, serialized as
//! a JSON object whose `type` field discriminates. Frame payloads use
//! `frame_number` on the wire (not `seq`) for compatibility with existing
//! viewer clients.

use crate::frame::{Frame, FrameMetadata, unix_millis};
use serde::{Deserialize, Serialize};

/// One server-pushed event on a live stream.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// A screencast frame.
    Frame {
        /// Base64-encoded PNG bytes.
        data: String,
        /// Per-task sequence number, starting at 1.
        frame_number: u64,
        /// Capture timestamp, Unix milliseconds.
        timestamp: u64,
        /// Capture dimensions, when reported.
        #[serde(skip_serializing_if = "Option::is_none")]
        metadata: Option<FrameMetadata>,
    },
    /// Human-readable lifecycle notice (stream started, not ready, ended).
    Status {
        /// What happened.
        message: String,
        /// URL of the tab being streamed, when known.
        #[serde(skip_serializing_if = "Option::is_none")]
        tab_url: Option<String>,
        /// Title of the tab being streamed, when known.
        #[serde(skip_serializing_if = "Option::is_none")]
        tab_title: Option<String>,
    },
    /// Terminal failure; the stream closes after this event.
    Error {
        /// Human-readable description.
        message: String,
    },
    /// Emitted when no frame arrived within the keepalive window.
    Keepalive {
        /// Emission timestamp, Unix milliseconds.
        timestamp: u64,
    },
}

impl StreamEvent {
    /// Frame event from a sequenced [`Frame`].
    #[must_use]
    pub fn frame(frame: &Frame) -> Self {
        Self::Frame {
            data: frame.data.clone(),
            frame_number: frame.seq,
            timestamp: frame.timestamp,
            metadata: frame.metadata,
        }
    }

    /// Status event with no tab attribution.
    #[must_use]
    pub fn status(message: impl Into<String>) -> Self {
        Self::Status {
            message: message.into(),
            tab_url: None,
            tab_title: None,
        }
    }

    /// Error event.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    /// Keepalive event stamped with the current time.
    #[must_use]
    pub fn keepalive() -> Self {
        Self::Keepalive {
            timestamp: unix_millis(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::TaskId;

    #[test]
    fn frame_event_wire_shape() {
        let frame = Frame {
            task_id: TaskId::from("t-1"),
            seq: 7,
            data: "cGl4ZWxz".to_owned(),
            timestamp: 1_700_000_000_123,
            metadata: Some(FrameMetadata {
                width: Some(1920),
                height: Some(1080),
            }),
        };
        let json = serde_json::to_value(StreamEvent::frame(&frame)).unwrap();
        assert_eq!(json["type"], "frame");
        assert_eq!(json["frame_number"], 7);
        assert_eq!(json["data"], "cGl4ZWxz");
        assert_eq!(json["timestamp"], 1_700_000_000_123_u64);
        assert_eq!(json["metadata"]["width"], 1920);
        assert_eq!(json["metadata"]["height"], 1080);
        // The internal field name never leaks to the wire.
        assert!(json.get("seq").is_none());
    }

    #[test]
    fn status_event_omits_absent_tab_fields() {
        let json = serde_json::to_value(StreamEvent::status("live stream started")).unwrap();
        assert_eq!(json["type"], "status");
        assert_eq!(json["message"], "live stream started");
        assert!(json.get("tab_url").is_none());
        assert!(json.get("tab_title").is_none());
    }

    #[test]
    fn status_event_with_tab() {
        let ev = StreamEvent::Status {
            message: "live stream started".to_owned(),
            tab_url: Some("https://jobs.example.com/apply".to_owned()),
            tab_title: Some("Apply".to_owned()),
        };
        let json = serde_json::to_value(ev).unwrap();
        assert_eq!(json["tab_url"], "https://jobs.example.com/apply");
        assert_eq!(json["tab_title"], "Apply");
    }

    #[test]
    fn error_event_wire_shape() {
        let json = serde_json::to_value(StreamEvent::error("browser connection closed")).unwrap();
        assert_eq!(json["type"], "error");
        assert_eq!(json["message"], "browser connection closed");
    }

    #[test]
    fn keepalive_carries_timestamp() {
        let json = serde_json::to_value(StreamEvent::keepalive()).unwrap();
        assert_eq!(json["type"], "keepalive");
        assert!(json["timestamp"].as_u64().unwrap() > 1_577_836_800_000);
    }

    #[test]
    fn deserializes_by_type_tag() {
        let ev: StreamEvent =
            serde_json::from_str(r#"{"type":"frame","data":"eA==","frame_number":1,"timestamp":5}"#)
                .unwrap();
        match ev {
            StreamEvent::Frame {
                frame_number,
                metadata,
                ..
            } => {
                assert_eq!(frame_number, 1);
                assert!(metadata.is_none());
            }
            other => panic!("expected frame event, got {other:?}"),
        }
    }
}
