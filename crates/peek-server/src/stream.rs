//! SSE rendering of a live stream.
//!
//! One publisher per viewer connection. The publisher never touches the
//! browser: it drains the subscription's broadcast receiver and turns each
//! event into a `data: <json>` SSE line, inserting keepalives when the
//! feed goes quiet.

use crate::hub::LiveStream;
use axum::response::Sse;
use axum::response::sse::Event;
use futures::Stream;
use peek_core::{StreamEvent, TaskStatus};
use std::convert::Infallible;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};

/// Turn a subscribe outcome into an SSE response.
pub fn sse_response(
    live: LiveStream,
    keepalive: Duration,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let events = publish(live, keepalive);
    let stream = async_stream::stream! {
        futures::pin_mut!(events);
        while let Some(event) = futures::StreamExt::next(&mut events).await {
            let json = match serde_json::to_string(&event) {
                Ok(json) => json,
                Err(err) => {
                    warn!(error = %err, "failed to serialize stream event");
                    continue;
                }
            };
            yield Ok(Event::default().data(json));
        }
    };
    Sse::new(stream)
}

/// The event sequence one viewer sees.
///
/// Ready streams open with a `status` event carrying the tab attribution,
/// then forward frames until the feed closes, emitting a `keepalive` when
/// nothing arrives within the window and ending after any `error` event.
/// Not-ready streams emit a single `status` and end; the client retries.
pub(crate) fn publish(
    live: LiveStream,
    keepalive: Duration,
) -> impl Stream<Item = StreamEvent> {
    async_stream::stream! {
        match live {
            LiveStream::NotReady(status) => {
                yield StreamEvent::status(not_ready_message(status));
            }
            LiveStream::Ready(mut sub) => {
                yield StreamEvent::Status {
                    message: "live stream started".to_owned(),
                    tab_url: Some(sub.tab_url.clone()),
                    tab_title: Some(sub.tab_title.clone()),
                };
                loop {
                    match tokio::time::timeout(keepalive, sub.events.recv()).await {
                        Err(_) => yield StreamEvent::keepalive(),
                        Ok(Ok(event)) => {
                            let terminal = matches!(event, StreamEvent::Error { .. });
                            yield event;
                            if terminal {
                                break;
                            }
                        }
                        Ok(Err(RecvError::Lagged(missed))) => {
                            debug!(missed, "viewer lagged, frames dropped");
                            metrics::counter!(crate::metrics::FRAMES_DROPPED_TOTAL)
                                .increment(missed);
                        }
                        Ok(Err(RecvError::Closed)) => break,
                    }
                }
                // Dropping the subscription here detaches the viewer.
            }
        }
    }
}

fn not_ready_message(status: TaskStatus) -> &'static str {
    match status {
        TaskStatus::NotStarted => "browser not started yet",
        TaskStatus::Starting => "browser is starting up, not ready to stream",
        TaskStatus::Running => "stream temporarily unavailable",
        TaskStatus::Failed => "browser failed",
        TaskStatus::Stopped => "browser stopped",
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
