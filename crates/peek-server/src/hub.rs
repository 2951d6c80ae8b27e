//! Per-task stream lifecycle and viewer bookkeeping.
//!
//! At most one screencast session exists per task, shared by every viewer.
//! The first subscriber opens it; the last one out (or task termination)
//! closes it.

use crate::error::ApiError;
use dashmap::DashMap;
use peek_browser::supervisor::debug_base_url;
use peek_browser::{ScreencastSession, TaskRegistry};
use peek_core::{StreamEvent, TaskId, TaskStatus};
use peek_store::FrameSink;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info};

struct TaskStream {
    session: ScreencastSession,
    sink: Arc<FrameSink>,
}

struct HubInner {
    registry: Arc<TaskRegistry>,
    frames_root: PathBuf,
    queue_capacity: usize,
    streams: DashMap<TaskId, Arc<TaskStream>>,
}

/// Outcome of a subscribe call.
pub enum LiveStream {
    /// The task exists but its browser is not `Running`; the viewer gets a
    /// single status event and the stream ends.
    NotReady(TaskStatus),
    /// A live subscription.
    Ready(StreamSubscription),
}

impl std::fmt::Debug for LiveStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotReady(status) => f.debug_tuple("NotReady").field(status).finish(),
            Self::Ready(_) => f.debug_tuple("Ready").finish_non_exhaustive(),
        }
    }
}

/// One viewer's attachment to a task stream.
///
/// Dropping the subscription detaches the viewer; the last detach closes
/// the underlying screencast session.
pub struct StreamSubscription {
    /// The viewer's event feed.
    pub events: broadcast::Receiver<StreamEvent>,
    /// URL of the tab being streamed.
    pub tab_url: String,
    /// Title of the tab being streamed.
    pub tab_title: String,
    _guard: Option<SubscriberGuard>,
}

impl StreamSubscription {
    #[cfg(test)]
    pub(crate) fn detached(
        events: broadcast::Receiver<StreamEvent>,
        tab_url: &str,
        tab_title: &str,
    ) -> Self {
        Self {
            events,
            tab_url: tab_url.to_owned(),
            tab_title: tab_title.to_owned(),
            _guard: None,
        }
    }
}

struct SubscriberGuard {
    inner: Arc<HubInner>,
    task_id: TaskId,
    stream: Arc<TaskStream>,
}

impl Drop for SubscriberGuard {
    fn drop(&mut self) {
        metrics::gauge!(crate::metrics::STREAM_VIEWERS_ACTIVE).decrement(1.0);
        let remaining = self.stream.session.release();
        if remaining == 0 {
            // Re-check under the map lock, and only remove the stream this
            // guard attached to: the map entry may already hold a
            // replacement opened after this session was cancelled.
            let removed = self.inner.streams.remove_if(&self.task_id, |_, stream| {
                Arc::ptr_eq(stream, &self.stream) && stream.session.subscriber_count() == 0
            });
            if removed.is_some() {
                debug!(task_id = %self.task_id, "stream closed, no viewers left");
            }
        }
    }
}

/// Shared stream registry, cheap to clone.
#[derive(Clone)]
pub struct StreamHub {
    inner: Arc<HubInner>,
}

impl StreamHub {
    /// A hub resolving ports through `registry` and persisting frames
    /// under `frames_root`.
    #[must_use]
    pub fn new(registry: Arc<TaskRegistry>, frames_root: PathBuf, queue_capacity: usize) -> Self {
        Self {
            inner: Arc::new(HubInner {
                registry,
                frames_root,
                queue_capacity,
                streams: DashMap::new(),
            }),
        }
    }

    /// Attach a viewer to a task's stream, opening the screencast session
    /// if this is the first viewer.
    ///
    /// Unknown task ids fail hard with `TaskNotFound`; there is no
    /// fallback instance to stream.
    pub async fn subscribe(&self, task_id: &TaskId) -> Result<LiveStream, ApiError> {
        let status = self.inner.registry.status(task_id)?;
        if status != TaskStatus::Running {
            return Ok(LiveStream::NotReady(status));
        }

        let stream = loop {
            let candidate =
                match self.inner.streams.get(task_id).map(|entry| Arc::clone(entry.value())) {
                    Some(stream) => stream,
                    None => self.open_stream(task_id).await?,
                };
            let count = candidate.session.retain();
            if !candidate.session.is_closed() {
                debug!(task_id = %task_id, viewers = count, "viewer attached");
                break candidate;
            }
            // Cancelled between lookup and attach: the previous last viewer
            // detached, or the task was stopped. Evict the dead entry so
            // the next pass opens a fresh session.
            let _ = candidate.session.release();
            let _ = self
                .inner
                .streams
                .remove_if(task_id, |_, stream| stream.session.is_closed());
        };
        metrics::gauge!(crate::metrics::STREAM_VIEWERS_ACTIVE).increment(1.0);

        Ok(LiveStream::Ready(StreamSubscription {
            events: stream.sink.subscribe(),
            tab_url: stream.session.tab_url().to_owned(),
            tab_title: stream.session.tab_title().to_owned(),
            _guard: Some(SubscriberGuard {
                inner: Arc::clone(&self.inner),
                task_id: task_id.clone(),
                stream,
            }),
        }))
    }

    async fn open_stream(&self, task_id: &TaskId) -> Result<Arc<TaskStream>, ApiError> {
        let port = self.inner.registry.port(task_id)?;
        let sink = Arc::new(FrameSink::new(
            task_id.clone(),
            &self.inner.frames_root,
            self.inner.queue_capacity,
        ));
        let session =
            ScreencastSession::open(task_id.clone(), &debug_base_url(port), Arc::clone(&sink))
                .await?;
        info!(task_id = %task_id, port, "screencast stream opened");

        let created = Arc::new(TaskStream { session, sink });
        let stored = self
            .inner
            .streams
            .entry(task_id.clone())
            .or_insert_with(|| Arc::clone(&created))
            .clone();
        // Lost a race with another first viewer: close the spare session.
        if !Arc::ptr_eq(&stored, &created) {
            created.session.close();
        }
        Ok(stored)
    }

    /// Tear down a task's stream regardless of viewers (task stop or
    /// daemon shutdown).
    pub fn close_task(&self, task_id: &TaskId) {
        if let Some((_, stream)) = self.inner.streams.remove(task_id) {
            stream.session.close();
            info!(task_id = %task_id, "stream closed");
        }
    }

    /// Close every open stream.
    pub fn close_all(&self) {
        let task_ids: Vec<TaskId> = self.inner.streams.iter().map(|e| e.key().clone()).collect();
        for task_id in task_ids {
            self.close_task(&task_id);
        }
    }

    /// Viewers attached across all tasks.
    #[must_use]
    pub fn viewer_count(&self) -> usize {
        self.inner
            .streams
            .iter()
            .map(|entry| entry.value().session.subscriber_count())
            .sum()
    }

    /// Number of open streams.
    #[must_use]
    pub fn stream_count(&self) -> usize {
        self.inner.streams.len()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
