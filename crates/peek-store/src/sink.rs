//! Frame sink: sequence assignment, persistence, and live fan-out.

use crate::error::StoreError;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use peek_core::{Frame, FrameMetadata, StreamEvent, TaskId, unix_millis};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Default bound on the per-task broadcast channel. Receivers slower than
/// this many events behind lag and lose the oldest events; the producer
/// never blocks.
pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

/// Single writer for one task's frames.
///
/// Exactly one sink exists per streaming task, fed by the screencast
/// session's read loop, so sequence numbers are assigned from a single
/// producer: they start at 1, increment by exactly 1, and are never
/// reused. A sink created over an existing frame directory resumes after
/// the highest persisted sequence, so a reopened stream never overwrites
/// an earlier era's frames.
pub struct FrameSink {
    task_id: TaskId,
    dir: PathBuf,
    seq: AtomicU64,
    events: broadcast::Sender<StreamEvent>,
}

impl FrameSink {
    /// Create a sink storing frames under `<frames_root>/<task_id>/`.
    ///
    /// The directory is created on the first persisted frame, not here, so
    /// tasks that never produce a frame leave no directory behind. Frames
    /// already on disk from an earlier stream of the same task set the
    /// starting sequence.
    #[must_use]
    pub fn new(task_id: TaskId, frames_root: &Path, queue_capacity: usize) -> Self {
        let dir = frames_root.join(task_id.as_str());
        let (events, _) = broadcast::channel(queue_capacity.max(1));
        let seq = AtomicU64::new(last_persisted_seq(&dir));
        Self {
            task_id,
            dir,
            seq,
            events,
        }
    }

    /// The task this sink belongs to.
    #[must_use]
    pub fn task_id(&self) -> &TaskId {
        &self.task_id
    }

    /// Directory frames are persisted into.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Highest sequence number assigned so far (0 before the first frame).
    #[must_use]
    pub fn last_seq(&self) -> u64 {
        self.seq.load(Ordering::SeqCst)
    }

    /// Subscribe a new live viewer to this task's event feed.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<StreamEvent> {
        self.events.subscribe()
    }

    /// Ingest one captured frame: assign the next sequence number, persist
    /// it, then publish it to live viewers.
    ///
    /// Persistence failure is logged and counted but does not stop the
    /// frame from reaching viewers. `data` is the base64 payload exactly as
    /// the browser produced it.
    pub async fn accept(&self, data: String, metadata: Option<FrameMetadata>) -> Frame {
        let seq = self.seq.fetch_add(1, Ordering::SeqCst) + 1;
        let frame = Frame {
            task_id: self.task_id.clone(),
            seq,
            data,
            timestamp: unix_millis(),
            metadata,
        };

        if let Err(err) = self.persist(&frame).await {
            warn!(task_id = %self.task_id, seq, error = %err, "frame persist failed");
            metrics::counter!("frame_persist_failures_total").increment(1);
        }

        // Err here just means no live viewers right now.
        if self.events.send(StreamEvent::frame(&frame)).is_ok() {
            metrics::counter!("frames_relayed_total").increment(1);
        }
        debug!(task_id = %self.task_id, seq, "frame accepted");
        frame
    }

    /// Publish a terminal error to live viewers.
    pub fn publish_error(&self, message: impl Into<String>) {
        let _ = self.events.send(StreamEvent::error(message));
    }

    async fn persist(&self, frame: &Frame) -> Result<(), StoreError> {
        let bytes = BASE64
            .decode(frame.data.as_bytes())
            .map_err(|err| StoreError::Persist {
                task_id: self.task_id.to_string(),
                seq: frame.seq,
                source: std::io::Error::new(std::io::ErrorKind::InvalidData, err),
            })?;
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|source| StoreError::Persist {
                task_id: self.task_id.to_string(),
                seq: frame.seq,
                source,
            })?;
        let path = self.dir.join(format!("frame_{}.png", frame.seq));
        tokio::fs::write(&path, &bytes)
            .await
            .map_err(|source| StoreError::Persist {
                task_id: self.task_id.to_string(),
                seq: frame.seq,
                source,
            })
    }
}

/// Highest sequence number already persisted in `dir`, 0 when the
/// directory does not exist yet. Foreign files are ignored, matching the
/// replay listing.
fn last_persisted_seq(dir: &Path) -> u64 {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return 0;
    };
    entries
        .filter_map(Result::ok)
        .filter_map(|entry| crate::replay::parse_seq(entry.file_name().to_str()?))
        .max()
        .unwrap_or(0)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::broadcast::error::RecvError;

    fn b64(bytes: &[u8]) -> String {
        BASE64.encode(bytes)
    }

    fn sink_in(dir: &Path) -> FrameSink {
        FrameSink::new(TaskId::from("task-1"), dir, DEFAULT_QUEUE_CAPACITY)
    }

    #[tokio::test]
    async fn sequence_starts_at_one_and_has_no_gaps() {
        let tmp = tempfile::tempdir().unwrap();
        let sink = sink_in(tmp.path());

        for expected in 1..=5_u64 {
            let frame = sink.accept(b64(b"png-bytes"), None).await;
            assert_eq!(frame.seq, expected);
        }
        assert_eq!(sink.last_seq(), 5);
    }

    #[tokio::test]
    async fn frames_land_on_disk_named_by_sequence() {
        let tmp = tempfile::tempdir().unwrap();
        let sink = sink_in(tmp.path());

        let _ = sink.accept(b64(b"first"), None).await;
        let _ = sink.accept(b64(b"second"), None).await;

        let dir = tmp.path().join("task-1");
        assert_eq!(std::fs::read(dir.join("frame_1.png")).unwrap(), b"first");
        assert_eq!(std::fs::read(dir.join("frame_2.png")).unwrap(), b"second");
    }

    #[tokio::test]
    async fn no_directory_until_first_frame() {
        let tmp = tempfile::tempdir().unwrap();
        let sink = sink_in(tmp.path());
        assert!(!sink.dir().exists());
        let _ = sink.accept(b64(b"x"), None).await;
        assert!(sink.dir().exists());
    }

    #[tokio::test]
    async fn reopened_sink_resumes_numbering() {
        let tmp = tempfile::tempdir().unwrap();
        {
            let sink = sink_in(tmp.path());
            let _ = sink.accept(b64(b"era-one-1"), None).await;
            let _ = sink.accept(b64(b"era-one-2"), None).await;
        }

        // A second stream of the same task continues after the frames
        // already on disk instead of overwriting them.
        let sink = sink_in(tmp.path());
        assert_eq!(sink.last_seq(), 2);
        let frame = sink.accept(b64(b"era-two-3"), None).await;
        assert_eq!(frame.seq, 3);

        let dir = tmp.path().join("task-1");
        assert_eq!(std::fs::read(dir.join("frame_1.png")).unwrap(), b"era-one-1");
        assert_eq!(std::fs::read(dir.join("frame_2.png")).unwrap(), b"era-one-2");
        assert_eq!(std::fs::read(dir.join("frame_3.png")).unwrap(), b"era-two-3");
    }

    #[tokio::test]
    async fn foreign_files_do_not_affect_resume_point() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("task-1");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("frame_4.png"), b"old").unwrap();
        std::fs::write(dir.join("notes_9000.txt"), b"hi").unwrap();

        let sink = sink_in(tmp.path());
        let frame = sink.accept(b64(b"x"), None).await;
        assert_eq!(frame.seq, 5);
    }

    #[tokio::test]
    async fn subscribers_receive_frames_in_order() {
        let tmp = tempfile::tempdir().unwrap();
        let sink = sink_in(tmp.path());
        let mut rx = sink.subscribe();

        let _ = sink.accept(b64(b"a"), None).await;
        let _ = sink.accept(b64(b"b"), None).await;

        for expected in 1..=2_u64 {
            match rx.recv().await.unwrap() {
                StreamEvent::Frame { frame_number, .. } => assert_eq!(frame_number, expected),
                other => panic!("expected frame, got {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn invalid_base64_still_reaches_viewers() {
        let tmp = tempfile::tempdir().unwrap();
        let sink = sink_in(tmp.path());
        let mut rx = sink.subscribe();

        let frame = sink.accept("not!!valid!!base64".to_owned(), None).await;
        assert_eq!(frame.seq, 1);
        // Nothing persisted, but the viewer still got the event.
        assert!(!sink.dir().join("frame_1.png").exists());
        assert!(matches!(
            rx.recv().await.unwrap(),
            StreamEvent::Frame { frame_number: 1, .. }
        ));
    }

    #[tokio::test]
    async fn slow_subscriber_lags_instead_of_blocking_producer() {
        let tmp = tempfile::tempdir().unwrap();
        let sink = FrameSink::new(TaskId::from("task-1"), tmp.path(), 2);
        let mut rx = sink.subscribe();

        for _ in 0..5 {
            let _ = sink.accept(b64(b"x"), None).await;
        }

        // The first read observes the lag; subsequent reads resume with the
        // oldest retained event.
        match rx.recv().await {
            Err(RecvError::Lagged(missed)) => assert!(missed >= 1),
            other => panic!("expected lag, got {other:?}"),
        }
        match rx.recv().await.unwrap() {
            StreamEvent::Frame { frame_number, .. } => assert!(frame_number > 1),
            other => panic!("expected frame, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn error_publish_reaches_subscribers() {
        let tmp = tempfile::tempdir().unwrap();
        let sink = sink_in(tmp.path());
        let mut rx = sink.subscribe();

        sink.publish_error("browser connection closed");
        match rx.recv().await.unwrap() {
            StreamEvent::Error { message } => assert_eq!(message, "browser connection closed"),
            other => panic!("expected error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn metadata_travels_with_the_frame() {
        let tmp = tempfile::tempdir().unwrap();
        let sink = sink_in(tmp.path());
        let meta = FrameMetadata {
            width: Some(1920),
            height: Some(1080),
        };
        let frame = sink.accept(b64(b"x"), Some(meta)).await;
        assert_eq!(frame.metadata, Some(meta));
    }
}
