//! Store error types.

use thiserror::Error;

/// Errors from frame persistence and replay.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Writing a frame to disk failed. Non-fatal for the live stream; the
    /// frame is still published to viewers.
    #[error("failed to persist frame {seq} for task {task_id}: {source}")]
    Persist {
        /// The owning task.
        task_id: String,
        /// Sequence number of the frame that failed to write.
        seq: u64,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Reading a task's frame directory failed for a reason other than the
    /// directory not existing yet.
    #[error("failed to list frames for task {task_id}: {source}")]
    List {
        /// The requested task.
        task_id: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The requested frame (or the task's frame directory) does not exist.
    #[error("no stored frame {seq} for task {task_id}")]
    NotFound {
        /// The requested task.
        task_id: String,
        /// The requested sequence number.
        seq: u64,
    },
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_identifiers() {
        let err = StoreError::NotFound {
            task_id: "t-9".to_owned(),
            seq: 42,
        };
        let msg = err.to_string();
        assert!(msg.contains("t-9"));
        assert!(msg.contains("42"));
    }

    #[test]
    fn persist_preserves_source() {
        let err = StoreError::Persist {
            task_id: "t-1".to_owned(),
            seq: 1,
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        assert!(err.to_string().contains("t-1"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
