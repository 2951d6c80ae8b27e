//! Read-only replay access to persisted frames.

use crate::error::StoreError;
use peek_core::TaskId;
use serde::Serialize;
use std::path::PathBuf;

/// Metadata for one stored frame.
#[derive(Clone, Debug, Serialize)]
pub struct FrameEntry {
    /// File name on disk (`frame_<seq>.png`).
    pub filename: String,
    /// Sequence number parsed from the file name.
    pub seq: u64,
    /// File size in bytes.
    pub size: u64,
    /// Creation time, Unix milliseconds (file mtime).
    pub created: u64,
    /// Relative fetch URL for this frame.
    pub url: String,
}

/// Read-only view over the frame directories a [`crate::FrameSink`] writes.
///
/// Listing and fetching never mutate anything; frames outlive the task
/// instance that produced them.
#[derive(Clone, Debug)]
pub struct ReplayStore {
    root: PathBuf,
}

impl ReplayStore {
    /// A store rooted at the same directory the sinks write under.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// List a task's stored frames in ascending sequence order.
    ///
    /// A task with no frame directory yet lists as empty. Files that do not
    /// follow the `frame_<seq>.png` naming are skipped.
    pub async fn list(&self, task_id: &TaskId) -> Result<Vec<FrameEntry>, StoreError> {
        let dir = self.root.join(task_id.as_str());
        let mut read_dir = match tokio::fs::read_dir(&dir).await {
            Ok(rd) => rd,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(StoreError::List {
                    task_id: task_id.to_string(),
                    source,
                });
            }
        };

        let mut entries = Vec::new();
        while let Ok(Some(entry)) = read_dir.next_entry().await {
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            let Some(seq) = parse_seq(name) else { continue };
            let Ok(meta) = entry.metadata().await else {
                continue;
            };
            entries.push(FrameEntry {
                filename: name.to_owned(),
                seq,
                size: meta.len(),
                created: modified_millis(&meta),
                url: format!("/api/tasks/{task_id}/frames/{seq}"),
            });
        }
        entries.sort_by_key(|e| e.seq);
        Ok(entries)
    }

    /// Read one stored frame's bytes.
    pub async fn fetch(&self, task_id: &TaskId, seq: u64) -> Result<Vec<u8>, StoreError> {
        let path = self.root.join(task_id.as_str()).join(format!("frame_{seq}.png"));
        tokio::fs::read(&path).await.map_err(|_| StoreError::NotFound {
            task_id: task_id.to_string(),
            seq,
        })
    }
}

/// Parse the sequence number out of `frame_<seq>.png`.
pub(crate) fn parse_seq(filename: &str) -> Option<u64> {
    filename
        .strip_prefix("frame_")?
        .strip_suffix(".png")?
        .parse()
        .ok()
}

fn modified_millis(meta: &std::fs::Metadata) -> u64 {
    meta.modified()
        .ok()
        .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
        .and_then(|d| u64::try_from(d.as_millis()).ok())
        .unwrap_or(0)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
