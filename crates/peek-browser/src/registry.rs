//! Registry of live browser instances.
//!
//! One injectable map, no globals: every handler and background task that
//! needs to know about a browser instance holds an `Arc<TaskRegistry>`.

use crate::error::RegistryError;
use dashmap::DashMap;
use peek_core::{TaskId, TaskStatus};
use serde::Serialize;
use std::collections::HashSet;
use tempfile::TempDir;
use tokio::process::Child;
use tracing::warn;

/// One tracked browser instance.
///
/// The `Child` handle and the disposable profile directory are owned
/// exclusively by the registry entry; dropping the entry tears both down
/// (the profile directory is removed on drop).
struct TaskInstance {
    port: u16,
    status: TaskStatus,
    child: Option<Child>,
    user_data: Option<TempDir>,
}

/// Process-free view of a [`TaskInstance`], safe to serialize.
#[derive(Clone, Debug, Serialize)]
pub struct TaskSnapshot {
    /// The task id.
    pub task_id: TaskId,
    /// The instance's debug port.
    pub port: u16,
    /// Current lifecycle status.
    pub status: TaskStatus,
}

/// Concurrency-safe map of task id to browser instance.
///
/// All mutations go through entry-level locking (`DashMap`), so readers
/// never observe a partially updated instance and status transitions are
/// atomic per task.
#[derive(Default)]
pub struct TaskRegistry {
    tasks: DashMap<TaskId, TaskInstance>,
}

impl TaskRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a new instance in `Starting` state, replacing any previous
    /// entry for the same task.
    pub fn insert_starting(&self, task_id: TaskId, port: u16) {
        let _ = self.tasks.insert(
            task_id,
            TaskInstance {
                port,
                status: TaskStatus::Starting,
                child: None,
                user_data: None,
            },
        );
        metrics::gauge!("tasks_tracked").set(self.len() as f64);
    }

    /// Process-free snapshot of one instance.
    pub fn get(&self, task_id: &TaskId) -> Option<TaskSnapshot> {
        self.tasks.get(task_id).map(|entry| TaskSnapshot {
            task_id: task_id.clone(),
            port: entry.port,
            status: entry.status,
        })
    }

    /// Current status of one instance.
    pub fn status(&self, task_id: &TaskId) -> Result<TaskStatus, RegistryError> {
        self.tasks
            .get(task_id)
            .map(|entry| entry.status)
            .ok_or_else(|| RegistryError::TaskNotFound {
                task_id: task_id.to_string(),
            })
    }

    /// Debug port of one instance.
    pub fn port(&self, task_id: &TaskId) -> Result<u16, RegistryError> {
        self.tasks
            .get(task_id)
            .map(|entry| entry.port)
            .ok_or_else(|| RegistryError::TaskNotFound {
                task_id: task_id.to_string(),
            })
    }

    /// Apply a status transition if it is legal.
    ///
    /// Returns `Ok(true)` when applied, `Ok(false)` when the transition is
    /// illegal from the current state (logged, state unchanged).
    pub fn transition(&self, task_id: &TaskId, next: TaskStatus) -> Result<bool, RegistryError> {
        let mut entry = self
            .tasks
            .get_mut(task_id)
            .ok_or_else(|| RegistryError::TaskNotFound {
                task_id: task_id.to_string(),
            })?;
        if !entry.status.can_transition_to(next) {
            warn!(
                task_id = %task_id,
                from = %entry.status,
                to = %next,
                "illegal status transition ignored"
            );
            return Ok(false);
        }
        entry.status = next;
        Ok(true)
    }

    /// Attach the spawned process and its profile directory to an entry.
    pub fn attach_process(
        &self,
        task_id: &TaskId,
        child: Child,
        user_data: TempDir,
    ) -> Result<(), RegistryError> {
        let mut entry = self
            .tasks
            .get_mut(task_id)
            .ok_or_else(|| RegistryError::TaskNotFound {
                task_id: task_id.to_string(),
            })?;
        entry.child = Some(child);
        entry.user_data = Some(user_data);
        Ok(())
    }

    /// Take exclusive ownership of the child process for teardown.
    ///
    /// The profile directory stays attached so it outlives the kill and is
    /// removed when the entry is dropped or the instance relaunches.
    pub fn take_child(&self, task_id: &TaskId) -> Option<Child> {
        self.tasks
            .get_mut(task_id)
            .and_then(|mut entry| entry.child.take())
    }

    /// Drop the instance entirely. Returns the final snapshot if it existed.
    pub fn remove(&self, task_id: &TaskId) -> Option<TaskSnapshot> {
        let removed = self.tasks.remove(task_id).map(|(id, instance)| TaskSnapshot {
            task_id: id,
            port: instance.port,
            status: instance.status,
        });
        metrics::gauge!("tasks_tracked").set(self.len() as f64);
        removed
    }

    /// Snapshots of every tracked instance, ordered by task id.
    pub fn snapshot(&self) -> Vec<TaskSnapshot> {
        let mut all: Vec<TaskSnapshot> = self
            .tasks
            .iter()
            .map(|entry| TaskSnapshot {
                task_id: entry.key().clone(),
                port: entry.value().port,
                status: entry.value().status,
            })
            .collect();
        all.sort_by(|a, b| a.task_id.as_str().cmp(b.task_id.as_str()));
        all
    }

    /// Ports currently assigned to tracked instances, whatever their state.
    pub fn ports_in_use(&self) -> HashSet<u16> {
        self.tasks.iter().map(|entry| entry.value().port).collect()
    }

    /// Number of tracked instances.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Whether any instance is tracked.
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Number of instances currently in `Running` state.
    pub fn running_count(&self) -> usize {
        self.tasks
            .iter()
            .filter(|entry| entry.value().status == TaskStatus::Running)
            .count()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
