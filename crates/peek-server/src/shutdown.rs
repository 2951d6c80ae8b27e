//! Graceful shutdown: cancellation plus stream teardown.

use crate::hub::StreamHub;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Default wait for in-flight work before giving up.
const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// Drives the server's exit sequence.
///
/// Holds the cancellation token the accept loop watches and the stream
/// hub whose screencast sessions must stop before the process exits, so
/// every attached browser gets a `Page.stopScreencast` instead of a
/// dropped socket.
pub struct ShutdownCoordinator {
    token: CancellationToken,
    hub: StreamHub,
}

impl ShutdownCoordinator {
    /// A coordinator that tears down `hub`'s streams on shutdown.
    #[must_use]
    pub fn new(hub: StreamHub) -> Self {
        Self {
            token: CancellationToken::new(),
            hub,
        }
    }

    /// Token for the accept loop's graceful-shutdown future.
    #[must_use]
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Initiate shutdown without waiting for anything.
    pub fn shutdown(&self) {
        self.token.cancel();
    }

    /// Whether a shutdown has been initiated.
    #[must_use]
    pub fn is_shutting_down(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Full exit sequence: cancel the token, close every open stream,
    /// then wait up to `timeout` for the handles to drain.
    pub async fn graceful_shutdown(&self, handles: Vec<JoinHandle<()>>, timeout: Option<Duration>) {
        let timeout = timeout.unwrap_or(DEFAULT_SHUTDOWN_TIMEOUT);

        self.shutdown();
        let streams = self.hub.stream_count();
        self.hub.close_all();
        info!(
            streams,
            task_count = handles.len(),
            timeout_secs = timeout.as_secs(),
            "shutting down, waiting for tasks to finish"
        );

        let drain = futures::future::join_all(handles);
        if tokio::time::timeout(timeout, drain).await.is_err() {
            warn!("shutdown timed out after {timeout:?}, some tasks may still be running");
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
