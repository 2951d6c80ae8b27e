//! Browser process lifecycle: spawn, readiness, teardown.

use crate::chrome;
use crate::error::LaunchError;
use crate::port;
use crate::registry::TaskRegistry;
use peek_core::{TaskId, TaskStatus};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// How many times the debug endpoint is polled before giving up.
const STARTUP_POLL_ATTEMPTS: u32 = 20;
/// Delay between readiness polls.
const STARTUP_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Base URL of a browser's debug HTTP endpoint. Chrome binds the debug
/// port to loopback only.
#[must_use]
pub fn debug_base_url(port: u16) -> String {
    format!("http://127.0.0.1:{port}")
}

/// Launches and tears down one headless Chrome per task.
///
/// Every launch gets its own debug port and a fresh disposable profile
/// directory, so concurrent tasks never share browser state.
pub struct ProcessSupervisor {
    registry: Arc<TaskRegistry>,
    chrome_override: Option<PathBuf>,
    start_port: u16,
    port_range: u16,
    poll_attempts: u32,
    poll_interval: Duration,
}

impl ProcessSupervisor {
    /// A supervisor tracking instances in `registry`, with default port
    /// range and Chrome discovery.
    #[must_use]
    pub fn new(registry: Arc<TaskRegistry>) -> Self {
        Self {
            registry,
            chrome_override: None,
            start_port: port::DEFAULT_START_PORT,
            port_range: port::DEFAULT_PORT_RANGE,
            poll_attempts: STARTUP_POLL_ATTEMPTS,
            poll_interval: STARTUP_POLL_INTERVAL,
        }
    }

    /// Use a fixed Chrome binary instead of discovery. The binary must
    /// still pass the version probe at launch time.
    #[must_use]
    pub fn with_chrome_path(mut self, path: PathBuf) -> Self {
        self.chrome_override = Some(path);
        self
    }

    /// Override the debug port search range.
    #[must_use]
    pub fn with_port_range(mut self, start: u16, range: u16) -> Self {
        self.start_port = start;
        self.port_range = range;
        self
    }

    /// Override readiness polling (tests use short intervals).
    #[must_use]
    pub fn with_startup_policy(mut self, attempts: u32, interval: Duration) -> Self {
        self.poll_attempts = attempts;
        self.poll_interval = interval;
        self
    }

    /// The registry this supervisor records instances in.
    #[must_use]
    pub fn registry(&self) -> &Arc<TaskRegistry> {
        &self.registry
    }

    /// Launch a browser for `task_id` on an allocated port.
    ///
    /// On success the registry holds a `Running` entry owning the child
    /// process; the debug endpoint has answered at least once.
    pub async fn launch(&self, task_id: &TaskId) -> Result<u16, LaunchError> {
        self.launch_on(task_id, None).await
    }

    /// Like [`launch`](Self::launch) with an explicit debug port.
    pub async fn launch_on(
        &self,
        task_id: &TaskId,
        explicit_port: Option<u16>,
    ) -> Result<u16, LaunchError> {
        self.reap_stale(task_id).await;

        // Resolve the binary before touching the registry, so a missing
        // Chrome leaves no trace of the attempt.
        let chrome = self.resolve_chrome().await?;

        let port = match explicit_port {
            Some(p) => p,
            None => port::allocate_excluding(
                self.start_port,
                self.port_range,
                &self.registry.ports_in_use(),
            )?,
        };

        let user_data = tempfile::Builder::new()
            .prefix("peek-profile-")
            .tempdir()
            .map_err(|err| LaunchError::Spawn {
                context: format!("user data dir: {err}"),
            })?;

        self.registry.insert_starting(task_id.clone(), port);

        let mut child = match build_command(&chrome, port, user_data.path()).spawn() {
            Ok(child) => child,
            Err(err) => {
                let _ = self.registry.remove(task_id);
                metrics::counter!("browser_launch_failures_total").increment(1);
                return Err(LaunchError::Spawn {
                    context: err.to_string(),
                });
            }
        };
        info!(task_id = %task_id, port, chrome = %chrome.display(), "browser spawned");
        metrics::counter!("browser_launches_total").increment(1);

        if let Err(err) = self.wait_ready(port, &mut child).await {
            warn!(task_id = %task_id, port, error = %err, "browser never became ready, tearing down");
            let _ = child.kill().await;
            let _ = self.registry.remove(task_id);
            metrics::counter!("browser_launch_failures_total").increment(1);
            return Err(err);
        }

        self.registry
            .attach_process(task_id, child, user_data)
            .map_err(|err| LaunchError::Spawn {
                context: err.to_string(),
            })?;
        let _ = self
            .registry
            .transition(task_id, TaskStatus::Running)
            .map_err(|err| LaunchError::Spawn {
                context: err.to_string(),
            })?;
        info!(task_id = %task_id, port, "browser ready");
        Ok(port)
    }

    /// Kill the task's browser and mark the entry `Stopped`. Idempotent:
    /// unknown ids and already-stopped instances are no-ops.
    pub async fn terminate(&self, task_id: &TaskId) {
        if let Some(mut child) = self.registry.take_child(task_id) {
            if let Err(err) = child.kill().await {
                warn!(task_id = %task_id, error = %err, "failed to kill browser process");
            }
        }
        if let Ok(status) = self.registry.status(task_id) {
            if !status.is_terminal() {
                let _ = self.registry.transition(task_id, TaskStatus::Stopped);
                info!(task_id = %task_id, "browser terminated");
            }
        }
    }

    /// Kill a leftover browser from an earlier launch of the same task.
    /// Scoped to this task id only; other tasks' browsers are untouched.
    async fn reap_stale(&self, task_id: &TaskId) {
        if let Some(mut child) = self.registry.take_child(task_id) {
            warn!(task_id = %task_id, "killing stale browser before relaunch");
            let _ = child.kill().await;
        }
        if self.registry.remove(task_id).is_some() {
            debug!(task_id = %task_id, "dropped stale registry entry");
        }
    }

    async fn resolve_chrome(&self) -> Result<PathBuf, LaunchError> {
        match &self.chrome_override {
            Some(path) => {
                if chrome::probe_version(&path.to_string_lossy()).await {
                    Ok(path.clone())
                } else {
                    Err(LaunchError::BrowserNotFound)
                }
            }
            None => chrome::find_chrome().await.ok_or(LaunchError::BrowserNotFound),
        }
    }

    async fn wait_ready(&self, port: u16, child: &mut tokio::process::Child) -> Result<(), LaunchError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(1))
            .build()
            .map_err(|err| LaunchError::Spawn {
                context: err.to_string(),
            })?;
        let url = format!("{}/json/version", debug_base_url(port));

        for attempt in 1..=self.poll_attempts {
            if let Ok(Some(status)) = child.try_wait() {
                return Err(LaunchError::Spawn {
                    context: format!("browser exited during startup: {status}"),
                });
            }
            match client.get(&url).send().await {
                Ok(response) if response.status().is_success() => return Ok(()),
                Ok(response) => {
                    debug!(port, attempt, status = %response.status(), "debug endpoint not ready");
                }
                Err(err) => {
                    debug!(port, attempt, error = %err, "debug endpoint not reachable");
                }
            }
            tokio::time::sleep(self.poll_interval).await;
        }
        Err(LaunchError::StartupTimeout { port })
    }
}

/// One-time startup sweep: kill remote-debugging Chrome processes left
/// over from a previous daemon run. Never called while tasks are live.
/// Returns the number of processes signalled.
pub async fn reap_orphans() -> usize {
    let output = match Command::new("ps").arg("aux").output().await {
        Ok(output) => output,
        Err(err) => {
            warn!(error = %err, "orphan sweep skipped, ps unavailable");
            return 0;
        }
    };

    let text = String::from_utf8_lossy(&output.stdout);
    let mut reaped = 0_usize;
    for line in text.lines() {
        let lower = line.to_lowercase();
        if !lower.contains("--remote-debugging-port") {
            continue;
        }
        if !(lower.contains("chrome") || lower.contains("chromium")) {
            continue;
        }
        let Some(pid) = line.split_whitespace().nth(1) else {
            continue;
        };
        let killed = Command::new("kill")
            .arg(pid)
            .status()
            .await
            .map(|status| status.success())
            .unwrap_or(false);
        if killed {
            info!(pid, "killed orphaned debug browser");
            reaped += 1;
        }
    }
    reaped
}

fn build_command(chrome: &Path, port: u16, user_data: &Path) -> Command {
    let mut cmd = Command::new(chrome);
    let _ = cmd
        .arg(format!("--remote-debugging-port={port}"))
        .arg(format!("--user-data-dir={}", user_data.display()))
        .arg("--remote-allow-origins=*")
        .arg("--no-first-run")
        .arg("--no-default-browser-check")
        .arg("--disable-extensions")
        .arg("--window-size=1920,1080")
        .arg("--force-device-scale-factor=1")
        .arg("--disable-dev-shm-usage")
        .arg("--no-sandbox")
        .arg("--headless=new")
        .arg("about:blank")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true);
    cmd
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
