//! Server assembly: shared state, router, listener.

use crate::config::RelayConfig;
use crate::hub::StreamHub;
use crate::routes;
use crate::shutdown::ShutdownCoordinator;
use metrics_exporter_prometheus::PrometheusHandle;
use peek_browser::{AgentDriver, ProcessSupervisor, TaskRegistry};
use peek_store::ReplayStore;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    /// Live browser instances.
    pub registry: Arc<TaskRegistry>,
    /// Browser launcher/terminator.
    pub supervisor: Arc<ProcessSupervisor>,
    /// Per-task stream lifecycle.
    pub hub: StreamHub,
    /// Read-only frame replay.
    pub replay: ReplayStore,
    /// Automation driver, when one is configured.
    pub driver: Option<Arc<dyn AgentDriver>>,
    /// SSE keepalive window.
    pub keepalive: Duration,
    /// Prometheus render handle, when the recorder is installed.
    pub metrics_handle: Option<PrometheusHandle>,
    /// Server start time, for uptime reporting.
    pub start_time: Instant,
}

/// The relay server.
pub struct RelayServer {
    config: RelayConfig,
    state: AppState,
    shutdown: ShutdownCoordinator,
}

impl RelayServer {
    /// Assemble a server from configuration. Nothing is bound yet.
    #[must_use]
    pub fn new(config: RelayConfig) -> Self {
        let registry = Arc::new(TaskRegistry::new());
        let mut supervisor = ProcessSupervisor::new(Arc::clone(&registry))
            .with_port_range(config.start_port, config.port_range);
        if let Some(path) = &config.chrome_path {
            supervisor = supervisor.with_chrome_path(path.clone());
        }
        let hub = StreamHub::new(
            Arc::clone(&registry),
            config.frames_dir.clone(),
            config.queue_capacity,
        );
        let replay = ReplayStore::new(config.frames_dir.clone());

        let state = AppState {
            registry,
            supervisor: Arc::new(supervisor),
            hub,
            replay,
            driver: None,
            keepalive: Duration::from_secs(config.keepalive_secs),
            metrics_handle: None,
            start_time: Instant::now(),
        };

        let shutdown = ShutdownCoordinator::new(state.hub.clone());
        Self {
            config,
            state,
            shutdown,
        }
    }

    /// Attach an automation driver, spawned per submitted task.
    #[must_use]
    pub fn with_driver(mut self, driver: Arc<dyn AgentDriver>) -> Self {
        self.state.driver = Some(driver);
        self
    }

    /// Attach the Prometheus render handle for `/metrics`.
    #[must_use]
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.state.metrics_handle = Some(handle);
        self
    }

    /// The shared handler state.
    #[must_use]
    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// The shutdown coordinator driving graceful exit.
    #[must_use]
    pub fn coordinator(&self) -> &ShutdownCoordinator {
        &self.shutdown
    }

    /// Build the router (exposed separately for in-process tests).
    #[must_use]
    pub fn router(&self) -> axum::Router {
        routes::router(self.state.clone())
    }

    /// Bind and serve. Returns the bound address and the serve task; the
    /// task exits after the shutdown token fires. Open streams close in
    /// [`ShutdownCoordinator::graceful_shutdown`].
    pub async fn listen(&self) -> std::io::Result<(SocketAddr, JoinHandle<()>)> {
        let listener =
            tokio::net::TcpListener::bind((self.config.host.as_str(), self.config.port)).await?;
        let addr = listener.local_addr()?;
        let app = self.router();
        let token = self.shutdown.token();

        let handle = tokio::spawn(async move {
            let serve = axum::serve(listener, app)
                .with_graceful_shutdown(async move { token.cancelled().await });
            if let Err(err) = serve.await {
                error!(error = %err, "server error");
            }
        });

        info!(%addr, "relay server listening");
        Ok((addr, handle))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
