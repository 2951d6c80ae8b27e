//! `/health` endpoint.

use serde::Serialize;
use std::time::Instant;

/// Health check response body.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Always `"ok"` when the server is running.
    pub status: String,
    /// Seconds since the server started.
    pub uptime_secs: u64,
    /// Browser instances currently running.
    pub active_tasks: usize,
    /// Live SSE viewers across all tasks.
    pub live_viewers: usize,
}

/// Build a health response from live counters.
pub fn health_check(start_time: Instant, active_tasks: usize, live_viewers: usize) -> HealthResponse {
    HealthResponse {
        status: "ok".into(),
        uptime_secs: start_time.elapsed().as_secs(),
        active_tasks,
        live_viewers,
    }
}
