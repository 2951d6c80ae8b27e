//! Prometheus metrics recorder and metric descriptions.
//!
//! Lower-layer crates record by literal name so they never depend on this
//! crate; the constants here are the authoritative spellings, registered
//! with the recorder and used at this crate's own recording sites.

use metrics::{describe_counter, describe_gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing::info;

/// Tracked browser instances, any state (gauge).
pub const TASKS_TRACKED: &str = "tasks_tracked";
/// Open screencast sessions (gauge).
pub const SCREENCAST_SESSIONS_ACTIVE: &str = "screencast_sessions_active";
/// Live SSE viewers (gauge).
pub const STREAM_VIEWERS_ACTIVE: &str = "stream_viewers_active";
/// Frames published to viewers (counter).
pub const FRAMES_RELAYED_TOTAL: &str = "frames_relayed_total";
/// Frames a lagging viewer missed (counter).
pub const FRAMES_DROPPED_TOTAL: &str = "frames_dropped_total";
/// Frame disk writes that failed (counter).
pub const FRAME_PERSIST_FAILURES_TOTAL: &str = "frame_persist_failures_total";
/// Browser launches attempted (counter).
pub const BROWSER_LAUNCHES_TOTAL: &str = "browser_launches_total";
/// Browser launches that failed (counter).
pub const BROWSER_LAUNCH_FAILURES_TOTAL: &str = "browser_launch_failures_total";

/// Install the Prometheus metrics recorder (global) and describe every
/// metric the relay emits.
///
/// Returns the `PrometheusHandle` used to render the `/metrics` endpoint.
/// Must be called once at server startup before any metrics are recorded.
///
/// # Panics
///
/// Panics when a recorder is already installed in this process.
pub fn install_recorder() -> PrometheusHandle {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install metrics recorder");
    describe_metrics();
    info!("prometheus metrics recorder installed");
    handle
}

/// Register help text for every metric with the installed recorder.
fn describe_metrics() {
    describe_gauge!(TASKS_TRACKED, "Tracked browser instances, any state");
    describe_gauge!(SCREENCAST_SESSIONS_ACTIVE, "Open screencast sessions");
    describe_gauge!(STREAM_VIEWERS_ACTIVE, "Live SSE viewers");
    describe_counter!(FRAMES_RELAYED_TOTAL, "Frames published to viewers");
    describe_counter!(FRAMES_DROPPED_TOTAL, "Frames a lagging viewer missed");
    describe_counter!(
        FRAME_PERSIST_FAILURES_TOTAL,
        "Frame disk writes that failed"
    );
    describe_counter!(BROWSER_LAUNCHES_TOTAL, "Browser launches attempted");
    describe_counter!(
        BROWSER_LAUNCH_FAILURES_TOTAL,
        "Browser launches that failed"
    );
}
