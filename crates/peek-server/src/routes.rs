//! HTTP route handlers.

use crate::error::ApiError;
use crate::health::health_check;
use crate::server::AppState;
use crate::stream::sse_response;
use axum::Json;
use axum::extract::{Path, State};
use axum::http::{StatusCode, header};
use axum::response::IntoResponse;
use axum::routing::get;
use peek_browser::supervisor::debug_base_url;
use peek_browser::{RegistryError, tabs};
use peek_core::{TaskId, TaskStatus};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// Build the relay's router.
pub fn router(state: AppState) -> axum::Router {
    axum::Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics_text))
        .route("/api/tasks", get(list_tasks).post(submit_task))
        .route("/api/tasks/{task_id}", get(get_task).delete(stop_task))
        .route("/api/tasks/{task_id}/ready", get(task_ready))
        .route("/api/tasks/{task_id}/live", get(live_stream))
        .route("/api/tasks/{task_id}/frames", get(list_frames))
        .route("/api/tasks/{task_id}/frames/{seq}", get(fetch_frame))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Body of `POST /api/tasks`.
#[derive(Debug, Default, Deserialize)]
pub struct SubmitTaskRequest {
    /// Caller-chosen task id; a UUID v7 is generated when absent.
    pub task_id: Option<String>,
}

/// Response of `POST /api/tasks`.
#[derive(Debug, Serialize)]
pub struct SubmitTaskResponse {
    /// The task id (echoed or generated).
    pub task_id: TaskId,
    /// The browser's debug port.
    pub port: u16,
    /// Always `"started"`.
    pub status: String,
    /// CDP base URL handed to the automation driver.
    pub cdp_url: String,
    /// Relative URL of the live SSE stream.
    pub live_url: String,
    /// Relative URL of the frame replay listing.
    pub replay_url: String,
}

async fn submit_task(
    State(state): State<AppState>,
    body: Option<Json<SubmitTaskRequest>>,
) -> Result<Json<SubmitTaskResponse>, ApiError> {
    let request = body.map(|Json(req)| req).unwrap_or_default();
    let task_id = request
        .task_id
        .map(TaskId::from_string)
        .unwrap_or_default();

    let port = state.supervisor.launch(&task_id).await?;
    let cdp_url = debug_base_url(port);
    info!(task_id = %task_id, port, "task submitted");

    if let Some(driver) = state.driver.clone() {
        let registry = state.registry.clone();
        let hub = state.hub.clone();
        let driver_task = task_id.clone();
        let driver_url = cdp_url.clone();
        let _ = tokio::spawn(async move {
            if let Err(err) = driver.run(&driver_task, &driver_url).await {
                warn!(task_id = %driver_task, error = %err, "automation driver failed");
                let _ = registry.transition(&driver_task, TaskStatus::Failed);
                hub.close_task(&driver_task);
            }
        });
    }

    Ok(Json(SubmitTaskResponse {
        live_url: format!("/api/tasks/{task_id}/live"),
        replay_url: format!("/api/tasks/{task_id}/frames"),
        task_id,
        port,
        status: "started".to_owned(),
        cdp_url,
    }))
}

async fn list_tasks(State(state): State<AppState>) -> Json<serde_json::Value> {
    let tasks = state.registry.snapshot();
    Json(json!({ "total": tasks.len(), "tasks": tasks }))
}

async fn get_task(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let task_id = TaskId::from_string(task_id);
    let snapshot = state
        .registry
        .get(&task_id)
        .ok_or_else(|| RegistryError::TaskNotFound {
            task_id: task_id.to_string(),
        })?;
    Ok(Json(snapshot))
}

/// Polling probe for viewers: is the task's stream worth connecting to yet?
/// Unlike the other task routes this one answers 200 for unknown ids, so
/// clients can poll it before submission has landed.
async fn task_ready(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> Json<serde_json::Value> {
    let task_id = TaskId::from_string(task_id);
    let Some(snapshot) = state.registry.get(&task_id) else {
        return Json(json!({ "ready": false, "status": "not_started" }));
    };

    if snapshot.status != TaskStatus::Running {
        return Json(json!({ "ready": false, "status": snapshot.status }));
    }

    match tabs::list_tabs(&debug_base_url(snapshot.port)).await {
        Ok(tab_list) => Json(json!({
            "ready": true,
            "status": snapshot.status,
            "tabs_count": tab_list.len(),
        })),
        Err(err) => Json(json!({
            "ready": false,
            "status": snapshot.status,
            "message": format!("debug endpoint not responding: {err}"),
        })),
    }
}

async fn live_stream(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let task_id = TaskId::from_string(task_id);
    let live = state.hub.subscribe(&task_id).await?;
    Ok(sse_response(live, state.keepalive))
}

async fn stop_task(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let task_id = TaskId::from_string(task_id);
    if state.registry.get(&task_id).is_none() {
        return Err(RegistryError::TaskNotFound {
            task_id: task_id.to_string(),
        }
        .into());
    }

    state.hub.close_task(&task_id);
    state.supervisor.terminate(&task_id).await;
    Ok(Json(json!({ "task_id": task_id, "status": "stopped" })))
}

async fn list_frames(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let task_id = TaskId::from_string(task_id);
    // Frames outlive the registry entry, so replay never requires one.
    let frames = state.replay.list(&task_id).await?;
    Ok(Json(json!({
        "task_id": task_id,
        "total": frames.len(),
        "frames": frames,
    })))
}

async fn fetch_frame(
    State(state): State<AppState>,
    Path((task_id, seq)): Path<(String, u64)>,
) -> Result<impl IntoResponse, ApiError> {
    let task_id = TaskId::from_string(task_id);
    let bytes = state.replay.fetch(&task_id, seq).await?;
    Ok(([(header::CONTENT_TYPE, "image/png")], bytes))
}

async fn health(State(state): State<AppState>) -> Json<crate::health::HealthResponse> {
    Json(health_check(
        state.start_time,
        state.registry.running_count(),
        state.hub.viewer_count(),
    ))
}

async fn metrics_text(State(state): State<AppState>) -> impl IntoResponse {
    match &state.metrics_handle {
        Some(handle) => (StatusCode::OK, handle.render()),
        None => (
            StatusCode::NOT_FOUND,
            "metrics recorder not installed".to_owned(),
        ),
    }
}
