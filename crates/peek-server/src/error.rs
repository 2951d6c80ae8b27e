//! HTTP error mapping.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use peek_browser::{LaunchError, RegistryError, StreamError};
use peek_store::StoreError;
use serde_json::json;
use thiserror::Error;

/// Any failure a handler can surface, mapped onto an HTTP status plus a
/// `{"error": "..."}` JSON body.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Registry lookup failure.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// Browser launch failure.
    #[error(transparent)]
    Launch(#[from] LaunchError),

    /// Screencast setup failure.
    #[error(transparent)]
    Stream(#[from] StreamError),

    /// Frame store failure.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ApiError {
    /// The HTTP status this error maps to.
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Registry(RegistryError::TaskNotFound { .. })
            | Self::Store(StoreError::NotFound { .. }) => StatusCode::NOT_FOUND,
            Self::Launch(LaunchError::BrowserNotFound | LaunchError::NoPortAvailable { .. }) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            Self::Launch(LaunchError::StartupTimeout { .. }) => StatusCode::GATEWAY_TIMEOUT,
            Self::Launch(LaunchError::Spawn { .. })
            | Self::Store(StoreError::Persist { .. } | StoreError::List { .. }) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::Stream(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}
