//! Seam for the automation agent that drives the browser.

use async_trait::async_trait;
use peek_core::TaskId;
use thiserror::Error;
use tracing::info;

/// Failure of an automation run.
#[derive(Debug, Error)]
pub enum DriverError {
    /// The run failed with the given reason.
    #[error("automation driver failed: {0}")]
    Failed(String),
}

/// Runs one automation task against a ready browser.
///
/// The relay hands the driver a CDP URL for a `Running` instance and
/// otherwise never inspects page content. Implementations are free to use
/// any CDP client they like against that URL.
#[async_trait]
pub trait AgentDriver: Send + Sync {
    /// Drive the task to completion. Returning `Err` marks the task
    /// `Failed` in the registry.
    async fn run(&self, task_id: &TaskId, cdp_url: &str) -> Result<(), DriverError>;
}

/// Driver that does nothing, for deployments that only relay streams.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopDriver;

#[async_trait]
impl AgentDriver for NoopDriver {
    async fn run(&self, task_id: &TaskId, cdp_url: &str) -> Result<(), DriverError> {
        info!(task_id = %task_id, cdp_url, "no-op driver: leaving the page alone");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn noop_driver_always_succeeds() {
        let driver = NoopDriver;
        let result = driver
            .run(&TaskId::from("task-1"), "http://127.0.0.1:9222")
            .await;
        assert!(result.is_ok());
    }

    #[test]
    fn driver_error_display() {
        let err = DriverError::Failed("page crashed".into());
        assert_eq!(err.to_string(), "automation driver failed: page crashed");
    }

    #[tokio::test]
    async fn trait_object_is_usable() {
        let driver: Box<dyn AgentDriver> = Box::new(NoopDriver);
        assert!(
            driver
                .run(&TaskId::from("task-1"), "http://127.0.0.1:9222")
                .await
                .is_ok()
        );
    }
}
