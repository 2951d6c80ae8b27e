//! Browser-layer error types.

use thiserror::Error;

/// Errors that make a browser launch fail. Surfaced synchronously to the
/// caller that requested the launch.
#[derive(Debug, Error)]
pub enum LaunchError {
    /// No Chrome executable passed the version probe.
    #[error("Chrome not found; install Google Chrome or set CHROME_PATH")]
    BrowserNotFound,

    /// Every port in the configured range was busy.
    #[error("no free debug port in {start}..{start}+{range}")]
    NoPortAvailable {
        /// First port probed.
        start: u16,
        /// Number of ports probed.
        range: u16,
    },

    /// The process spawned but the debug endpoint never answered.
    #[error("browser on port {port} did not become ready in time")]
    StartupTimeout {
        /// The debug port that never responded.
        port: u16,
    },

    /// Spawning the process failed, or it exited before becoming ready.
    #[error("failed to launch browser: {context}")]
    Spawn {
        /// What went wrong.
        context: String,
    },
}

/// Errors that end a screencast session. Surfaced asynchronously to viewers
/// as an `error` stream event.
#[derive(Debug, Error)]
pub enum StreamError {
    /// The browser reported no streamable tab.
    #[error("no streamable tab available")]
    NoTabAvailable,

    /// The WebSocket connection to the debugger could not be established
    /// or was lost.
    #[error("browser connection failure: {context}")]
    ConnectionFailure {
        /// What went wrong.
        context: String,
    },

    /// The browser rejected the screencast start command.
    #[error("screencast rejected: {message}")]
    ScreencastRejected {
        /// The browser's error message.
        message: String,
    },
}

/// Errors from registry lookups.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// No instance is tracked under the given task id.
    #[error("no browser instance for task '{task_id}'")]
    TaskNotFound {
        /// The missing task id.
        task_id: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn browser_not_found_display() {
        let err = LaunchError::BrowserNotFound;
        assert!(err.to_string().contains("CHROME_PATH"));
    }

    #[test]
    fn no_port_available_display() {
        let err = LaunchError::NoPortAvailable {
            start: 9222,
            range: 100,
        };
        assert!(err.to_string().contains("9222"));
        assert!(err.to_string().contains("100"));
    }

    #[test]
    fn startup_timeout_display() {
        let err = LaunchError::StartupTimeout { port: 9226 };
        assert!(err.to_string().contains("9226"));
    }

    #[test]
    fn spawn_display() {
        let err = LaunchError::Spawn {
            context: "permission denied".into(),
        };
        assert_eq!(
            err.to_string(),
            "failed to launch browser: permission denied"
        );
    }

    #[test]
    fn no_tab_available_display() {
        assert_eq!(
            StreamError::NoTabAvailable.to_string(),
            "no streamable tab available"
        );
    }

    #[test]
    fn screencast_rejected_display() {
        let err = StreamError::ScreencastRejected {
            message: "Not allowed".into(),
        };
        assert!(err.to_string().contains("Not allowed"));
    }

    #[test]
    fn connection_failure_display() {
        let err = StreamError::ConnectionFailure {
            context: "connection refused".into(),
        };
        assert!(err.to_string().contains("connection refused"));
    }

    #[test]
    fn task_not_found_display() {
        let err = RegistryError::TaskNotFound {
            task_id: "task-7".into(),
        };
        assert!(err.to_string().contains("task-7"));
    }
}
