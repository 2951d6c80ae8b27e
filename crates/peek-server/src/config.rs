//! Relay configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::warn;

/// Configuration for the relay server.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Host to bind (default `"127.0.0.1"`).
    pub host: String,
    /// Port to bind (default `5000`; `0` auto-assigns).
    pub port: u16,
    /// Root directory frames are persisted under, one subdirectory per task.
    pub frames_dir: PathBuf,
    /// Seconds without a frame before a keepalive event is emitted.
    pub keepalive_secs: u64,
    /// Bound on the per-task broadcast queue.
    pub queue_capacity: usize,
    /// First browser debug port probed.
    pub start_port: u16,
    /// Number of debug ports probed.
    pub port_range: u16,
    /// Fixed Chrome binary instead of discovery.
    pub chrome_path: Option<PathBuf>,
    /// Kill leftover debug browsers from a previous run at startup.
    pub reap_orphans: bool,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 5000,
            frames_dir: PathBuf::from("frames"),
            keepalive_secs: 30,
            queue_capacity: 64,
            start_port: 9222,
            port_range: 100,
            chrome_path: None,
            reap_orphans: true,
        }
    }
}

impl RelayConfig {
    /// Apply environment variable overrides on top of `self`.
    ///
    /// Unset variables leave the current value; values that fail to parse
    /// are logged and ignored rather than failing startup.
    #[must_use]
    pub fn apply_env_overrides(mut self) -> Self {
        if let Some(host) = read_env_string("PEEK_HOST") {
            self.host = host;
        }
        if let Some(port) = read_env_parsed::<u16>("PEEK_PORT") {
            self.port = port;
        }
        if let Some(dir) = read_env_string("PEEK_FRAMES_DIR") {
            self.frames_dir = PathBuf::from(dir);
        }
        if let Some(secs) = read_env_parsed::<u64>("PEEK_KEEPALIVE_SECS") {
            self.keepalive_secs = secs;
        }
        if let Some(cap) = read_env_parsed::<usize>("PEEK_QUEUE_CAPACITY") {
            self.queue_capacity = cap;
        }
        if let Some(port) = read_env_parsed::<u16>("PEEK_START_PORT") {
            self.start_port = port;
        }
        if let Some(range) = read_env_parsed::<u16>("PEEK_PORT_RANGE") {
            self.port_range = range;
        }
        if let Some(path) = read_env_string("CHROME_PATH") {
            self.chrome_path = Some(PathBuf::from(path));
        }
        self
    }
}

fn read_env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

fn read_env_parsed<T: std::str::FromStr>(key: &str) -> Option<T> {
    let raw = std::env::var(key).ok()?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(key, value = %raw, "ignoring unparseable environment override");
            None
        }
    }
}

#[cfg(test)]
#[allow(unsafe_code)]
mod tests {
    use super::*;

    /// SAFETY: env var mutation is inherently racy in multi-threaded tests.
    /// These tests always restore the previous value.
    fn with_env<R>(pairs: &[(&str, &str)], f: impl FnOnce() -> R) -> R {
        let prev: Vec<(String, Option<String>)> = pairs
            .iter()
            .map(|(k, _)| ((*k).to_owned(), std::env::var(k).ok()))
            .collect();
        for (k, v) in pairs {
            unsafe { std::env::set_var(k, v) };
        }
        let result = f();
        for (k, v) in prev {
            match v {
                Some(v) => unsafe { std::env::set_var(&k, v) },
                None => unsafe { std::env::remove_var(&k) },
            }
        }
        result
    }

    #[test]
    fn defaults() {
        let cfg = RelayConfig::default();
        assert_eq!(cfg.host, "127.0.0.1");
        assert_eq!(cfg.port, 5000);
        assert_eq!(cfg.frames_dir, PathBuf::from("frames"));
        assert_eq!(cfg.keepalive_secs, 30);
        assert_eq!(cfg.queue_capacity, 64);
        assert_eq!(cfg.start_port, 9222);
        assert_eq!(cfg.port_range, 100);
        assert!(cfg.chrome_path.is_none());
        assert!(cfg.reap_orphans);
    }

    #[test]
    fn serde_roundtrip() {
        let cfg = RelayConfig::default();
        let json = serde_json::to_string(&cfg).unwrap();
        let back: RelayConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.host, cfg.host);
        assert_eq!(back.port, cfg.port);
        assert_eq!(back.frames_dir, cfg.frames_dir);
        assert_eq!(back.keepalive_secs, cfg.keepalive_secs);
    }

    #[test]
    fn env_overrides_apply() {
        with_env(
            &[
                ("PEEK_HOST", "0.0.0.0"),
                ("PEEK_PORT", "8080"),
                ("PEEK_KEEPALIVE_SECS", "10"),
            ],
            || {
                let cfg = RelayConfig::default().apply_env_overrides();
                assert_eq!(cfg.host, "0.0.0.0");
                assert_eq!(cfg.port, 8080);
                assert_eq!(cfg.keepalive_secs, 10);
                // Untouched values keep their defaults.
                assert_eq!(cfg.start_port, 9222);
            },
        );
    }

    #[test]
    fn invalid_env_values_are_ignored() {
        with_env(&[("PEEK_PORT", "not-a-port")], || {
            let cfg = RelayConfig::default().apply_env_overrides();
            assert_eq!(cfg.port, 5000);
        });
    }

    #[test]
    fn empty_env_string_is_ignored() {
        with_env(&[("PEEK_HOST", "")], || {
            let cfg = RelayConfig::default().apply_env_overrides();
            assert_eq!(cfg.host, "127.0.0.1");
        });
    }

    #[test]
    fn chrome_path_override() {
        with_env(&[("CHROME_PATH", "/opt/chrome/chrome")], || {
            let cfg = RelayConfig::default().apply_env_overrides();
            assert_eq!(cfg.chrome_path, Some(PathBuf::from("/opt/chrome/chrome")));
        });
    }
}
