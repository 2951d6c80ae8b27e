//! Chrome binary discovery.

use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command;

/// Known Chrome binary locations, in search priority order. The bare names
/// at the end resolve through `PATH`.
const KNOWN_PATHS: &[&str] = &[
    "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
    "/usr/bin/google-chrome",
    "/usr/bin/chromium-browser",
    "chrome",
    "chromium",
];

/// Find a Chrome or Chromium binary that actually runs.
///
/// Search order:
/// 1. `CHROME_PATH` environment variable
/// 2. Known system paths, then bare names resolved through `PATH`
///
/// A candidate is accepted only if a `--version` probe exits successfully,
/// so a stale path or broken install falls through to the next candidate.
/// Returns `None` if nothing answers.
pub async fn find_chrome() -> Option<PathBuf> {
    if let Ok(env_path) = std::env::var("CHROME_PATH") {
        if probe_version(&env_path).await {
            return Some(PathBuf::from(env_path));
        }
        tracing::debug!(path = %env_path, "CHROME_PATH set but version probe failed, falling through");
    }

    for candidate in KNOWN_PATHS {
        if probe_version(candidate).await {
            tracing::debug!(path = %candidate, "found Chrome binary");
            return Some(PathBuf::from(candidate));
        }
    }

    None
}

/// Return the ordered list of candidate paths (excluding the env var).
pub fn search_paths() -> Vec<PathBuf> {
    KNOWN_PATHS.iter().map(PathBuf::from).collect()
}

/// Run `<path> --version` and report whether it exited successfully.
pub async fn probe_version(path: &str) -> bool {
    Command::new(path)
        .arg("--version")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await
        .map(|status| status.success())
        .unwrap_or(false)
}

#[cfg(test)]
#[allow(unsafe_code)]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    /// SAFETY: env var mutation is inherently racy in multi-threaded tests.
    /// These tests always restore the previous value.
    fn set_env(key: &str, val: &str) {
        unsafe { std::env::set_var(key, val) };
    }

    fn remove_env(key: &str) {
        unsafe { std::env::remove_var(key) };
    }

    fn restore_env(key: &str, prev: Option<String>) {
        match prev {
            Some(v) => set_env(key, &v),
            None => remove_env(key),
        }
    }

    fn fake_binary(dir: &std::path::Path, name: &str, script: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, script).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[tokio::test]
    async fn find_chrome_respects_env_var() {
        let dir = tempfile::tempdir().unwrap();
        let fake_chrome = fake_binary(dir.path(), "chrome-test", "#!/bin/sh\nexit 0\n");

        let key = "CHROME_PATH";
        let prev = std::env::var(key).ok();
        set_env(key, fake_chrome.to_str().unwrap());

        let result = find_chrome().await;
        assert_eq!(result, Some(fake_chrome));

        restore_env(key, prev);
    }

    #[tokio::test]
    async fn env_var_failing_probe_falls_through() {
        let dir = tempfile::tempdir().unwrap();
        let broken = fake_binary(dir.path(), "broken", "#!/bin/sh\nexit 1\n");

        let key = "CHROME_PATH";
        let prev = std::env::var(key).ok();
        set_env(key, broken.to_str().unwrap());

        if let Some(path) = find_chrome().await {
            assert_ne!(path, broken);
        }

        restore_env(key, prev);
    }

    #[tokio::test]
    async fn env_var_nonexistent_falls_through() {
        let key = "CHROME_PATH";
        let prev = std::env::var(key).ok();
        set_env(key, "/nonexistent/path/to/chrome");

        if let Some(path) = find_chrome().await {
            assert_ne!(path.to_str().unwrap(), "/nonexistent/path/to/chrome");
        }

        restore_env(key, prev);
    }

    #[test]
    fn search_order_is_deterministic() {
        let paths = search_paths();
        assert_eq!(paths.len(), 5);
        assert_eq!(
            paths[0],
            PathBuf::from("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome")
        );
        assert_eq!(paths[1], PathBuf::from("/usr/bin/google-chrome"));
        assert_eq!(paths[2], PathBuf::from("/usr/bin/chromium-browser"));
        assert_eq!(paths[3], PathBuf::from("chrome"));
        assert_eq!(paths[4], PathBuf::from("chromium"));
    }

    #[tokio::test]
    async fn probe_rejects_missing_binary() {
        assert!(!probe_version("/nonexistent/binary").await);
    }

    #[tokio::test]
    async fn probe_rejects_failing_binary() {
        let dir = tempfile::tempdir().unwrap();
        let broken = fake_binary(dir.path(), "broken", "#!/bin/sh\nexit 3\n");
        assert!(!probe_version(broken.to_str().unwrap()).await);
    }

    #[tokio::test]
    async fn probe_accepts_succeeding_binary() {
        let dir = tempfile::tempdir().unwrap();
        let ok = fake_binary(dir.path(), "ok", "#!/bin/sh\necho 'Chromium 120.0'\nexit 0\n");
        assert!(probe_version(ok.to_str().unwrap()).await);
    }
}
