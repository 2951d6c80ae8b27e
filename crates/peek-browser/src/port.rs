//! Debug port allocation by bind-and-release probing.

use crate::error::LaunchError;
use std::collections::HashSet;
use std::net::TcpListener;

/// First debug port probed by default.
pub const DEFAULT_START_PORT: u16 = 9222;
/// Number of ports probed by default.
pub const DEFAULT_PORT_RANGE: u16 = 100;

/// Find a free loopback port in `start..start+range`.
///
/// Each candidate is probed by binding `127.0.0.1:<port>` and immediately
/// releasing it; the first successful bind wins. The probe is inherently
/// racy against other processes on the host, so callers treat a subsequent
/// port-in-use launch failure as retryable rather than fatal.
pub fn allocate(start: u16, range: u16) -> Result<u16, LaunchError> {
    allocate_excluding(start, range, &HashSet::new())
}

/// Like [`allocate`], but skips ports the caller already handed out.
///
/// The exclusion set closes the window between allocating a port for one
/// task and its browser actually binding it: ports assigned to tracked
/// instances are never offered again even while still technically free.
pub fn allocate_excluding(
    start: u16,
    range: u16,
    in_use: &HashSet<u16>,
) -> Result<u16, LaunchError> {
    let end = start.saturating_add(range);
    for port in start..end {
        if in_use.contains(&port) {
            continue;
        }
        if TcpListener::bind(("127.0.0.1", port)).is_ok() {
            return Ok(port);
        }
    }
    Err(LaunchError::NoPortAvailable { start, range })
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    /// Find a base port with a stretch of free ports for the test to play in.
    ///
    /// Each test searches its own region so parallel tests never fight over
    /// the same ports.
    fn free_base(region_start: u16) -> u16 {
        allocate(region_start, 2_000).expect("test host has a free port")
    }

    #[test]
    fn returns_first_free_port() {
        let base = free_base(24_000);
        let port = allocate(base, 10).unwrap();
        assert_eq!(port, base);
    }

    #[test]
    fn skips_busy_ports() {
        let base = free_base(26_000);
        // Occupy base..base+4 and base+5..base+8, leaving base+4 free.
        let mut held = Vec::new();
        for offset in [0, 1, 2, 3, 5, 6, 7] {
            if let Ok(listener) = TcpListener::bind(("127.0.0.1", base + offset)) {
                held.push(listener);
            }
        }
        let port = allocate(base, 100).unwrap();
        assert!(port >= base + 4, "expected a port past the held block, got {port}");
        drop(held);
    }

    #[test]
    fn exhausted_range_fails() {
        let base = free_base(28_000);
        let _held: Vec<_> = (0..3)
            .filter_map(|off| TcpListener::bind(("127.0.0.1", base + off)).ok())
            .collect();
        assert_matches!(
            allocate(base, 3),
            Err(LaunchError::NoPortAvailable { range: 3, .. })
        );
    }

    #[test]
    fn zero_range_fails() {
        assert_matches!(
            allocate(DEFAULT_START_PORT, 0),
            Err(LaunchError::NoPortAvailable { .. })
        );
    }

    #[test]
    fn exclusions_are_never_offered() {
        let base = free_base(30_000);
        let in_use: HashSet<u16> = [base, base + 1].into_iter().collect();
        let port = allocate_excluding(base, 10, &in_use).unwrap();
        assert!(port >= base + 2);
    }

    #[test]
    fn range_end_saturates_instead_of_wrapping() {
        // A range that would overflow u16 must not wrap around to low ports.
        let result = allocate(u16::MAX - 1, 100);
        if let Ok(port) = result {
            assert!(port >= u16::MAX - 1);
        }
    }
}
