//! Brute-force login throttle.
//!
//! A stateful counter keyed by `(client address, submitted email)` over a
//! sliding 24h window. Exceeding the threshold is treated as an attack on
//! the account: the caller disables it and scrambles its password, so only
//! the reset flow can recover access.

use std::time::{Duration, Instant};

use dashmap::DashMap;

/// Default maximum failed attempts per key per window.
pub const DEFAULT_THRESHOLD: u32 = 10;

/// Default window: 24 hours.
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Clone, Copy)]
struct Window {
    failures: u32,
    started_at: Instant,
}

/// Per-`(addr, email)` failed-attempt counter.
#[derive(Debug)]
pub struct LoginThrottle {
    attempts: DashMap<String, Window>,
    threshold: u32,
    window: Duration,
}

impl LoginThrottle {
    pub fn new(threshold: u32, window: Duration) -> Self {
        Self {
            attempts: DashMap::new(),
            threshold,
            window,
        }
    }

    fn key(addr: &str, email: &str) -> String {
        format!("{addr}-{email}")
    }

    /// Whether a login attempt from this key may proceed. An expired window
    /// is pruned on touch.
    pub fn is_blocked(&self, addr: &str, email: &str) -> bool {
        let key = Self::key(addr, email);
        let Some(window) = self.attempts.get(&key).map(|w| *w) else {
            return false;
        };
        if window.started_at.elapsed() >= self.window {
            drop(self.attempts.remove(&key));
            return false;
        }
        window.failures >= self.threshold
    }

    /// Record a failed attempt, returning the new failure count.
    pub fn record_failure(&self, addr: &str, email: &str) -> u32 {
        let key = Self::key(addr, email);
        let mut entry = self.attempts.entry(key).or_insert(Window {
            failures: 0,
            started_at: Instant::now(),
        });
        if entry.started_at.elapsed() >= self.window {
            entry.failures = 0;
            entry.started_at = Instant::now();
        }
        entry.failures += 1;
        entry.failures
    }

    /// Clear the counter after a successful login.
    pub fn clear(&self, addr: &str, email: &str) {
        self.attempts.remove(&Self::key(addr, email));
    }
}

impl Default for LoginThrottle {
    fn default() -> Self {
        Self::new(DEFAULT_THRESHOLD, DEFAULT_WINDOW)
    }
}
