//! Fixed-window rate limiting per client key
//!
//! Each client key (API key or caller IP) owns one window. Windows live in
//! a concurrent map so one client's check never waits on another's.

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use dashmap::DashMap;

#[derive(Debug, Clone)]
struct RateWindow {
    count: u32,
    window_start: Instant,
    window_start_utc: DateTime<Utc>,
}

impl RateWindow {
    fn starting_now() -> Self {
        Self {
            count: 0,
            window_start: Instant::now(),
            window_start_utc: Utc::now(),
        }
    }
}

/// Rejection returned when a client has used up its window
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitExceeded {
    /// When the current window ends
    pub reset_at: DateTime<Utc>,
    /// Time left in the current window
    pub retry_after: Duration,
}

/// Per-client usage in the current window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitStats {
    pub count: u32,
    pub remaining: u32,
}

/// Fixed-window limiter; `max_requests == 0` disables limiting
#[derive(Debug)]
pub struct FixedWindowRateLimiter {
    max_requests: u32,
    window: Duration,
    windows: DashMap<String, RateWindow>,
}

impl FixedWindowRateLimiter {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            windows: DashMap::new(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.max_requests > 0 && !self.window.is_zero()
    }

    /// Count one request for `client_key`, or reject it with a reset hint
    pub fn check(&self, client_key: &str) -> Result<(), RateLimitExceeded> {
        if !self.is_enabled() {
            return Ok(());
        }

        let mut entry = self
            .windows
            .entry(client_key.to_string())
            .or_insert_with(RateWindow::starting_now);

        if entry.window_start.elapsed() >= self.window {
            *entry = RateWindow::starting_now();
        }

        if entry.count >= self.max_requests {
            let retry_after = self.window.saturating_sub(entry.window_start.elapsed());
            let reset_at = entry.window_start_utc
                + chrono::Duration::from_std(self.window).unwrap_or_else(|_| chrono::Duration::zero());

            log::debug!("Rate limit exceeded for client, window resets in {:?}", retry_after);
            return Err(RateLimitExceeded { reset_at, retry_after });
        }

        entry.count += 1;
        Ok(())
    }

    pub fn stats(&self, client_key: &str) -> Option<RateLimitStats> {
        self.windows.get(client_key).map(|w| RateLimitStats {
            count: w.count,
            remaining: self.max_requests.saturating_sub(w.count),
        })
    }

    /// Drop windows that have expired; returns how many were removed
    pub fn purge_expired(&self) -> usize {
        let before = self.windows.len();
        self.windows.retain(|_, w| w.window_start.elapsed() < self.window);
        before.saturating_sub(self.windows.len())
    }
}
