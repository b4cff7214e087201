//! Sliding-window request throttle
//!
//! Bounds the number of provider requests issued over a trailing window.
//! Expired timestamps are pruned lazily on every query or record call; there
//! is no background timer. The limiter is owned by the processing task and
//! touched from that single task only, so it carries no lock. Built on
//! `tokio::time` so tests can run under a paused clock.

use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Sliding-window limiter bounded by `max_requests` over `time_window`
///
/// This component cannot fail, only delay.
#[derive(Debug)]
pub struct SlidingWindowLimiter {
    max_requests: usize,
    time_window: Duration,
    timestamps: VecDeque<Instant>,
}

impl SlidingWindowLimiter {
    pub fn new(max_requests: usize, time_window: Duration) -> Self {
        Self {
            max_requests,
            time_window,
            timestamps: VecDeque::new(),
        }
    }

    /// Record that a request was just issued
    pub fn record_request(&mut self) {
        self.prune(Instant::now());
        self.timestamps.push_back(Instant::now());
    }

    /// Remaining time until the window has capacity again; zero when a
    /// request may be issued immediately
    pub fn time_until_available(&mut self) -> Duration {
        let now = Instant::now();
        self.prune(now);

        if self.timestamps.len() < self.max_requests {
            return Duration::ZERO;
        }

        // Oldest in-window timestamp leaves the window first
        match self.timestamps.front() {
            Some(oldest) => {
                let elapsed = now.saturating_duration_since(*oldest);
                self.time_window.saturating_sub(elapsed)
            }
            None => Duration::ZERO,
        }
    }

    /// Sleep until the window allows another request, honoring a minimum
    /// spacing between requests
    ///
    /// This is the pipeline's only suspension point tied to throttling.
    pub async fn wait_if_needed(&mut self, min_delay: Duration) {
        let wait = self.time_until_available().max(min_delay);
        if !wait.is_zero() {
            debug!("Rate limit reached, sleeping {:?}", wait);
            tokio::time::sleep(wait).await;
        }
    }

    fn prune(&mut self, now: Instant) {
        while let Some(oldest) = self.timestamps.front() {
            if now.saturating_duration_since(*oldest) >= self.time_window {
                self.timestamps.pop_front();
            } else {
                break;
            }
        }
    }

    /// Number of requests currently inside the window
    pub fn in_flight(&mut self) -> usize {
        self.prune(Instant::now());
        self.timestamps.len()
    }
}
