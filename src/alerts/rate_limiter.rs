//! Per-equipment alert storm limiter
//!
//! Sliding window over event time rather than wall-clock time, so replayed
//! telemetry is limited the same way as live telemetry.

use chrono::{DateTime, Duration, Utc};
use std::collections::VecDeque;

pub struct AlertRateLimiter {
    window: Duration,
    max_per_window: usize,
    issued: VecDeque<DateTime<Utc>>,
}

impl AlertRateLimiter {
    pub fn new(max_per_window: usize, window_secs: i64) -> Self {
        Self {
            window: Duration::seconds(window_secs.max(1)),
            max_per_window,
            issued: VecDeque::new(),
        }
    }

    /// Whether another alert may be opened at `at`.
    pub fn can_issue(&mut self, at: DateTime<Utc>) -> bool {
        let horizon = at - self.window;
        while self.issued.front().is_some_and(|t| *t <= horizon) {
            self.issued.pop_front();
        }
        self.issued.len() < self.max_per_window
    }

    /// Count an opened alert against the window.
    pub fn record(&mut self, at: DateTime<Utc>) {
        self.issued.push_back(at);
    }

    pub fn in_window(&self) -> usize {
        self.issued.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allows_up_to_the_limit() {
        let mut limiter = AlertRateLimiter::new(3, 3600);
        let t0 = Utc::now();
        for i in 0..3 {
            assert!(limiter.can_issue(t0 + Duration::seconds(i)));
            limiter.record(t0 + Duration::seconds(i));
        }
        assert!(!limiter.can_issue(t0 + Duration::seconds(10)));
    }

    #[test]
    fn window_slides_with_event_time() {
        let mut limiter = AlertRateLimiter::new(1, 60);
        let t0 = Utc::now();
        limiter.record(t0);
        assert!(!limiter.can_issue(t0 + Duration::seconds(59)));
        // Expired entries are pruned
        assert!(limiter.can_issue(t0 + Duration::seconds(60)));
        assert_eq!(limiter.in_window(), 0);
    }
}
