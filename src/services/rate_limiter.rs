use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::Instant;

/// Sliding-window request limiter keyed by client identity.
pub struct RateLimiter {
    window: Duration,
    max_requests: usize,
    /// client -> request times inside the window, oldest first
    windows: DashMap<String, VecDeque<Instant>>,
    /// Last time idle clients were swept out of `windows`.
    last_sweep: Mutex<Instant>,
}

impl RateLimiter {
    pub fn new(window: Duration, max_requests: usize) -> Self {
        Self {
            window,
            max_requests,
            windows: DashMap::new(),
            last_sweep: Mutex::new(Instant::now()),
        }
    }

    pub fn max_requests(&self) -> usize {
        self.max_requests
    }

    /// Record a request for `client`.
    ///
    /// Returns `Err(retry_after)` when the window is already full. Rejected requests are
    /// not recorded.
    pub fn check(&self, client: &str) -> Result<(), Duration> {
        self.check_at(client, Instant::now())
    }

    fn check_at(&self, client: &str, now: Instant) -> Result<(), Duration> {
        // Must run before the entry below is locked.
        self.sweep_at(now);

        let mut times = self.windows.entry(client.to_string()).or_default();

        while let Some(oldest) = times.front() {
            if now.saturating_duration_since(*oldest) >= self.window {
                times.pop_front();
            } else {
                break;
            }
        }

        if times.len() >= self.max_requests {
            let retry_after = times
                .front()
                .map(|oldest| self.window.saturating_sub(now.saturating_duration_since(*oldest)))
                .unwrap_or(self.window);
            return Err(retry_after);
        }

        times.push_back(now);
        Ok(())
    }

    /// Drop clients with no request inside the window, at most once per window.
    fn sweep_at(&self, now: Instant) {
        {
            let mut last_sweep = self.last_sweep.lock();
            if now.saturating_duration_since(*last_sweep) < self.window {
                return;
            }
            *last_sweep = now;
        }

        let window = self.window;
        self.windows.retain(|_, times| {
            times
                .back()
                .map_or(false, |last| now.saturating_duration_since(*last) < window)
        });
    }

    /// Number of clients currently tracked.
    pub fn tracked_clients(&self) -> usize {
        self.windows.len()
    }

    /// Requests currently counted for `client` (as of the last check).
    pub fn in_window(&self, client: &str) -> usize {
        self.windows.get(client).map(|t| t.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limiting() {
        let limiter = RateLimiter::new(Duration::from_secs(60), 2);

        assert!(limiter.check("client1").is_ok());
        assert!(limiter.check("client1").is_ok());
        assert!(limiter.check("client1").is_err()); // Should fail on 3rd attempt
        assert_eq!(limiter.in_window("client1"), 2);
    }

    #[test]
    fn test_clients_are_independent() {
        let limiter = RateLimiter::new(Duration::from_secs(60), 1);

        assert!(limiter.check("a").is_ok());
        assert!(limiter.check("b").is_ok());
        assert!(limiter.check("a").is_err());
    }

    #[test]
    fn test_window_slides() {
        let limiter = RateLimiter::new(Duration::from_secs(60), 2);
        let start = Instant::now();

        assert!(limiter.check_at("c", start).is_ok());
        assert!(limiter.check_at("c", start + Duration::from_secs(30)).is_ok());

        let retry = limiter
            .check_at("c", start + Duration::from_secs(45))
            .unwrap_err();
        assert_eq!(retry, Duration::from_secs(15));

        // First request has left the window, the second has not.
        assert!(limiter.check_at("c", start + Duration::from_secs(60)).is_ok());
        assert_eq!(limiter.in_window("c"), 2);
        assert!(limiter.check_at("c", start + Duration::from_secs(61)).is_err());
    }

    #[test]
    fn test_idle_clients_are_dropped() {
        let limiter = RateLimiter::new(Duration::from_secs(60), 60);
        let start = Instant::now();

        for i in 0..10_000 {
            assert!(limiter.check_at(&format!("10.0.{}.{}", i / 256, i % 256), start).is_ok());
        }
        assert_eq!(limiter.tracked_clients(), 10_000);

        let later = start + Duration::from_secs(3_600);
        assert!(limiter.check_at("192.0.2.1", later).is_ok());
        assert_eq!(limiter.tracked_clients(), 1);
        assert_eq!(limiter.in_window("192.0.2.1"), 1);
    }

    #[test]
    fn test_sweep_keeps_active_clients() {
        let limiter = RateLimiter::new(Duration::from_secs(60), 2);
        let start = Instant::now();

        assert!(limiter.check_at("idle", start).is_ok());
        assert!(limiter.check_at("busy", start + Duration::from_secs(50)).is_ok());
        assert!(limiter.check_at("busy", start + Duration::from_secs(70)).is_ok());

        // Sweep ran at 70s: "idle" is gone, "busy" keeps its limit.
        assert_eq!(limiter.tracked_clients(), 1);
        assert!(limiter.check_at("busy", start + Duration::from_secs(80)).is_err());
    }
}
