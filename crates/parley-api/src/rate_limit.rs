use dashmap::DashMap;
use std::time::{Duration, Instant};

use crate::config::RateLimitConfig;
use crate::error::ApiError;

#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    count: u32,
}

/// Fixed-window request counter per caller
pub struct RateLimiter {
    enabled: bool,
    max_requests: u32,
    window: Duration,
    windows: DashMap<String, Window>,
}

impl RateLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            enabled: config.enabled,
            max_requests: config.max_requests.max(1),
            window: Duration::from_secs(config.window_secs.max(1)),
            windows: DashMap::new(),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Count one request for `key`, rejecting it once the window is full
    pub fn check(&self, key: &str) -> Result<(), ApiError> {
        self.check_at(key, Instant::now())
    }

    fn check_at(&self, key: &str, now: Instant) -> Result<(), ApiError> {
        if !self.enabled {
            return Ok(());
        }

        let mut entry = self.windows.entry(key.to_string()).or_insert(Window {
            started: now,
            count: 0,
        });

        let elapsed = now.saturating_duration_since(entry.started);
        if elapsed >= self.window {
            *entry = Window {
                started: now,
                count: 0,
            };
        }

        if entry.count >= self.max_requests {
            let remaining = self.window.saturating_sub(elapsed);
            // Round up so clients never retry inside the window
            let retry_after_secs = remaining.as_secs() + u64::from(remaining.subsec_nanos() > 0);
            tracing::warn!(key, retry_after_secs, "Rate limit exceeded");
            return Err(ApiError::RateLimited { retry_after_secs });
        }

        entry.count += 1;
        Ok(())
    }

    /// Drop windows that have fully elapsed
    pub fn prune(&self) {
        self.prune_at(Instant::now());
    }

    fn prune_at(&self, now: Instant) {
        self.windows
            .retain(|_, w| now.saturating_duration_since(w.started) < self.window);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(max_requests: u32) -> RateLimiter {
        RateLimiter::new(&RateLimitConfig {
            enabled: true,
            max_requests,
            window_secs: 60,
        })
    }

    #[test]
    fn test_allows_up_to_limit() {
        let limiter = limiter(3);
        let now = Instant::now();
        for _ in 0..3 {
            assert!(limiter.check_at("u1", now).is_ok());
        }
        match limiter.check_at("u1", now + Duration::from_secs(10)) {
            Err(ApiError::RateLimited { retry_after_secs }) => assert_eq!(retry_after_secs, 50),
            other => panic!("expected rate limit, got {:?}", other),
        }
    }

    #[test]
    fn test_keys_are_independent() {
        let limiter = limiter(1);
        let now = Instant::now();
        assert!(limiter.check_at("u1", now).is_ok());
        assert!(limiter.check_at("u2", now).is_ok());
        assert!(limiter.check_at("u1", now).is_err());
    }

    #[test]
    fn test_window_resets() {
        let limiter = limiter(1);
        let now = Instant::now();
        assert!(limiter.check_at("u1", now).is_ok());
        assert!(limiter.check_at("u1", now).is_err());
        assert!(limiter.check_at("u1", now + Duration::from_secs(60)).is_ok());
    }

    #[test]
    fn test_prune_drops_elapsed_windows() {
        let limiter = limiter(5);
        let now = Instant::now();
        assert!(limiter.check_at("u1", now).is_ok());
        assert!(limiter.check_at("u2", now + Duration::from_secs(30)).is_ok());

        limiter.prune_at(now + Duration::from_secs(60));

        assert!(!limiter.windows.contains_key("u1"));
        assert!(limiter.windows.contains_key("u2"));
    }

    #[test]
    fn test_disabled_never_limits() {
        let limiter = RateLimiter::new(&RateLimitConfig {
            enabled: false,
            max_requests: 1,
            window_secs: 60,
        });
        for _ in 0..5 {
            assert!(limiter.check("u1").is_ok());
        }
    }
}
