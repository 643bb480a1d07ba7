use std::time::Duration;

use dashmap::DashMap;
use tokio::time::Instant;

use crate::config::RateLimitConfig;

/// Bucket identifier for callers without an `x-forwarded-for` address.
pub const ANONYMOUS_BUCKET: &str = "anonymous";

/// Length of one counting window.
pub const WINDOW: Duration = Duration::from_secs(60);

/// Above this many tracked buckets, expired windows are swept on insert.
const SWEEP_THRESHOLD: usize = 10_000;

/// Routes that share a limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RouteClass {
    /// `/analytics/view` and `/analytics/batch`.
    View,
    Register,
    Login,
    Refresh,
    Default,
}

impl RouteClass {
    /// Classify a request path. The API prefix is ignored.
    pub fn classify(path: &str) -> Self {
        let path = path.trim_end_matches('/');
        if path.ends_with("/analytics/view") || path.ends_with("/analytics/batch") {
            Self::View
        } else if path.ends_with("/auth/register") {
            Self::Register
        } else if path.ends_with("/auth/login") {
            Self::Login
        } else if path.ends_with("/auth/refresh") {
            Self::Refresh
        } else {
            Self::Default
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::View => "view",
            Self::Register => "register",
            Self::Login => "login",
            Self::Refresh => "refresh",
            Self::Default => "default",
        }
    }
}

/// Result of a rate limit check.
#[derive(Debug, Clone)]
pub struct RateLimitResult {
    /// The configured limit for this class.
    pub limit: u64,
    /// Remaining requests in the current window.
    pub remaining: u64,
    /// Seconds until the current window resets.
    pub reset_after: u64,
}

/// Error returned when rate limit is exceeded.
#[derive(Debug)]
pub struct RateLimitExceeded {
    /// Seconds until the caller can retry.
    pub retry_after: u64,
    /// The configured limit.
    pub limit: u64,
}

#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    count: u64,
}

/// In-process fixed-window rate limiter keyed by route class and client.
pub struct RateLimiter {
    config: RateLimitConfig,
    windows: DashMap<String, Window>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            windows: DashMap::new(),
        }
    }

    /// Get the rate limit configuration.
    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    pub fn limit_for(&self, class: RouteClass) -> u64 {
        match class {
            RouteClass::View => self.config.view_per_minute,
            RouteClass::Register => self.config.register_per_minute,
            RouteClass::Login => self.config.login_per_minute,
            RouteClass::Refresh => self.config.refresh_per_minute,
            RouteClass::Default => self.config.default_per_minute,
        }
    }

    /// Check and record a request for the given client.
    ///
    /// Returns `Ok(RateLimitResult)` if allowed, `Err(RateLimitExceeded)` if blocked.
    pub fn check(
        &self,
        class: RouteClass,
        client: &str,
    ) -> Result<RateLimitResult, RateLimitExceeded> {
        let limit = self.limit_for(class);
        let now = Instant::now();
        let key = format!("{}:{client}", class.as_str());

        if self.windows.len() > SWEEP_THRESHOLD {
            self.windows
                .retain(|_, w| now.duration_since(w.started) < WINDOW);
        }

        let mut entry = self.windows.entry(key).or_insert(Window {
            started: now,
            count: 0,
        });
        if now.duration_since(entry.started) >= WINDOW {
            *entry = Window {
                started: now,
                count: 0,
            };
        }

        let reset_after = seconds_until_reset(entry.started, now);
        if entry.count >= limit {
            return Err(RateLimitExceeded {
                retry_after: reset_after.max(1),
                limit,
            });
        }
        entry.count += 1;

        Ok(RateLimitResult {
            limit,
            remaining: limit - entry.count,
            reset_after,
        })
    }
}

fn seconds_until_reset(started: Instant, now: Instant) -> u64 {
    let left = WINDOW.saturating_sub(now.duration_since(started));
    // Round up so a client never retries a fraction of a second early.
    left.as_secs() + u64::from(left.subsec_nanos() > 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter() -> RateLimiter {
        RateLimiter::new(RateLimitConfig {
            register_per_minute: 2,
            ..RateLimitConfig::default()
        })
    }

    #[test]
    fn classifies_routes() {
        assert_eq!(RouteClass::classify("/api/v1/analytics/view"), RouteClass::View);
        assert_eq!(RouteClass::classify("/analytics/batch/"), RouteClass::View);
        assert_eq!(RouteClass::classify("/api/v1/auth/register"), RouteClass::Register);
        assert_eq!(RouteClass::classify("/api/v1/auth/login"), RouteClass::Login);
        assert_eq!(RouteClass::classify("/api/v1/auth/refresh"), RouteClass::Refresh);
        assert_eq!(RouteClass::classify("/api/v1/stores"), RouteClass::Default);
        assert_eq!(
            RouteClass::classify("/api/v1/dashboard/analytics/overview"),
            RouteClass::Default
        );
    }

    #[test]
    fn default_limits() {
        let rl = RateLimiter::new(RateLimitConfig::default());
        assert_eq!(rl.limit_for(RouteClass::View), 60);
        assert_eq!(rl.limit_for(RouteClass::Register), 5);
        assert_eq!(rl.limit_for(RouteClass::Login), 10);
        assert_eq!(rl.limit_for(RouteClass::Refresh), 30);
        assert_eq!(rl.limit_for(RouteClass::Default), 200);
    }

    #[tokio::test(start_paused = true)]
    async fn blocks_after_limit_until_window_resets() {
        let rl = limiter();
        let first = rl.check(RouteClass::Register, "10.0.0.1").unwrap();
        assert_eq!(first.remaining, 1);
        assert_eq!(first.reset_after, 60);
        assert_eq!(rl.check(RouteClass::Register, "10.0.0.1").unwrap().remaining, 0);

        let blocked = rl.check(RouteClass::Register, "10.0.0.1").unwrap_err();
        assert_eq!(blocked.limit, 2);
        assert_eq!(blocked.retry_after, 60);

        tokio::time::advance(Duration::from_secs(45)).await;
        let blocked = rl.check(RouteClass::Register, "10.0.0.1").unwrap_err();
        assert_eq!(blocked.retry_after, 15);

        tokio::time::advance(Duration::from_secs(15)).await;
        assert!(rl.check(RouteClass::Register, "10.0.0.1").is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn clients_and_classes_are_independent() {
        let rl = limiter();
        rl.check(RouteClass::Register, "a").unwrap();
        rl.check(RouteClass::Register, "a").unwrap();
        assert!(rl.check(RouteClass::Register, "a").is_err());
        assert!(rl.check(RouteClass::Register, "b").is_ok());
        assert!(rl.check(RouteClass::Login, "a").is_ok());
    }
}
