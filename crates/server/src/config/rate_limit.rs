use serde::Deserialize;

/// Fixed-window request limits, per client and route class.
#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    /// Whether rate limiting is enabled.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Limit for routes without a dedicated class.
    #[serde(default = "default_per_minute")]
    pub default_per_minute: u64,
    /// Limit for view ingestion (`/analytics/view`, `/analytics/batch`).
    #[serde(default = "default_view_per_minute")]
    pub view_per_minute: u64,
    #[serde(default = "default_register_per_minute")]
    pub register_per_minute: u64,
    #[serde(default = "default_login_per_minute")]
    pub login_per_minute: u64,
    #[serde(default = "default_refresh_per_minute")]
    pub refresh_per_minute: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            default_per_minute: default_per_minute(),
            view_per_minute: default_view_per_minute(),
            register_per_minute: default_register_per_minute(),
            login_per_minute: default_login_per_minute(),
            refresh_per_minute: default_refresh_per_minute(),
        }
    }
}

fn default_enabled() -> bool {
    true
}

fn default_per_minute() -> u64 {
    200
}

fn default_view_per_minute() -> u64 {
    60
}

fn default_register_per_minute() -> u64 {
    5
}

fn default_login_per_minute() -> u64 {
    10
}

fn default_refresh_per_minute() -> u64 {
    30
}
