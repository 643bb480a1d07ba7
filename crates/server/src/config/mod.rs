mod auth;
mod rate_limit;
mod server;
mod store;

#[cfg(test)]
mod tests;

pub use auth::*;
pub use rate_limit::*;
pub use server::*;
pub use store::*;

use serde::Deserialize;

use crate::error::ServerError;

/// Top-level configuration for the Hololith server, loaded from a TOML file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HololithConfig {
    /// HTTP server bind configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Repository backend configuration.
    #[serde(default)]
    pub store: StoreConfig,
    /// Token signing configuration.
    #[serde(default)]
    pub auth: AuthConfig,
    /// Per-client request limits.
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    /// Startup seeding of plans and tags.
    #[serde(default)]
    pub seed: SeedConfig,
}

impl HololithConfig {
    /// Parse a TOML document. An empty document yields all defaults.
    pub fn from_toml(contents: &str) -> Result<Self, ServerError> {
        let config: Self =
            toml::from_str(contents).map_err(|e| ServerError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the server cannot start with.
    pub fn validate(&self) -> Result<(), ServerError> {
        self.auth.validate()?;
        self.store.validate()?;
        if !self.server.api_prefix.is_empty() && !self.server.api_prefix.starts_with('/') {
            return Err(ServerError::Config(format!(
                "server.api_prefix must start with '/': {}",
                self.server.api_prefix
            )));
        }
        Ok(())
    }
}

/// Startup seeding configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SeedConfig {
    /// Upsert the built-in plans and tags when the server starts.
    #[serde(default = "default_seed_enabled")]
    pub enabled: bool,
}

impl Default for SeedConfig {
    fn default() -> Self {
        Self {
            enabled: default_seed_enabled(),
        }
    }
}

fn default_seed_enabled() -> bool {
    true
}
