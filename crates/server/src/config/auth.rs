use serde::Deserialize;

use crate::error::ServerError;

/// Shortest accepted signing secret.
pub const MIN_SECRET_LEN: usize = 16;

/// JWT signing configuration.
///
/// Access and refresh tokens are signed with separate secrets so a leaked
/// access secret cannot mint refresh tokens.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// HMAC secret for access tokens.
    #[serde(default = "default_access_secret")]
    pub access_secret: String,
    /// HMAC secret for refresh tokens.
    #[serde(default = "default_refresh_secret")]
    pub refresh_secret: String,
    /// Access token lifetime in seconds.
    #[serde(default = "default_access_expiry")]
    pub access_expiry_seconds: u64,
    /// Refresh token lifetime in seconds.
    #[serde(default = "default_refresh_expiry")]
    pub refresh_expiry_seconds: u64,
}

impl AuthConfig {
    pub(crate) fn validate(&self) -> Result<(), ServerError> {
        for (name, secret) in [
            ("auth.access_secret", &self.access_secret),
            ("auth.refresh_secret", &self.refresh_secret),
        ] {
            if secret.chars().count() < MIN_SECRET_LEN {
                return Err(ServerError::Config(format!(
                    "{name} must be at least {MIN_SECRET_LEN} characters"
                )));
            }
        }
        Ok(())
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            access_secret: default_access_secret(),
            refresh_secret: default_refresh_secret(),
            access_expiry_seconds: default_access_expiry(),
            refresh_expiry_seconds: default_refresh_expiry(),
        }
    }
}

fn default_access_secret() -> String {
    "dev-access-secret-change-me".to_owned()
}

fn default_refresh_secret() -> String {
    "dev-refresh-secret-change-me".to_owned()
}

fn default_access_expiry() -> u64 {
    900
}

fn default_refresh_expiry() -> u64 {
    2_592_000
}
