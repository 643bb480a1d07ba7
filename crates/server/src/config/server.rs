use serde::Deserialize;

/// HTTP server bind configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Address to bind to.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Path prefix for every API route. Swagger UI and the OpenAPI document
    /// are served outside of it.
    #[serde(default = "default_api_prefix")]
    pub api_prefix: String,
    /// Comma-separated list of allowed CORS origins.
    ///
    /// When unset, CORS is permissive.
    pub cors_origin: Option<String>,
    /// Deployment environment name. `"production"` disables admin tag creation.
    #[serde(default = "default_environment")]
    pub environment: String,
}

impl ServerConfig {
    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }

    /// Configured CORS origins, trimmed, with empty entries dropped.
    pub fn cors_origins(&self) -> Vec<String> {
        self.cors_origin
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_owned)
            .collect()
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            api_prefix: default_api_prefix(),
            cors_origin: None,
            environment: default_environment(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_owned()
}

fn default_port() -> u16 {
    3000
}

fn default_api_prefix() -> String {
    "/api/v1".to_owned()
}

fn default_environment() -> String {
    "development".to_owned()
}
