//! Hololith HTTP Client
//!
//! A native Rust client for the public surface of the Hololith storefront
//! backend: view ingestion, discovery and health.
//!
//! # Quick Start
//!
//! ```no_run
//! use hololith_client::HololithClient;
//! use hololith_core::{StoreId, ViewEventInput, ViewTarget};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), hololith_client::Error> {
//!     let client = HololithClient::new("http://localhost:3000")?;
//!
//!     if client.health().await? {
//!         println!("Server is healthy");
//!     }
//!
//!     let view = ViewEventInput::for_target(
//!         &ViewTarget::Store(StoreId::new("store-1")),
//!         Some("viewer-123456".into()),
//!     );
//!     let outcome = client.track_view(&view).await?;
//!     println!("deduped: {}", outcome.deduped);
//!     Ok(())
//! }
//! ```
//!
//! For storefront pages that report many views, [`ViewTracker`] buffers
//! events and ships them in batches from a background task.

mod error;
pub mod tracker;

pub use error::Error;
pub use tracker::{ViewSink, ViewTracker, ViewTrackerConfig};

use std::time::Duration;

use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use hololith_core::{
    ExploreKind, ExploreQuery, ExploreSort, Product, Store, TrackOutcome, ViewEventInput,
};

/// Default request timeout.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default mount point of the API routes.
pub const DEFAULT_API_PREFIX: &str = "/api/v1";

/// HTTP client for the Hololith storefront backend.
#[derive(Debug, Clone)]
pub struct HololithClient {
    client: Client,
    base_url: String,
    api_prefix: String,
    bearer_token: Option<String>,
}

/// Builder for configuring a [`HololithClient`].
#[derive(Debug)]
pub struct HololithClientBuilder {
    base_url: String,
    api_prefix: String,
    timeout: Duration,
    bearer_token: Option<String>,
    client: Option<Client>,
}

impl HololithClientBuilder {
    /// Create a new builder with the given base URL.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_prefix: DEFAULT_API_PREFIX.to_owned(),
            timeout: DEFAULT_TIMEOUT,
            bearer_token: None,
            client: None,
        }
    }

    /// Set the request timeout.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the API prefix. An empty prefix mounts routes at the root.
    #[must_use]
    pub fn api_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.api_prefix = prefix.into().trim_end_matches('/').to_string();
        self
    }

    /// Send `Authorization: Bearer <token>` with every request.
    #[must_use]
    pub fn bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    /// Use a custom reqwest Client.
    #[must_use]
    pub fn client(mut self, client: Client) -> Self {
        self.client = Some(client);
        self
    }

    /// Build the client.
    pub fn build(self) -> Result<HololithClient, Error> {
        if self.base_url.is_empty() {
            return Err(Error::Configuration("base URL must not be empty".into()));
        }
        let client = match self.client {
            Some(c) => c,
            None => Client::builder()
                .timeout(self.timeout)
                .build()
                .map_err(|e| Error::Configuration(e.to_string()))?,
        };

        Ok(HololithClient {
            client,
            base_url: self.base_url,
            api_prefix: self.api_prefix,
            bearer_token: self.bearer_token,
        })
    }
}

impl HololithClient {
    /// Create a client with default configuration.
    pub fn new(base_url: impl Into<String>) -> Result<Self, Error> {
        HololithClientBuilder::new(base_url).build()
    }

    /// Create a builder for advanced configuration.
    pub fn builder(base_url: impl Into<String>) -> HololithClientBuilder {
        HololithClientBuilder::new(base_url)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}{}{}", self.base_url, self.api_prefix, path)
    }

    fn add_auth(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.bearer_token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    async fn send<T: DeserializeOwned>(&self, req: reqwest::RequestBuilder) -> Result<T, Error> {
        let response = self
            .add_auth(req)
            .send()
            .await
            .map_err(|e| Error::Connection(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            response
                .json::<T>()
                .await
                .map_err(|e| Error::Deserialization(e.to_string()))
        } else {
            let message = response
                .json::<ErrorResponse>()
                .await
                .map_or_else(|_| status.to_string(), |body| body.message);
            Err(Error::Http {
                status: status.as_u16(),
                message,
            })
        }
    }

    // =========================================================================
    // Health
    // =========================================================================

    /// Check whether the server and its database are up.
    pub async fn health(&self) -> Result<bool, Error> {
        let url = format!("{}/health/db", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::Connection(e.to_string()))?;
        Ok(response.status().is_success())
    }

    // =========================================================================
    // Analytics
    // =========================================================================

    /// Record a single view.
    pub async fn track_view(&self, event: &ViewEventInput) -> Result<TrackOutcome, Error> {
        let req = self.client.post(self.api_url("/analytics/view")).json(event);
        self.send(req).await
    }

    /// Record up to 50 views. Returns how many the server accepted.
    pub async fn track_batch(&self, events: &[ViewEventInput]) -> Result<usize, Error> {
        let req = self
            .client
            .post(self.api_url("/analytics/batch"))
            .json(&BatchBody { events });
        let reply: BatchReply = self.send(req).await?;
        Ok(reply.count)
    }

    // =========================================================================
    // Discovery
    // =========================================================================

    /// Search published stores and products.
    pub async fn explore(&self, query: &ExploreQuery) -> Result<ExploreResponse, Error> {
        let req = self
            .client
            .get(self.api_url("/explore"))
            .query(&explore_params(query));
        self.send(req).await
    }
}

fn explore_params(query: &ExploreQuery) -> Vec<(&'static str, String)> {
    let mut params = Vec::with_capacity(6);
    if let Some(q) = &query.q {
        params.push(("q", q.clone()));
    }
    if !query.tags.is_empty() {
        params.push(("tags", query.tags.join(",")));
    }
    let kind = match query.kind {
        ExploreKind::Store => "store",
        ExploreKind::Product => "product",
        ExploreKind::All => "all",
    };
    let sort = match query.sort {
        ExploreSort::New => "new",
        ExploreSort::Name => "name",
        ExploreSort::Price => "price",
    };
    params.push(("type", kind.to_owned()));
    params.push(("sort", sort.to_owned()));
    params.push(("limit", query.limit.to_string()));
    params.push(("offset", query.offset.to_string()));
    params
}

// =============================================================================
// Response Types
// =============================================================================

/// Error body returned by the API.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub status_code: u16,
    /// HTTP reason phrase.
    pub error: String,
    pub message: String,
    pub timestamp: String,
}

#[derive(Serialize)]
struct BatchBody<'a> {
    events: &'a [ViewEventInput],
}

#[derive(Deserialize)]
struct BatchReply {
    count: usize,
}

/// Listings returned by [`HololithClient::explore`]. A kind that was not
/// requested is `None`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExploreResults {
    #[serde(default)]
    pub stores: Option<Vec<Store>>,
    #[serde(default)]
    pub products: Option<Vec<Product>>,
}

/// The server's normalized query with its results.
#[derive(Debug, Clone, Deserialize)]
pub struct ExploreResponse {
    pub query: ExploreQuery,
    pub results: ExploreResults,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_normalizes_urls() {
        let client = HololithClient::builder("http://localhost:3000/")
            .api_prefix("/api/v2/")
            .build()
            .unwrap();
        assert_eq!(client.base_url(), "http://localhost:3000");
        assert_eq!(
            client.api_url("/explore"),
            "http://localhost:3000/api/v2/explore"
        );
    }

    #[test]
    fn empty_base_url_is_rejected() {
        let err = HololithClient::new("").unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn explore_params_use_wire_names() {
        let query = ExploreQuery::normalized(
            Some("lamp"),
            Some("sale,new"),
            ExploreKind::Product,
            ExploreSort::Price,
            Some(10),
            None,
        );
        let params = explore_params(&query);
        assert!(params.contains(&("q", "lamp".to_owned())));
        assert!(params.contains(&("tags", "sale,new".to_owned())));
        assert!(params.contains(&("type", "product".to_owned())));
        assert!(params.contains(&("sort", "price".to_owned())));
        assert!(params.contains(&("limit", "10".to_owned())));
        assert!(params.contains(&("offset", "0".to_owned())));
    }

    #[test]
    fn explore_response_tolerates_missing_kinds() {
        let body = serde_json::json!({
            "query": {"q": null, "tags": [], "type": "store", "sort": "new", "limit": 20, "offset": 0},
            "results": {"stores": []}
        });
        let parsed: ExploreResponse = serde_json::from_value(body).unwrap();
        assert_eq!(parsed.query.kind, ExploreKind::Store);
        assert!(parsed.results.products.is_none());
    }

    #[tokio::test]
    async fn unreachable_server_is_a_connection_error() {
        let client = HololithClient::builder("http://127.0.0.1:9")
            .timeout(Duration::from_millis(500))
            .build()
            .unwrap();
        let err = client.health().await.unwrap_err();
        assert!(err.is_retryable());
    }
}
