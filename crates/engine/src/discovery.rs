use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use hololith_core::{ExploreQuery, Product, Store};
use hololith_store::Repository;

use crate::error::EngineError;

#[derive(Debug, Clone, Default, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ExploreResults {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stores: Option<Vec<Store>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub products: Option<Vec<Product>>,
}

/// The normalized query echoed back with its results.
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ExploreResponse {
    pub query: ExploreQuery,
    pub results: ExploreResults,
}

/// Public search over published stores and products.
#[derive(Clone)]
pub struct DiscoveryService {
    repo: Arc<dyn Repository>,
}

impl DiscoveryService {
    pub fn new(repo: Arc<dyn Repository>) -> Self {
        Self { repo }
    }

    pub async fn explore(&self, query: ExploreQuery) -> Result<ExploreResponse, EngineError> {
        let mut results = ExploreResults::default();
        if query.kind.includes_stores() {
            results.stores = Some(self.repo.search_stores(&query).await?);
        }
        if query.kind.includes_products() {
            results.products = Some(self.repo.search_products(&query).await?);
        }
        debug!(
            q = query.q.as_deref().unwrap_or_default(),
            stores = results.stores.as_ref().map_or(0, Vec::len),
            products = results.products.as_ref().map_or(0, Vec::len),
            "explore"
        );
        Ok(ExploreResponse { query, results })
    }
}
