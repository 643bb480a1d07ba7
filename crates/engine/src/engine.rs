use std::sync::Arc;

use hololith_store::Repository;

use crate::analytics::ViewDedupEngine;
use crate::builder::EngineBuilder;
use crate::catalog::ProductService;
use crate::clock::Clock;
use crate::discovery::DiscoveryService;
use crate::error::EngineError;
use crate::pages::PageService;
use crate::quota::QuotaEngine;
use crate::seed::{SeedReport, seed_catalog};
use crate::stores::StoreService;
use crate::tags::{TagService, TagTierGate};
use crate::tenants::TenantService;

/// Every business service, sharing one repository and one clock.
///
/// Cheap to clone; the HTTP layer keeps one in its application state.
#[derive(Clone)]
pub struct Engine {
    repo: Arc<dyn Repository>,
    clock: Arc<dyn Clock>,
    quota: QuotaEngine,
    views: ViewDedupEngine,
    tenants: TenantService,
    stores: StoreService,
    products: ProductService,
    pages: PageService,
    tags: TagService,
    discovery: DiscoveryService,
}

impl Engine {
    pub fn builder(repo: Arc<dyn Repository>) -> EngineBuilder {
        EngineBuilder::new(repo)
    }

    pub(crate) fn assemble(repo: Arc<dyn Repository>, clock: Arc<dyn Clock>) -> Self {
        let quota = QuotaEngine::new(Arc::clone(&repo));
        Self {
            views: ViewDedupEngine::new(Arc::clone(&repo), Arc::clone(&clock)),
            tenants: TenantService::new(Arc::clone(&repo), Arc::clone(&clock)),
            stores: StoreService::new(Arc::clone(&repo), Arc::clone(&clock), quota.clone()),
            products: ProductService::new(Arc::clone(&repo), Arc::clone(&clock), quota.clone()),
            pages: PageService::new(Arc::clone(&repo), Arc::clone(&clock)),
            tags: TagService::new(
                Arc::clone(&repo),
                Arc::clone(&clock),
                TagTierGate::new(quota.clone()),
            ),
            discovery: DiscoveryService::new(Arc::clone(&repo)),
            quota,
            repo,
            clock,
        }
    }

    pub fn repository(&self) -> &Arc<dyn Repository> {
        &self.repo
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn quota(&self) -> &QuotaEngine {
        &self.quota
    }

    pub fn views(&self) -> &ViewDedupEngine {
        &self.views
    }

    pub fn tenants(&self) -> &TenantService {
        &self.tenants
    }

    pub fn stores(&self) -> &StoreService {
        &self.stores
    }

    pub fn products(&self) -> &ProductService {
        &self.products
    }

    pub fn pages(&self) -> &PageService {
        &self.pages
    }

    pub fn tags(&self) -> &TagService {
        &self.tags
    }

    pub fn discovery(&self) -> &DiscoveryService {
        &self.discovery
    }

    /// Apply the built-in plans and tags.
    pub async fn seed(&self) -> Result<SeedReport, EngineError> {
        seed_catalog(self.repo.as_ref(), self.clock.as_ref()).await
    }

    /// Check that the repository is reachable.
    pub async fn ping(&self) -> Result<(), EngineError> {
        Ok(self.repo.ping().await?)
    }
}
