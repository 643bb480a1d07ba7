//! Shared fixtures for engine unit tests.

use std::sync::Arc;

use chrono::{TimeZone, Utc};

use hololith_core::{PlanDraft, Product, Store, StoreId, TenantId, User, UserId};
use hololith_store::UserStore;
use hololith_store_memory::MemoryRepository;

use crate::Engine;
use crate::catalog::CreateProduct;
use crate::clock::ManualClock;
use crate::stores::CreateStore;
use crate::tenants::CreateTenant;

/// The free plan, tightened to two products per store and no tenant-wide cap.
pub(crate) fn tight_free_plan() -> PlanDraft {
    let mut plan = PlanDraft::free();
    plan.quotas.max_products_per_store = 2;
    plan.quotas.max_products_total = None;
    plan
}

pub(crate) struct Fixture {
    pub repo: Arc<MemoryRepository>,
    pub clock: Arc<ManualClock>,
    pub engine: Engine,
}

impl Fixture {
    pub fn new() -> Self {
        let repo = Arc::new(MemoryRepository::new());
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2026, 3, 10, 12, 0, 0).unwrap(),
        ));
        let engine = Engine::builder(repo.clone()).clock(clock.clone()).build();
        Self {
            repo,
            clock,
            engine,
        }
    }

    pub async fn user(&self, email: &str) -> UserId {
        let user = User {
            id: UserId::generate(),
            email: email.to_owned(),
            password_hash: "not-a-real-hash".to_owned(),
            refresh_token_hash: None,
            created_at: Utc::now(),
        };
        self.repo.create_user(&user).await.unwrap();
        user.id
    }

    /// A fresh tenant whose owner is a fresh user.
    pub async fn tenant(&self, name: &str) -> TenantId {
        let owner = self.user(&format!("{name}@example.com")).await;
        self.engine
            .tenants()
            .create(&owner, &CreateTenant { name: name.to_owned() })
            .await
            .unwrap()
            .id
    }

    pub async fn store(&self, tenant: &TenantId, slug: &str) -> Store {
        let input = CreateStore {
            name: format!("Store {slug}"),
            slug: slug.to_owned(),
            subdomain: slug.to_owned(),
            custom_domain: None,
        };
        self.engine.stores().create(tenant, &input).await.unwrap()
    }

    pub async fn product(&self, tenant: &TenantId, store: &StoreId, slug: &str) -> Product {
        let input = CreateProduct {
            store_id: store.clone(),
            title: format!("Product {slug}"),
            slug: slug.to_owned(),
            description: None,
            price_cents: 999,
            currency: None,
            media: None,
        };
        self.engine.products().create(tenant, &input).await.unwrap()
    }

    pub async fn seed(&self) {
        self.engine.seed().await.unwrap();
    }
}
