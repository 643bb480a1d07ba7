use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use hololith_core::catalog::{validate_min_len, validate_slug};
use hololith_core::{PublishStatus, Store, StoreId, TenantId, ValidationError};
use hololith_store::Repository;

use crate::clock::Clock;
use crate::error::EngineError;
use crate::patch::{nullable, set_if_changed};
use crate::quota::QuotaEngine;

/// Input for creating a store.
#[derive(Debug, Clone, Default, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct CreateStore {
    pub name: String,
    pub slug: String,
    pub subdomain: String,
    #[serde(default)]
    pub custom_domain: Option<String>,
}

impl CreateStore {
    fn validate(&self) -> Result<(), ValidationError> {
        validate_min_len("name", &self.name, 2)?;
        validate_slug("slug", &self.slug)?;
        validate_slug("subdomain", &self.subdomain)
    }
}

/// Partial update of a store. `customDomain: null` clears the domain.
#[derive(Debug, Clone, Default, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct UpdateStore {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub subdomain: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>))]
    pub custom_domain: Option<Option<String>>,
}

impl UpdateStore {
    fn validate(&self) -> Result<(), ValidationError> {
        if let Some(name) = &self.name {
            validate_min_len("name", name, 2)?;
        }
        if let Some(slug) = &self.slug {
            validate_slug("slug", slug)?;
        }
        if let Some(subdomain) = &self.subdomain {
            validate_slug("subdomain", subdomain)?;
        }
        Ok(())
    }
}

/// Public identity of a store, embedded in storefront responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct StoreRef {
    pub slug: String,
    pub name: String,
}

impl From<&Store> for StoreRef {
    fn from(store: &Store) -> Self {
        Self {
            slug: store.slug.clone(),
            name: store.name.clone(),
        }
    }
}

/// Load a store and check that `tenant` owns it.
pub(crate) async fn owned_store(
    repo: &dyn Repository,
    tenant: &TenantId,
    id: &StoreId,
) -> Result<Store, EngineError> {
    let store = repo
        .get_store(id)
        .await?
        .ok_or_else(|| EngineError::NotFound("Store not found".into()))?;
    if store.tenant_id != *tenant {
        return Err(EngineError::Forbidden(
            "Store does not belong to this tenant".into(),
        ));
    }
    Ok(store)
}

/// Load a store by slug, treating drafts as absent.
pub(crate) async fn published_store(
    repo: &dyn Repository,
    slug: &str,
) -> Result<Store, EngineError> {
    repo.find_store_by_slug(slug)
        .await?
        .filter(|store| store.status.is_published())
        .ok_or_else(|| EngineError::NotFound("Store not found".into()))
}

/// Tenant-scoped store management and the public store lookup.
#[derive(Clone)]
pub struct StoreService {
    repo: Arc<dyn Repository>,
    clock: Arc<dyn Clock>,
    quota: QuotaEngine,
}

impl StoreService {
    pub fn new(repo: Arc<dyn Repository>, clock: Arc<dyn Clock>, quota: QuotaEngine) -> Self {
        Self { repo, clock, quota }
    }

    /// Create a draft store after the quota and uniqueness checks.
    pub async fn create(&self, tenant: &TenantId, input: &CreateStore) -> Result<Store, EngineError> {
        input.validate()?;
        self.quota.assert_can_create_store(tenant).await?;

        if self.repo.find_store_by_slug(&input.slug).await?.is_some() {
            return Err(EngineError::InvalidInput("Store slug already in use".into()));
        }
        if self
            .repo
            .find_store_by_subdomain(&input.subdomain)
            .await?
            .is_some()
        {
            return Err(EngineError::InvalidInput("Subdomain already in use".into()));
        }

        let now = self.clock.now();
        let store = Store {
            id: StoreId::generate(),
            tenant_id: tenant.clone(),
            name: input.name.trim().to_owned(),
            slug: input.slug.clone(),
            subdomain: input.subdomain.clone(),
            custom_domain: input.custom_domain.clone(),
            status: PublishStatus::Draft,
            created_at: now,
            updated_at: now,
        };
        self.repo
            .insert_store(&store)
            .await
            .map_err(EngineError::conflict_as("Store slug or subdomain already in use"))?;

        info!(tenant_id = %tenant, store_id = %store.id, slug = %store.slug, "store created");
        Ok(store)
    }

    /// The tenant's stores, newest first.
    pub async fn list(&self, tenant: &TenantId) -> Result<Vec<Store>, EngineError> {
        Ok(self.repo.list_stores(tenant).await?)
    }

    pub async fn get(&self, tenant: &TenantId, id: &StoreId) -> Result<Store, EngineError> {
        owned_store(self.repo.as_ref(), tenant, id).await
    }

    /// Apply a partial update. Uniqueness is re-checked only for fields that change.
    pub async fn update(
        &self,
        tenant: &TenantId,
        id: &StoreId,
        patch: &UpdateStore,
    ) -> Result<Store, EngineError> {
        patch.validate()?;
        let mut store = owned_store(self.repo.as_ref(), tenant, id).await?;

        if let Some(slug) = &patch.slug
            && *slug != store.slug
            && self.repo.find_store_by_slug(slug).await?.is_some()
        {
            return Err(EngineError::InvalidInput("Store slug already in use".into()));
        }
        if let Some(subdomain) = &patch.subdomain
            && *subdomain != store.subdomain
            && self.repo.find_store_by_subdomain(subdomain).await?.is_some()
        {
            return Err(EngineError::InvalidInput("Subdomain already in use".into()));
        }

        if let Some(name) = &patch.name {
            store.name = name.trim().to_owned();
        }
        set_if_changed(&mut store.slug, patch.slug.as_ref());
        set_if_changed(&mut store.subdomain, patch.subdomain.as_ref());
        if let Some(domain) = &patch.custom_domain {
            store.custom_domain.clone_from(domain);
        }
        store.updated_at = self.clock.now();

        self.repo
            .update_store(&store)
            .await
            .map_err(EngineError::conflict_as("Store slug or subdomain already in use"))?;
        Ok(store)
    }

    pub async fn publish(&self, tenant: &TenantId, id: &StoreId) -> Result<Store, EngineError> {
        self.set_status(tenant, id, PublishStatus::Published).await
    }

    pub async fn unpublish(&self, tenant: &TenantId, id: &StoreId) -> Result<Store, EngineError> {
        self.set_status(tenant, id, PublishStatus::Draft).await
    }

    async fn set_status(
        &self,
        tenant: &TenantId,
        id: &StoreId,
        status: PublishStatus,
    ) -> Result<Store, EngineError> {
        let mut store = owned_store(self.repo.as_ref(), tenant, id).await?;
        store.status = status;
        store.updated_at = self.clock.now();
        self.repo.update_store(&store).await?;
        info!(store_id = %store.id, status = status.as_str(), "store status changed");
        Ok(store)
    }

    /// A published store by slug. Drafts are reported as not found.
    pub async fn public_by_slug(&self, slug: &str) -> Result<Store, EngineError> {
        published_store(self.repo.as_ref(), slug).await
    }
}
