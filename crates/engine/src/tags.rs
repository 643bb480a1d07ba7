use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use hololith_core::catalog::{validate_min_len, validate_slug};
use hololith_core::tag::{MIN_TAG_TIER, validate_tier};
use hololith_core::{Product, ProductId, Store, StoreId, Tag, TagDraft, TagId, TenantId};
use hololith_store::Repository;

use crate::catalog::owned_product;
use crate::clock::Clock;
use crate::error::EngineError;
use crate::quota::QuotaEngine;
use crate::stores::owned_store;

pub(crate) fn tag_from_draft(draft: TagDraft, now: DateTime<Utc>) -> Tag {
    Tag {
        id: TagId::generate(),
        slug: draft.slug,
        name: draft.name,
        tier: draft.tier,
        flags: draft.flags,
        created_at: now,
    }
}

/// Input for creating a tag.
#[derive(Debug, Clone, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct CreateTag {
    pub name: String,
    pub slug: String,
    /// Defaults to 1.
    #[serde(default)]
    pub tier: Option<u8>,
    #[serde(default)]
    #[cfg_attr(feature = "openapi", schema(value_type = Option<Object>))]
    pub flags: Option<serde_json::Value>,
}

impl CreateTag {
    fn into_draft(self) -> Result<TagDraft, EngineError> {
        validate_min_len("name", &self.name, 2)?;
        validate_slug("slug", &self.slug)?;
        let tier = self.tier.unwrap_or(MIN_TAG_TIER);
        validate_tier(tier)?;
        Ok(TagDraft {
            slug: self.slug,
            name: self.name.trim().to_owned(),
            tier,
            flags: self.flags.unwrap_or_else(|| serde_json::json!({})),
        })
    }
}

/// A tag with the published listings that carry it.
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct TagLanding {
    pub tag: Tag,
    pub stores: Vec<Store>,
    pub products: Vec<Product>,
}

/// Refuses tags above the tenant plan's `maxTagTier`.
#[derive(Clone)]
pub struct TagTierGate {
    quota: QuotaEngine,
}

impl TagTierGate {
    pub fn new(quota: QuotaEngine) -> Self {
        Self { quota }
    }

    pub async fn check(&self, tenant: &TenantId, tag: &Tag) -> Result<(), EngineError> {
        self.quota.assert_tag_tier_allowed(tenant, tag.tier).await
    }
}

/// The global tag catalog and its links to stores and products.
#[derive(Clone)]
pub struct TagService {
    repo: Arc<dyn Repository>,
    clock: Arc<dyn Clock>,
    gate: TagTierGate,
}

impl TagService {
    pub fn new(repo: Arc<dyn Repository>, clock: Arc<dyn Clock>, gate: TagTierGate) -> Self {
        Self { repo, clock, gate }
    }

    /// All tags, lowest tier first, then by name.
    pub async fn list(&self) -> Result<Vec<Tag>, EngineError> {
        Ok(self.repo.list_tags().await?)
    }

    /// The tag with its published stores and products, newest first.
    pub async fn landing(&self, slug: &str) -> Result<TagLanding, EngineError> {
        let tag = self
            .repo
            .find_tag_by_slug(slug)
            .await?
            .ok_or_else(|| EngineError::NotFound("Tag not found".into()))?;
        let stores = self.repo.published_stores_with_tag(&tag.id).await?;
        let products = self.repo.published_products_with_tag(&tag.id).await?;
        Ok(TagLanding {
            tag,
            stores,
            products,
        })
    }

    pub async fn create_tag(&self, input: CreateTag) -> Result<Tag, EngineError> {
        let draft = input.into_draft()?;
        if self.repo.find_tag_by_slug(&draft.slug).await?.is_some() {
            return Err(EngineError::InvalidInput("Tag slug already exists".into()));
        }
        let tag = tag_from_draft(draft, self.clock.now());
        self.repo
            .insert_tag(&tag)
            .await
            .map_err(EngineError::conflict_as("Tag slug already exists"))?;
        info!(tag_id = %tag.id, slug = %tag.slug, tier = tag.tier, "tag created");
        Ok(tag)
    }

    async fn tag(&self, id: &TagId) -> Result<Tag, EngineError> {
        self.repo
            .get_tag(id)
            .await?
            .ok_or_else(|| EngineError::NotFound("Tag not found".into()))
    }

    /// Attach a tag to one of the tenant's stores. Re-assigning is a no-op.
    pub async fn assign_to_store(
        &self,
        tenant: &TenantId,
        store: &StoreId,
        tag: &TagId,
    ) -> Result<Tag, EngineError> {
        owned_store(self.repo.as_ref(), tenant, store).await?;
        let tag = self.tag(tag).await?;
        self.gate.check(tenant, &tag).await?;
        let created = self.repo.link_store_tag(store, &tag.id).await?;
        debug!(store_id = %store, tag = %tag.slug, created, "store tag assigned");
        Ok(tag)
    }

    pub async fn unassign_from_store(
        &self,
        tenant: &TenantId,
        store: &StoreId,
        tag: &TagId,
    ) -> Result<(), EngineError> {
        owned_store(self.repo.as_ref(), tenant, store).await?;
        self.repo.unlink_store_tag(store, tag).await?;
        Ok(())
    }

    /// Attach a tag to one of the tenant's products. Re-assigning is a no-op.
    pub async fn assign_to_product(
        &self,
        tenant: &TenantId,
        product: &ProductId,
        tag: &TagId,
    ) -> Result<Tag, EngineError> {
        owned_product(self.repo.as_ref(), tenant, product).await?;
        let tag = self.tag(tag).await?;
        self.gate.check(tenant, &tag).await?;
        let created = self.repo.link_product_tag(product, &tag.id).await?;
        debug!(product_id = %product, tag = %tag.slug, created, "product tag assigned");
        Ok(tag)
    }

    pub async fn unassign_from_product(
        &self,
        tenant: &TenantId,
        product: &ProductId,
        tag: &TagId,
    ) -> Result<(), EngineError> {
        owned_product(self.repo.as_ref(), tenant, product).await?;
        self.repo.unlink_product_tag(product, tag).await?;
        Ok(())
    }

    pub async fn store_tags(
        &self,
        tenant: &TenantId,
        store: &StoreId,
    ) -> Result<Vec<Tag>, EngineError> {
        owned_store(self.repo.as_ref(), tenant, store).await?;
        Ok(self.repo.tags_for_store(store).await?)
    }

    pub async fn product_tags(
        &self,
        tenant: &TenantId,
        product: &ProductId,
    ) -> Result<Vec<Tag>, EngineError> {
        owned_product(self.repo.as_ref(), tenant, product).await?;
        Ok(self.repo.tags_for_product(product).await?)
    }
}
