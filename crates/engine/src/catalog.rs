use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use hololith_core::catalog::{validate_min_len, validate_slug};
use hololith_core::{
    DEFAULT_CURRENCY, Product, ProductId, PublishStatus, StoreId, TenantId, ValidationError,
};
use hololith_store::Repository;

use crate::clock::Clock;
use crate::error::EngineError;
use crate::patch::{nullable, set_if_changed};
use crate::quota::QuotaEngine;
use crate::stores::{StoreRef, owned_store, published_store};

fn validate_price(price_cents: i64) -> Result<(), ValidationError> {
    if price_cents < 0 {
        return Err(ValidationError::new("priceCents must be a non-negative integer"));
    }
    Ok(())
}

fn normalize_currency(raw: &str) -> Result<String, ValidationError> {
    let code = raw.trim().to_ascii_uppercase();
    if code.len() == 3 && code.chars().all(|c| c.is_ascii_alphabetic()) {
        Ok(code)
    } else {
        Err(ValidationError::new("currency must be a 3-letter code"))
    }
}

fn validate_media(media: &serde_json::Value) -> Result<(), ValidationError> {
    if media.is_array() {
        Ok(())
    } else {
        Err(ValidationError::new("media must be an array"))
    }
}

/// Input for creating a product.
#[derive(Debug, Clone, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct CreateProduct {
    pub store_id: StoreId,
    pub title: String,
    pub slug: String,
    #[serde(default)]
    pub description: Option<String>,
    pub price_cents: i64,
    /// Defaults to `USD`.
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    #[cfg_attr(feature = "openapi", schema(value_type = Option<Object>))]
    pub media: Option<serde_json::Value>,
}

/// Partial update of a product. `description: null` clears the description.
#[derive(Debug, Clone, Default, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct UpdateProduct {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>))]
    pub description: Option<Option<String>>,
    #[serde(default)]
    pub price_cents: Option<i64>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    #[cfg_attr(feature = "openapi", schema(value_type = Option<Object>))]
    pub media: Option<serde_json::Value>,
}

/// Published products of a published store.
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct StoreProducts {
    pub store: StoreRef,
    pub products: Vec<Product>,
}

/// One published product with its store.
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct StoreProduct {
    pub store: StoreRef,
    pub product: Product,
}

/// Load a product and check that its store belongs to `tenant`.
pub(crate) async fn owned_product(
    repo: &dyn Repository,
    tenant: &TenantId,
    id: &ProductId,
) -> Result<Product, EngineError> {
    let product = repo
        .get_product(id)
        .await?
        .ok_or_else(|| EngineError::NotFound("Product not found".into()))?;
    let owner = repo.get_store(&product.store_id).await?;
    if owner.is_none_or(|store| store.tenant_id != *tenant) {
        return Err(EngineError::Forbidden(
            "Product does not belong to this tenant".into(),
        ));
    }
    Ok(product)
}

/// Product management for tenants and the public product listings.
#[derive(Clone)]
pub struct ProductService {
    repo: Arc<dyn Repository>,
    clock: Arc<dyn Clock>,
    quota: QuotaEngine,
}

impl ProductService {
    pub fn new(repo: Arc<dyn Repository>, clock: Arc<dyn Clock>, quota: QuotaEngine) -> Self {
        Self { repo, clock, quota }
    }

    /// Create a draft product in one of the tenant's stores.
    pub async fn create(
        &self,
        tenant: &TenantId,
        input: &CreateProduct,
    ) -> Result<Product, EngineError> {
        validate_min_len("title", &input.title, 2)?;
        validate_slug("slug", &input.slug)?;
        validate_price(input.price_cents)?;
        let currency = match &input.currency {
            Some(raw) => normalize_currency(raw)?,
            None => DEFAULT_CURRENCY.to_owned(),
        };
        let media = input.media.clone().unwrap_or_else(|| serde_json::json!([]));
        validate_media(&media)?;

        self.quota
            .assert_can_create_product(tenant, &input.store_id)
            .await?;

        if self
            .repo
            .find_product_by_slug(&input.store_id, &input.slug)
            .await?
            .is_some()
        {
            return Err(EngineError::InvalidInput(
                "Product slug already in use for this store".into(),
            ));
        }

        let now = self.clock.now();
        let product = Product {
            id: ProductId::generate(),
            store_id: input.store_id.clone(),
            title: input.title.trim().to_owned(),
            slug: input.slug.clone(),
            description: input.description.clone(),
            price_cents: input.price_cents,
            currency,
            media,
            status: PublishStatus::Draft,
            created_at: now,
            updated_at: now,
        };
        self.repo
            .insert_product(&product)
            .await
            .map_err(EngineError::conflict_as("Product slug already in use for this store"))?;

        info!(
            tenant_id = %tenant,
            store_id = %product.store_id,
            product_id = %product.id,
            "product created"
        );
        Ok(product)
    }

    /// The tenant's products, optionally limited to one of its stores.
    pub async fn list(
        &self,
        tenant: &TenantId,
        store: Option<&StoreId>,
    ) -> Result<Vec<Product>, EngineError> {
        if let Some(store) = store {
            owned_store(self.repo.as_ref(), tenant, store).await?;
        }
        Ok(self.repo.list_products(tenant, store).await?)
    }

    pub async fn get(&self, tenant: &TenantId, id: &ProductId) -> Result<Product, EngineError> {
        owned_product(self.repo.as_ref(), tenant, id).await
    }

    pub async fn update(
        &self,
        tenant: &TenantId,
        id: &ProductId,
        patch: &UpdateProduct,
    ) -> Result<Product, EngineError> {
        if let Some(title) = &patch.title {
            validate_min_len("title", title, 2)?;
        }
        if let Some(slug) = &patch.slug {
            validate_slug("slug", slug)?;
        }
        if let Some(price) = patch.price_cents {
            validate_price(price)?;
        }
        let currency = patch.currency.as_deref().map(normalize_currency).transpose()?;
        if let Some(media) = &patch.media {
            validate_media(media)?;
        }

        let mut product = owned_product(self.repo.as_ref(), tenant, id).await?;
        if let Some(slug) = &patch.slug
            && *slug != product.slug
            && self
                .repo
                .find_product_by_slug(&product.store_id, slug)
                .await?
                .is_some()
        {
            return Err(EngineError::InvalidInput(
                "Product slug already in use for this store".into(),
            ));
        }

        if let Some(title) = &patch.title {
            product.title = title.trim().to_owned();
        }
        set_if_changed(&mut product.slug, patch.slug.as_ref());
        if let Some(description) = &patch.description {
            product.description.clone_from(description);
        }
        if let Some(price) = patch.price_cents {
            product.price_cents = price;
        }
        if let Some(currency) = currency {
            product.currency = currency;
        }
        if let Some(media) = &patch.media {
            product.media = media.clone();
        }
        product.updated_at = self.clock.now();

        self.repo
            .update_product(&product)
            .await
            .map_err(EngineError::conflict_as("Product slug already in use for this store"))?;
        Ok(product)
    }

    pub async fn publish(&self, tenant: &TenantId, id: &ProductId) -> Result<Product, EngineError> {
        self.set_status(tenant, id, PublishStatus::Published).await
    }

    pub async fn unpublish(
        &self,
        tenant: &TenantId,
        id: &ProductId,
    ) -> Result<Product, EngineError> {
        self.set_status(tenant, id, PublishStatus::Draft).await
    }

    async fn set_status(
        &self,
        tenant: &TenantId,
        id: &ProductId,
        status: PublishStatus,
    ) -> Result<Product, EngineError> {
        let mut product = owned_product(self.repo.as_ref(), tenant, id).await?;
        product.status = status;
        product.updated_at = self.clock.now();
        self.repo.update_product(&product).await?;
        info!(product_id = %product.id, status = status.as_str(), "product status changed");
        Ok(product)
    }

    /// Published products of a published store, newest first.
    pub async fn public_list(&self, store_slug: &str) -> Result<StoreProducts, EngineError> {
        let store = published_store(self.repo.as_ref(), store_slug).await?;
        let products = self.repo.list_published_products(&store.id).await?;
        Ok(StoreProducts {
            store: StoreRef::from(&store),
            products,
        })
    }

    pub async fn public_get(
        &self,
        store_slug: &str,
        product_slug: &str,
    ) -> Result<StoreProduct, EngineError> {
        let store = published_store(self.repo.as_ref(), store_slug).await?;
        let product = self
            .repo
            .find_product_by_slug(&store.id, product_slug)
            .await?
            .filter(|p| p.status.is_published())
            .ok_or_else(|| EngineError::NotFound("Product not found".into()))?;
        Ok(StoreProduct {
            store: StoreRef::from(&store),
            product,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{self, Fixture};

    fn input(store: &StoreId, slug: &str) -> CreateProduct {
        CreateProduct {
            store_id: store.clone(),
            title: format!("Item {slug}"),
            slug: slug.into(),
            description: None,
            price_cents: 1_500,
            currency: None,
            media: None,
        }
    }

    #[tokio::test]
    async fn defaults_on_create() {
        let fx = Fixture::new();
        let tenant = fx.tenant("defaults").await;
        let store = fx.store(&tenant, "defaults").await;
        let product = fx.engine.products().create(&tenant, &input(&store.id, "mug")).await.unwrap();
        assert_eq!(product.currency, "USD");
        assert_eq!(product.media, serde_json::json!([]));
        assert_eq!(product.status, PublishStatus::Draft);
    }

    #[tokio::test]
    async fn third_product_hits_per_store_limit() {
        let fx = Fixture::new();
        fx.engine.quota().upsert_plan(&testing::tight_free_plan()).await.unwrap();
        let tenant = fx.tenant("limited").await;
        let store = fx.store(&tenant, "limited").await;

        for slug in ["p1", "p2"] {
            fx.engine.products().create(&tenant, &input(&store.id, slug)).await.unwrap();
        }
        let err = fx
            .engine
            .products()
            .create(&tenant, &input(&store.id, "p3"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("maxProductsPerStore"));
        assert_eq!(fx.engine.products().list(&tenant, None).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn slug_unique_per_store_only() {
        let fx = Fixture::new();
        let mut plan = testing::tight_free_plan();
        plan.quotas.max_stores = 2;
        fx.engine.quota().upsert_plan(&plan).await.unwrap();
        let tenant = fx.tenant("slugs").await;
        let a = fx.store(&tenant, "slugs-a").await;
        let b = fx.store(&tenant, "slugs-b").await;

        fx.engine.products().create(&tenant, &input(&a.id, "tee")).await.unwrap();
        let err = fx
            .engine
            .products()
            .create(&tenant, &input(&a.id, "tee"))
            .await
            .unwrap_err();
        assert!(
            matches!(err, EngineError::InvalidInput(m) if m == "Product slug already in use for this store")
        );
        fx.engine.products().create(&tenant, &input(&b.id, "tee")).await.unwrap();

        let only_b = fx.engine.products().list(&tenant, Some(&b.id)).await.unwrap();
        assert_eq!(only_b.len(), 1);
        assert_eq!(only_b[0].store_id, b.id);
    }

    #[tokio::test]
    async fn rejects_bad_price_and_currency() {
        let fx = Fixture::new();
        let tenant = fx.tenant("prices").await;
        let store = fx.store(&tenant, "prices").await;

        let mut bad = input(&store.id, "neg");
        bad.price_cents = -1;
        assert!(matches!(
            fx.engine.products().create(&tenant, &bad).await,
            Err(EngineError::InvalidInput(_))
        ));

        let mut eur = input(&store.id, "eur");
        eur.currency = Some("eur".into());
        let product = fx.engine.products().create(&tenant, &eur).await.unwrap();
        assert_eq!(product.currency, "EUR");

        let patch = UpdateProduct {
            currency: Some("euro".into()),
            ..UpdateProduct::default()
        };
        assert!(fx.engine.products().update(&tenant, &product.id, &patch).await.is_err());
    }

    #[tokio::test]
    async fn ownership_is_enforced() {
        let fx = Fixture::new();
        let owner = fx.tenant("owner").await;
        let other = fx.tenant("other").await;
        let store = fx.store(&owner, "owned").await;
        let product = fx.product(&owner, &store.id, "widget").await;

        let err = fx.engine.products().publish(&other, &product.id).await.unwrap_err();
        assert!(
            matches!(err, EngineError::Forbidden(m) if m == "Product does not belong to this tenant")
        );
        let err = fx
            .engine
            .products()
            .create(&other, &input(&store.id, "sneaky"))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Forbidden(_)));
        assert!(matches!(
            fx.engine.products().list(&other, Some(&store.id)).await,
            Err(EngineError::Forbidden(_))
        ));
        assert!(matches!(
            fx.engine.products().get(&owner, &ProductId::new("missing")).await,
            Err(EngineError::NotFound(m)) if m == "Product not found"
        ));
    }

    #[tokio::test]
    async fn update_patches_fields() {
        let fx = Fixture::new();
        let tenant = fx.tenant("patch").await;
        let store = fx.store(&tenant, "patch").await;
        let mut create = input(&store.id, "lamp");
        create.description = Some("bright".into());
        let product = fx.engine.products().create(&tenant, &create).await.unwrap();

        let patch = UpdateProduct {
            title: Some("Desk Lamp".into()),
            description: Some(None),
            price_cents: Some(2_000),
            ..UpdateProduct::default()
        };
        let updated = fx.engine.products().update(&tenant, &product.id, &patch).await.unwrap();
        assert_eq!(updated.title, "Desk Lamp");
        assert_eq!(updated.description, None);
        assert_eq!(updated.price_cents, 2_000);
        assert_eq!(updated.slug, "lamp");
    }

    #[tokio::test]
    async fn public_views_require_both_published() {
        let fx = Fixture::new();
        let tenant = fx.tenant("storefront").await;
        let store = fx.store(&tenant, "front").await;
        let product = fx.product(&tenant, &store.id, "poster").await;
        let products = fx.engine.products();

        assert!(products.public_list("front").await.is_err());
        fx.engine.stores().publish(&tenant, &store.id).await.unwrap();
        assert!(products.public_list("front").await.unwrap().products.is_empty());
        assert!(matches!(
            products.public_get("front", "poster").await,
            Err(EngineError::NotFound(m)) if m == "Product not found"
        ));

        products.publish(&tenant, &product.id).await.unwrap();
        let listed = products.public_list("front").await.unwrap();
        assert_eq!(listed.store.slug, "front");
        assert_eq!(listed.products.len(), 1);
        let detail = products.public_get("front", "poster").await.unwrap();
        assert_eq!(detail.product.id, product.id);

        fx.engine.stores().unpublish(&tenant, &store.id).await.unwrap();
        assert!(products.public_get("front", "poster").await.is_err());
    }
}
