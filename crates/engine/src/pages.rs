use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use hololith_core::catalog::{validate_min_len, validate_slug};
use hololith_core::{Page, PageContent, PageId, PublishStatus, StoreId, TenantId};
use hololith_store::Repository;

use crate::clock::Clock;
use crate::error::EngineError;
use crate::patch::set_if_changed;
use crate::stores::{StoreRef, owned_store, published_store};

/// Input for creating a page.
#[derive(Debug, Clone, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct CreatePage {
    pub store_id: StoreId,
    pub title: String,
    pub slug: String,
    /// `{ version: number, blocks: [] }`
    #[cfg_attr(feature = "openapi", schema(value_type = Object))]
    pub content: serde_json::Value,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct UpdatePage {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    #[cfg_attr(feature = "openapi", schema(value_type = Option<Object>))]
    pub content: Option<serde_json::Value>,
}

/// A published page with its store.
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct StorePage {
    pub store: StoreRef,
    pub page: Page,
}

async fn owned_page(
    repo: &dyn Repository,
    tenant: &TenantId,
    id: &PageId,
) -> Result<Page, EngineError> {
    let page = repo
        .get_page(id)
        .await?
        .ok_or_else(|| EngineError::NotFound("Page not found".into()))?;
    let owner = repo.get_store(&page.store_id).await?;
    if owner.is_none_or(|store| store.tenant_id != *tenant) {
        return Err(EngineError::Forbidden(
            "Page does not belong to this tenant".into(),
        ));
    }
    Ok(page)
}

#[derive(Clone)]
pub struct PageService {
    repo: Arc<dyn Repository>,
    clock: Arc<dyn Clock>,
}

impl PageService {
    pub fn new(repo: Arc<dyn Repository>, clock: Arc<dyn Clock>) -> Self {
        Self { repo, clock }
    }

    pub async fn create(&self, tenant: &TenantId, input: &CreatePage) -> Result<Page, EngineError> {
        validate_min_len("title", &input.title, 2)?;
        validate_slug("slug", &input.slug)?;
        let content = PageContent::from_value(input.content.clone())?;

        owned_store(self.repo.as_ref(), tenant, &input.store_id).await?;
        if self
            .repo
            .find_page_by_slug(&input.store_id, &input.slug)
            .await?
            .is_some()
        {
            return Err(EngineError::InvalidInput(
                "Page slug already in use for this store".into(),
            ));
        }

        let now = self.clock.now();
        let page = Page {
            id: PageId::generate(),
            store_id: input.store_id.clone(),
            title: input.title.trim().to_owned(),
            slug: input.slug.clone(),
            content,
            status: PublishStatus::Draft,
            created_at: now,
            updated_at: now,
        };
        self.repo
            .insert_page(&page)
            .await
            .map_err(EngineError::conflict_as("Page slug already in use for this store"))?;
        info!(store_id = %page.store_id, page_id = %page.id, "page created");
        Ok(page)
    }

    pub async fn list(
        &self,
        tenant: &TenantId,
        store: Option<&StoreId>,
    ) -> Result<Vec<Page>, EngineError> {
        if let Some(store) = store {
            owned_store(self.repo.as_ref(), tenant, store).await?;
        }
        Ok(self.repo.list_pages(tenant, store).await?)
    }

    pub async fn get(&self, tenant: &TenantId, id: &PageId) -> Result<Page, EngineError> {
        owned_page(self.repo.as_ref(), tenant, id).await
    }

    pub async fn update(
        &self,
        tenant: &TenantId,
        id: &PageId,
        patch: &UpdatePage,
    ) -> Result<Page, EngineError> {
        if let Some(title) = &patch.title {
            validate_min_len("title", title, 2)?;
        }
        if let Some(slug) = &patch.slug {
            validate_slug("slug", slug)?;
        }
        let content = patch
            .content
            .clone()
            .map(PageContent::from_value)
            .transpose()?;

        let mut page = owned_page(self.repo.as_ref(), tenant, id).await?;
        if let Some(slug) = &patch.slug
            && *slug != page.slug
            && self
                .repo
                .find_page_by_slug(&page.store_id, slug)
                .await?
                .is_some()
        {
            return Err(EngineError::InvalidInput(
                "Page slug already in use for this store".into(),
            ));
        }

        if let Some(title) = &patch.title {
            page.title = title.trim().to_owned();
        }
        set_if_changed(&mut page.slug, patch.slug.as_ref());
        if let Some(content) = content {
            page.content = content;
        }
        page.updated_at = self.clock.now();

        self.repo
            .update_page(&page)
            .await
            .map_err(EngineError::conflict_as("Page slug already in use for this store"))?;
        Ok(page)
    }

    pub async fn publish(&self, tenant: &TenantId, id: &PageId) -> Result<Page, EngineError> {
        self.set_status(tenant, id, PublishStatus::Published).await
    }

    pub async fn unpublish(&self, tenant: &TenantId, id: &PageId) -> Result<Page, EngineError> {
        self.set_status(tenant, id, PublishStatus::Draft).await
    }

    async fn set_status(
        &self,
        tenant: &TenantId,
        id: &PageId,
        status: PublishStatus,
    ) -> Result<Page, EngineError> {
        let mut page = owned_page(self.repo.as_ref(), tenant, id).await?;
        page.status = status;
        page.updated_at = self.clock.now();
        self.repo.update_page(&page).await?;
        info!(page_id = %page.id, status = status.as_str(), "page status changed");
        Ok(page)
    }

    /// A published page of a published store.
    pub async fn public_get(
        &self,
        store_slug: &str,
        page_slug: &str,
    ) -> Result<StorePage, EngineError> {
        let store = published_store(self.repo.as_ref(), store_slug).await?;
        let page = self
            .repo
            .find_page_by_slug(&store.id, page_slug)
            .await?
            .filter(|p| p.status.is_published())
            .ok_or_else(|| EngineError::NotFound("Page not found".into()))?;
        Ok(StorePage {
            store: StoreRef::from(&store),
            page,
        })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::testing::Fixture;

    fn input(store: &StoreId, slug: &str, content: serde_json::Value) -> CreatePage {
        CreatePage {
            store_id: store.clone(),
            title: "About us".into(),
            slug: slug.into(),
            content,
        }
    }

    #[tokio::test]
    async fn content_shape_is_validated_first() {
        let fx = Fixture::new();
        let tenant = fx.tenant("pages").await;
        let other = fx.tenant("others").await;
        let store = fx.store(&tenant, "pages").await;

        let err = fx
            .engine
            .pages()
            .create(&other, &input(&store.id, "about", json!({ "blocks": [] })))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidInput(m) if m.starts_with("Invalid content shape")));

        let err = fx
            .engine
            .pages()
            .create(&other, &input(&store.id, "about", json!({ "version": 1, "blocks": [] })))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Forbidden(_)));
    }

    #[tokio::test]
    async fn slug_unique_within_store() {
        let fx = Fixture::new();
        let tenant = fx.tenant("unique").await;
        let store = fx.store(&tenant, "unique").await;
        let content = json!({ "version": 1, "blocks": [{ "type": "hero" }], "theme": "dark" });

        let page = fx
            .engine
            .pages()
            .create(&tenant, &input(&store.id, "about", content.clone()))
            .await
            .unwrap();
        assert_eq!(page.content.blocks.len(), 1);
        assert_eq!(page.content.extra["theme"], "dark");
        let err = fx
            .engine
            .pages()
            .create(&tenant, &input(&store.id, "about", content))
            .await
            .unwrap_err();
        assert!(
            matches!(err, EngineError::InvalidInput(m) if m == "Page slug already in use for this store")
        );
    }

    #[tokio::test]
    async fn update_and_public_visibility() {
        let fx = Fixture::new();
        let tenant = fx.tenant("visible").await;
        let store = fx.store(&tenant, "visible").await;
        let page = fx
            .engine
            .pages()
            .create(&tenant, &input(&store.id, "faq", json!({ "version": 1, "blocks": [] })))
            .await
            .unwrap();

        let patch = UpdatePage {
            content: Some(json!({ "version": 2, "blocks": [{ "type": "text" }] })),
            ..UpdatePage::default()
        };
        let updated = fx.engine.pages().update(&tenant, &page.id, &patch).await.unwrap();
        assert_eq!(updated.content.version, serde_json::Number::from(2));

        let bad = UpdatePage {
            content: Some(json!([])),
            ..UpdatePage::default()
        };
        assert!(fx.engine.pages().update(&tenant, &page.id, &bad).await.is_err());

        fx.engine.pages().publish(&tenant, &page.id).await.unwrap();
        assert!(fx.engine.pages().public_get("visible", "faq").await.is_err());
        fx.engine.stores().publish(&tenant, &store.id).await.unwrap();
        let shown = fx.engine.pages().public_get("visible", "faq").await.unwrap();
        assert_eq!(shown.page.id, page.id);
        assert_eq!(shown.store.name, store.name);

        fx.engine.pages().unpublish(&tenant, &page.id).await.unwrap();
        assert!(matches!(
            fx.engine.pages().public_get("visible", "faq").await,
            Err(EngineError::NotFound(m)) if m == "Page not found"
        ));
        assert_eq!(fx.engine.pages().list(&tenant, Some(&store.id)).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn foreign_page_is_forbidden() {
        let fx = Fixture::new();
        let owner = fx.tenant("owner").await;
        let other = fx.tenant("other").await;
        let store = fx.store(&owner, "owner").await;
        let page = fx
            .engine
            .pages()
            .create(&owner, &input(&store.id, "home", json!({ "version": 1, "blocks": [] })))
            .await
            .unwrap();

        assert!(matches!(
            fx.engine.pages().get(&other, &page.id).await,
            Err(EngineError::Forbidden(m)) if m == "Page does not belong to this tenant"
        ));
        assert!(matches!(
            fx.engine.pages().get(&owner, &PageId::new("missing")).await,
            Err(EngineError::NotFound(m)) if m == "Page not found"
        ));
    }
}
