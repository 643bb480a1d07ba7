use async_trait::async_trait;
use chrono::{DateTime, Utc};

use hololith_core::{
    AnalyticsEvent, ExploreQuery, Membership, Page, PageId, Plan, PlanDraft, PlanId, Product,
    ProductId, Store, StoreId, Subscription, Tag, TagId, Tenant, TenantId, User, UserId,
    ViewEventType, ViewTotals,
};

use crate::error::StoreError;

/// Plans and tenant subscriptions.
#[async_trait]
pub trait PlanStore: Send + Sync {
    /// Insert a plan, or replace the name, quotas and features of the plan with the same code.
    async fn upsert_plan(&self, draft: &PlanDraft) -> Result<Plan, StoreError>;

    /// Return the plan with `draft.code`, inserting it from `draft` if absent.
    /// An existing plan is returned unchanged.
    async fn get_or_create_plan(&self, draft: &PlanDraft) -> Result<Plan, StoreError>;

    async fn get_plan(&self, id: &PlanId) -> Result<Option<Plan>, StoreError>;

    async fn get_plan_by_code(&self, code: &str) -> Result<Option<Plan>, StoreError>;

    /// All plans, ordered by `maxStores` ascending.
    async fn list_plans(&self) -> Result<Vec<Plan>, StoreError>;

    async fn get_subscription(&self, tenant: &TenantId)
    -> Result<Option<Subscription>, StoreError>;

    /// Return the tenant's subscription, creating an active one on `plan` if absent.
    async fn get_or_create_subscription(
        &self,
        tenant: &TenantId,
        plan: &PlanId,
    ) -> Result<Subscription, StoreError>;

    /// Repoint the tenant's subscription at `plan` and reset its status to active.
    ///
    /// Returns [`StoreError::NotFound`] if the tenant has no subscription.
    async fn set_subscription_plan(
        &self,
        tenant: &TenantId,
        plan: &PlanId,
    ) -> Result<Subscription, StoreError>;
}

/// User accounts.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Returns [`StoreError::Conflict`] if the email is taken.
    async fn create_user(&self, user: &User) -> Result<(), StoreError>;

    async fn get_user(&self, id: &UserId) -> Result<Option<User>, StoreError>;

    /// Look up by (already normalized) email.
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    async fn set_refresh_token_hash(
        &self,
        id: &UserId,
        hash: Option<&str>,
    ) -> Result<(), StoreError>;
}

/// Tenants and memberships.
#[async_trait]
pub trait TenantStore: Send + Sync {
    /// Create a tenant together with its owner's membership.
    async fn create_tenant(&self, tenant: &Tenant, owner: &Membership) -> Result<(), StoreError>;

    async fn get_tenant(&self, id: &TenantId) -> Result<Option<Tenant>, StoreError>;

    async fn get_membership(
        &self,
        tenant: &TenantId,
        user: &UserId,
    ) -> Result<Option<Membership>, StoreError>;

    /// Every membership of `user`, with its tenant, oldest first.
    async fn list_memberships(
        &self,
        user: &UserId,
    ) -> Result<Vec<(Membership, Tenant)>, StoreError>;
}

/// Stores, products and pages.
///
/// Inserts and updates return [`StoreError::Conflict`] when a uniqueness rule
/// is violated: store `slug` and `subdomain` globally, product and page `slug`
/// within their store. Updates of a missing row return [`StoreError::NotFound`].
#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn insert_store(&self, store: &Store) -> Result<(), StoreError>;
    async fn update_store(&self, store: &Store) -> Result<(), StoreError>;
    async fn get_store(&self, id: &StoreId) -> Result<Option<Store>, StoreError>;
    async fn find_store_by_slug(&self, slug: &str) -> Result<Option<Store>, StoreError>;
    async fn find_store_by_subdomain(&self, subdomain: &str)
    -> Result<Option<Store>, StoreError>;
    /// The tenant's stores, newest first.
    async fn list_stores(&self, tenant: &TenantId) -> Result<Vec<Store>, StoreError>;
    async fn count_stores(&self, tenant: &TenantId) -> Result<u64, StoreError>;

    async fn insert_product(&self, product: &Product) -> Result<(), StoreError>;
    async fn update_product(&self, product: &Product) -> Result<(), StoreError>;
    async fn get_product(&self, id: &ProductId) -> Result<Option<Product>, StoreError>;
    async fn find_product_by_slug(
        &self,
        store: &StoreId,
        slug: &str,
    ) -> Result<Option<Product>, StoreError>;
    /// The tenant's products, optionally limited to one store, newest first.
    async fn list_products(
        &self,
        tenant: &TenantId,
        store: Option<&StoreId>,
    ) -> Result<Vec<Product>, StoreError>;
    /// Published products of a store, newest first. Does not check the store's own status.
    async fn list_published_products(&self, store: &StoreId) -> Result<Vec<Product>, StoreError>;
    async fn count_products_in_store(&self, store: &StoreId) -> Result<u64, StoreError>;
    async fn count_products_for_tenant(&self, tenant: &TenantId) -> Result<u64, StoreError>;

    async fn insert_page(&self, page: &Page) -> Result<(), StoreError>;
    async fn update_page(&self, page: &Page) -> Result<(), StoreError>;
    async fn get_page(&self, id: &PageId) -> Result<Option<Page>, StoreError>;
    async fn find_page_by_slug(
        &self,
        store: &StoreId,
        slug: &str,
    ) -> Result<Option<Page>, StoreError>;
    /// The tenant's pages, optionally limited to one store, newest first.
    async fn list_pages(
        &self,
        tenant: &TenantId,
        store: Option<&StoreId>,
    ) -> Result<Vec<Page>, StoreError>;

    /// Published stores matching the query's text and tag filters, sorted and paged.
    async fn search_stores(&self, query: &ExploreQuery) -> Result<Vec<Store>, StoreError>;
    /// Published products of published stores matching the query, sorted and paged.
    async fn search_products(&self, query: &ExploreQuery) -> Result<Vec<Product>, StoreError>;
}

/// Global tags and their links to stores and products.
#[async_trait]
pub trait TagStore: Send + Sync {
    /// Returns [`StoreError::Conflict`] if the slug is taken.
    async fn insert_tag(&self, tag: &Tag) -> Result<(), StoreError>;
    async fn get_tag(&self, id: &TagId) -> Result<Option<Tag>, StoreError>;
    async fn find_tag_by_slug(&self, slug: &str) -> Result<Option<Tag>, StoreError>;
    /// All tags ordered by tier, then name.
    async fn list_tags(&self) -> Result<Vec<Tag>, StoreError>;

    /// Link a tag to a store. Returns `true` if the link is new.
    async fn link_store_tag(&self, store: &StoreId, tag: &TagId) -> Result<bool, StoreError>;
    /// Returns `true` if a link existed.
    async fn unlink_store_tag(&self, store: &StoreId, tag: &TagId) -> Result<bool, StoreError>;
    async fn link_product_tag(&self, product: &ProductId, tag: &TagId)
    -> Result<bool, StoreError>;
    async fn unlink_product_tag(
        &self,
        product: &ProductId,
        tag: &TagId,
    ) -> Result<bool, StoreError>;

    /// Tags linked to a store, ordered by tier, then name.
    async fn tags_for_store(&self, store: &StoreId) -> Result<Vec<Tag>, StoreError>;
    /// Tags linked to a product, ordered by tier, then name.
    async fn tags_for_product(&self, product: &ProductId) -> Result<Vec<Tag>, StoreError>;

    /// Published stores carrying the tag, newest first.
    async fn published_stores_with_tag(&self, tag: &TagId) -> Result<Vec<Store>, StoreError>;
    /// Published products of published stores carrying the tag, newest first.
    async fn published_products_with_tag(&self, tag: &TagId)
    -> Result<Vec<Product>, StoreError>;
}

/// Recorded views and tenant-scoped aggregates over them.
///
/// Tenant scoping follows content ownership: store views through the store,
/// product views through the product's store, page views through the page's store.
#[async_trait]
pub trait AnalyticsStore: Send + Sync {
    /// Insert a new row unconditionally.
    async fn insert_event(&self, event: &AnalyticsEvent) -> Result<(), StoreError>;

    /// Insert unless a row with the same idempotency key exists.
    ///
    /// Returns `true` when a row was inserted. Must be atomic with respect to
    /// concurrent calls carrying the same key: at most one row survives.
    /// Events without a key are rejected with [`StoreError::Backend`].
    async fn upsert_event_by_key(&self, event: &AnalyticsEvent) -> Result<bool, StoreError>;

    /// Per-type counts for a tenant, optionally limited to events at or after `since`.
    async fn count_views(
        &self,
        tenant: &TenantId,
        since: Option<DateTime<Utc>>,
    ) -> Result<ViewTotals, StoreError>;

    /// Type and timestamp of each tenant event at or after `since`.
    async fn view_timestamps(
        &self,
        tenant: &TenantId,
        since: DateTime<Utc>,
    ) -> Result<Vec<(ViewEventType, DateTime<Utc>)>, StoreError>;

    /// Per-type counts of views of a store, its products and its pages at or after `since`.
    async fn count_store_views(
        &self,
        store: &StoreId,
        since: DateTime<Utc>,
    ) -> Result<ViewTotals, StoreError>;

    /// Number of rows recorded under an idempotency key (0 or 1).
    async fn count_events_with_key(&self, key: &str) -> Result<u64, StoreError>;
}

/// A complete persistence backend.
#[async_trait]
pub trait Repository:
    PlanStore + UserStore + TenantStore + CatalogStore + TagStore + AnalyticsStore
{
    /// Verify the backend is reachable.
    async fn ping(&self) -> Result<(), StoreError>;
}
