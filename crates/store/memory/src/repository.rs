use std::cmp::Reverse;
use std::hash::Hash;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use hololith_core::{
    AnalyticsEvent, EventId, ExploreQuery, ExploreSort, Membership, Page, PageId, Plan, PlanDraft,
    PlanId, Product, ProductId, Store, StoreId, Subscription, SubscriptionId, SubscriptionStatus,
    Tag, TagId, Tenant, TenantId, User, UserId, ViewEventType, ViewTotals,
};
use hololith_store::{
    AnalyticsStore, CatalogStore, PlanStore, Repository, StoreError, TagStore, TenantStore,
    UserStore,
};

/// Claim `key` in a uniqueness index for `owner`.
///
/// Re-claiming a key already held by the same owner is a no-op.
fn reserve<K, V>(index: &DashMap<K, V>, key: K, owner: &V, what: &str) -> Result<(), StoreError>
where
    K: Eq + Hash,
    V: Clone + PartialEq,
{
    match index.entry(key) {
        Entry::Occupied(held) if held.get() == owner => Ok(()),
        Entry::Occupied(_) => Err(StoreError::Conflict(format!("{what} already in use"))),
        Entry::Vacant(vacant) => {
            vacant.insert(owner.clone());
            Ok(())
        }
    }
}

/// Order newest first, breaking ties by id so results are stable.
fn newest_first<T, K: Ord>(items: &mut [T], key: impl Fn(&T) -> (DateTime<Utc>, K)) {
    items.sort_by_key(|item| Reverse(key(item)));
}

fn page_window<T>(items: Vec<T>, query: &ExploreQuery) -> Vec<T> {
    items
        .into_iter()
        .skip(query.offset as usize)
        .take(query.limit as usize)
        .collect()
}

/// In-memory [`Repository`] backed by [`DashMap`]s.
///
/// Uniqueness rules are enforced with secondary index maps claimed through the
/// `entry` API, so concurrent inserts of the same key resolve to one winner.
#[derive(Debug, Default)]
pub struct MemoryRepository {
    plans: DashMap<PlanId, Plan>,
    plan_codes: DashMap<String, PlanId>,
    subscriptions: DashMap<TenantId, Subscription>,

    users: DashMap<UserId, User>,
    user_emails: DashMap<String, UserId>,

    tenants: DashMap<TenantId, Tenant>,
    memberships: DashMap<(TenantId, UserId), Membership>,

    stores: DashMap<StoreId, Store>,
    store_slugs: DashMap<String, StoreId>,
    store_subdomains: DashMap<String, StoreId>,

    products: DashMap<ProductId, Product>,
    product_slugs: DashMap<(StoreId, String), ProductId>,

    pages: DashMap<PageId, Page>,
    page_slugs: DashMap<(StoreId, String), PageId>,

    tags: DashMap<TagId, Tag>,
    tag_slugs: DashMap<String, TagId>,
    store_tags: DashMap<(StoreId, TagId), ()>,
    product_tags: DashMap<(ProductId, TagId), ()>,

    events: DashMap<EventId, AnalyticsEvent>,
    event_keys: DashMap<String, EventId>,
}

impl MemoryRepository {
    /// Create a new, empty repository.
    pub fn new() -> Self {
        Self::default()
    }

    fn store_tenant(&self, store: &StoreId) -> Option<TenantId> {
        self.stores.get(store).map(|s| s.tenant_id.clone())
    }

    fn store_published(&self, store: &StoreId) -> bool {
        self.stores
            .get(store)
            .is_some_and(|s| s.status.is_published())
    }

    /// The store that owns the content an event refers to.
    fn event_store(&self, event: &AnalyticsEvent) -> Option<StoreId> {
        match event.event_type {
            ViewEventType::StoreView => event.store_id.clone(),
            ViewEventType::ProductView => event
                .product_id
                .as_ref()
                .and_then(|id| self.products.get(id).map(|p| p.store_id.clone())),
            ViewEventType::PageView => event
                .page_id
                .as_ref()
                .and_then(|id| self.pages.get(id).map(|p| p.store_id.clone())),
        }
    }

    fn event_tenant(&self, event: &AnalyticsEvent) -> Option<TenantId> {
        self.event_store(event)
            .and_then(|store| self.store_tenant(&store))
    }

    fn tenant_events(
        &self,
        tenant: &TenantId,
        since: Option<DateTime<Utc>>,
    ) -> Vec<(ViewEventType, DateTime<Utc>)> {
        let candidates: Vec<AnalyticsEvent> = self
            .events
            .iter()
            .filter(|e| since.is_none_or(|s| e.created_at >= s))
            .map(|e| e.value().clone())
            .collect();
        candidates
            .into_iter()
            .filter(|e| self.event_tenant(e).as_ref() == Some(tenant))
            .map(|e| (e.event_type, e.created_at))
            .collect()
    }

    /// Resolve the query's tag slugs to ids. `None` means "no tag filter".
    fn tag_filter(&self, query: &ExploreQuery) -> Option<Vec<TagId>> {
        if query.tags.is_empty() {
            return None;
        }
        Some(
            query
                .tags
                .iter()
                .filter_map(|slug| self.tag_slugs.get(slug).map(|id| id.clone()))
                .collect(),
        )
    }

    fn new_plan(draft: &PlanDraft, now: DateTime<Utc>) -> Plan {
        Plan {
            id: PlanId::generate(),
            code: draft.code.clone(),
            name: draft.name.clone(),
            quotas: draft.quotas,
            features: draft.features.clone(),
            created_at: now,
            updated_at: now,
        }
    }
}

#[async_trait]
impl PlanStore for MemoryRepository {
    async fn upsert_plan(&self, draft: &PlanDraft) -> Result<Plan, StoreError> {
        let plan = self.get_or_create_plan(draft).await?;
        let mut entry = self
            .plans
            .get_mut(&plan.id)
            .ok_or_else(|| StoreError::NotFound(format!("plan {}", plan.id)))?;
        entry.name.clone_from(&draft.name);
        entry.quotas = draft.quotas;
        entry.features = draft.features.clone();
        entry.updated_at = Utc::now();
        Ok(entry.clone())
    }

    async fn get_or_create_plan(&self, draft: &PlanDraft) -> Result<Plan, StoreError> {
        let id = match self.plan_codes.entry(draft.code.clone()) {
            Entry::Occupied(existing) => existing.get().clone(),
            Entry::Vacant(vacant) => {
                let plan = Self::new_plan(draft, Utc::now());
                let id = plan.id.clone();
                self.plans.insert(id.clone(), plan);
                vacant.insert(id.clone());
                id
            }
        };
        self.plans
            .get(&id)
            .map(|p| p.clone())
            .ok_or_else(|| StoreError::NotFound(format!("plan {id}")))
    }

    async fn get_plan(&self, id: &PlanId) -> Result<Option<Plan>, StoreError> {
        Ok(self.plans.get(id).map(|p| p.clone()))
    }

    async fn get_plan_by_code(&self, code: &str) -> Result<Option<Plan>, StoreError> {
        let Some(id) = self.plan_codes.get(code).map(|id| id.clone()) else {
            return Ok(None);
        };
        self.get_plan(&id).await
    }

    async fn list_plans(&self) -> Result<Vec<Plan>, StoreError> {
        let mut plans: Vec<Plan> = self.plans.iter().map(|p| p.clone()).collect();
        plans.sort_by(|a, b| {
            a.quotas
                .max_stores
                .cmp(&b.quotas.max_stores)
                .then_with(|| a.code.cmp(&b.code))
        });
        Ok(plans)
    }

    async fn get_subscription(
        &self,
        tenant: &TenantId,
    ) -> Result<Option<Subscription>, StoreError> {
        Ok(self.subscriptions.get(tenant).map(|s| s.clone()))
    }

    async fn get_or_create_subscription(
        &self,
        tenant: &TenantId,
        plan: &PlanId,
    ) -> Result<Subscription, StoreError> {
        let sub = self
            .subscriptions
            .entry(tenant.clone())
            .or_insert_with(|| {
                let now = Utc::now();
                Subscription {
                    id: SubscriptionId::generate(),
                    tenant_id: tenant.clone(),
                    plan_id: plan.clone(),
                    status: SubscriptionStatus::Active,
                    created_at: now,
                    updated_at: now,
                }
            });
        Ok(sub.clone())
    }

    async fn set_subscription_plan(
        &self,
        tenant: &TenantId,
        plan: &PlanId,
    ) -> Result<Subscription, StoreError> {
        let mut sub = self
            .subscriptions
            .get_mut(tenant)
            .ok_or_else(|| StoreError::NotFound(format!("subscription for tenant {tenant}")))?;
        sub.plan_id = plan.clone();
        sub.status = SubscriptionStatus::Active;
        sub.updated_at = Utc::now();
        Ok(sub.clone())
    }
}

#[async_trait]
impl UserStore for MemoryRepository {
    async fn create_user(&self, user: &User) -> Result<(), StoreError> {
        reserve(&self.user_emails, user.email.clone(), &user.id, "email")?;
        self.users.insert(user.id.clone(), user.clone());
        Ok(())
    }

    async fn get_user(&self, id: &UserId) -> Result<Option<User>, StoreError> {
        Ok(self.users.get(id).map(|u| u.clone()))
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let Some(id) = self.user_emails.get(email).map(|id| id.clone()) else {
            return Ok(None);
        };
        self.get_user(&id).await
    }

    async fn set_refresh_token_hash(
        &self,
        id: &UserId,
        hash: Option<&str>,
    ) -> Result<(), StoreError> {
        let mut user = self
            .users
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(format!("user {id}")))?;
        user.refresh_token_hash = hash.map(str::to_owned);
        Ok(())
    }
}

#[async_trait]
impl TenantStore for MemoryRepository {
    async fn create_tenant(&self, tenant: &Tenant, owner: &Membership) -> Result<(), StoreError> {
        self.tenants.insert(tenant.id.clone(), tenant.clone());
        self.memberships.insert(
            (owner.tenant_id.clone(), owner.user_id.clone()),
            owner.clone(),
        );
        Ok(())
    }

    async fn get_tenant(&self, id: &TenantId) -> Result<Option<Tenant>, StoreError> {
        Ok(self.tenants.get(id).map(|t| t.clone()))
    }

    async fn get_membership(
        &self,
        tenant: &TenantId,
        user: &UserId,
    ) -> Result<Option<Membership>, StoreError> {
        Ok(self
            .memberships
            .get(&(tenant.clone(), user.clone()))
            .map(|m| m.clone()))
    }

    async fn list_memberships(
        &self,
        user: &UserId,
    ) -> Result<Vec<(Membership, Tenant)>, StoreError> {
        let mine: Vec<Membership> = self
            .memberships
            .iter()
            .filter(|m| &m.user_id == user)
            .map(|m| m.value().clone())
            .collect();
        let mut out: Vec<(Membership, Tenant)> = mine
            .into_iter()
            .filter_map(|m| {
                let tenant = self.tenants.get(&m.tenant_id)?.clone();
                Some((m, tenant))
            })
            .collect();
        out.sort_by(|a, b| a.0.created_at.cmp(&b.0.created_at));
        Ok(out)
    }
}

#[async_trait]
impl CatalogStore for MemoryRepository {
    async fn insert_store(&self, store: &Store) -> Result<(), StoreError> {
        reserve(&self.store_slugs, store.slug.clone(), &store.id, "store slug")?;
        if let Err(e) = reserve(
            &self.store_subdomains,
            store.subdomain.clone(),
            &store.id,
            "subdomain",
        ) {
            self.store_slugs.remove(&store.slug);
            return Err(e);
        }
        self.stores.insert(store.id.clone(), store.clone());
        Ok(())
    }

    async fn update_store(&self, store: &Store) -> Result<(), StoreError> {
        let previous = self
            .stores
            .get(&store.id)
            .map(|s| s.clone())
            .ok_or_else(|| StoreError::NotFound(format!("store {}", store.id)))?;

        let slug_changed = previous.slug != store.slug;
        if slug_changed {
            reserve(&self.store_slugs, store.slug.clone(), &store.id, "store slug")?;
        }
        if previous.subdomain != store.subdomain {
            if let Err(e) = reserve(
                &self.store_subdomains,
                store.subdomain.clone(),
                &store.id,
                "subdomain",
            ) {
                if slug_changed {
                    self.store_slugs.remove(&store.slug);
                }
                return Err(e);
            }
            self.store_subdomains.remove(&previous.subdomain);
        }
        if slug_changed {
            self.store_slugs.remove(&previous.slug);
        }
        self.stores.insert(store.id.clone(), store.clone());
        Ok(())
    }

    async fn get_store(&self, id: &StoreId) -> Result<Option<Store>, StoreError> {
        Ok(self.stores.get(id).map(|s| s.clone()))
    }

    async fn find_store_by_slug(&self, slug: &str) -> Result<Option<Store>, StoreError> {
        let Some(id) = self.store_slugs.get(slug).map(|id| id.clone()) else {
            return Ok(None);
        };
        self.get_store(&id).await
    }

    async fn find_store_by_subdomain(
        &self,
        subdomain: &str,
    ) -> Result<Option<Store>, StoreError> {
        let Some(id) = self.store_subdomains.get(subdomain).map(|id| id.clone()) else {
            return Ok(None);
        };
        self.get_store(&id).await
    }

    async fn list_stores(&self, tenant: &TenantId) -> Result<Vec<Store>, StoreError> {
        let mut stores: Vec<Store> = self
            .stores
            .iter()
            .filter(|s| &s.tenant_id == tenant)
            .map(|s| s.clone())
            .collect();
        newest_first(&mut stores, |s| (s.created_at, s.id.clone()));
        Ok(stores)
    }

    async fn count_stores(&self, tenant: &TenantId) -> Result<u64, StoreError> {
        Ok(self.stores.iter().filter(|s| &s.tenant_id == tenant).count() as u64)
    }

    async fn insert_product(&self, product: &Product) -> Result<(), StoreError> {
        reserve(
            &self.product_slugs,
            (product.store_id.clone(), product.slug.clone()),
            &product.id,
            "product slug",
        )?;
        self.products.insert(product.id.clone(), product.clone());
        Ok(())
    }

    async fn update_product(&self, product: &Product) -> Result<(), StoreError> {
        let previous = self
            .products
            .get(&product.id)
            .map(|p| p.clone())
            .ok_or_else(|| StoreError::NotFound(format!("product {}", product.id)))?;
        if previous.slug != product.slug {
            reserve(
                &self.product_slugs,
                (product.store_id.clone(), product.slug.clone()),
                &product.id,
                "product slug",
            )?;
            self.product_slugs
                .remove(&(previous.store_id.clone(), previous.slug.clone()));
        }
        self.products.insert(product.id.clone(), product.clone());
        Ok(())
    }

    async fn get_product(&self, id: &ProductId) -> Result<Option<Product>, StoreError> {
        Ok(self.products.get(id).map(|p| p.clone()))
    }

    async fn find_product_by_slug(
        &self,
        store: &StoreId,
        slug: &str,
    ) -> Result<Option<Product>, StoreError> {
        let Some(id) = self
            .product_slugs
            .get(&(store.clone(), slug.to_owned()))
            .map(|id| id.clone())
        else {
            return Ok(None);
        };
        self.get_product(&id).await
    }

    async fn list_products(
        &self,
        tenant: &TenantId,
        store: Option<&StoreId>,
    ) -> Result<Vec<Product>, StoreError> {
        let candidates: Vec<Product> = self
            .products
            .iter()
            .filter(|p| store.is_none_or(|s| &p.store_id == s))
            .map(|p| p.clone())
            .collect();
        let mut products: Vec<Product> = candidates
            .into_iter()
            .filter(|p| self.store_tenant(&p.store_id).as_ref() == Some(tenant))
            .collect();
        newest_first(&mut products, |p| (p.created_at, p.id.clone()));
        Ok(products)
    }

    async fn list_published_products(&self, store: &StoreId) -> Result<Vec<Product>, StoreError> {
        let mut products: Vec<Product> = self
            .products
            .iter()
            .filter(|p| &p.store_id == store && p.status.is_published())
            .map(|p| p.clone())
            .collect();
        newest_first(&mut products, |p| (p.created_at, p.id.clone()));
        Ok(products)
    }

    async fn count_products_in_store(&self, store: &StoreId) -> Result<u64, StoreError> {
        Ok(self
            .products
            .iter()
            .filter(|p| &p.store_id == store)
            .count() as u64)
    }

    async fn count_products_for_tenant(&self, tenant: &TenantId) -> Result<u64, StoreError> {
        Ok(self.list_products(tenant, None).await?.len() as u64)
    }

    async fn insert_page(&self, page: &Page) -> Result<(), StoreError> {
        reserve(
            &self.page_slugs,
            (page.store_id.clone(), page.slug.clone()),
            &page.id,
            "page slug",
        )?;
        self.pages.insert(page.id.clone(), page.clone());
        Ok(())
    }

    async fn update_page(&self, page: &Page) -> Result<(), StoreError> {
        let previous = self
            .pages
            .get(&page.id)
            .map(|p| p.clone())
            .ok_or_else(|| StoreError::NotFound(format!("page {}", page.id)))?;
        if previous.slug != page.slug {
            reserve(
                &self.page_slugs,
                (page.store_id.clone(), page.slug.clone()),
                &page.id,
                "page slug",
            )?;
            self.page_slugs
                .remove(&(previous.store_id.clone(), previous.slug.clone()));
        }
        self.pages.insert(page.id.clone(), page.clone());
        Ok(())
    }

    async fn get_page(&self, id: &PageId) -> Result<Option<Page>, StoreError> {
        Ok(self.pages.get(id).map(|p| p.clone()))
    }

    async fn find_page_by_slug(
        &self,
        store: &StoreId,
        slug: &str,
    ) -> Result<Option<Page>, StoreError> {
        let Some(id) = self
            .page_slugs
            .get(&(store.clone(), slug.to_owned()))
            .map(|id| id.clone())
        else {
            return Ok(None);
        };
        self.get_page(&id).await
    }

    async fn list_pages(
        &self,
        tenant: &TenantId,
        store: Option<&StoreId>,
    ) -> Result<Vec<Page>, StoreError> {
        let candidates: Vec<Page> = self
            .pages
            .iter()
            .filter(|p| store.is_none_or(|s| &p.store_id == s))
            .map(|p| p.clone())
            .collect();
        let mut pages: Vec<Page> = candidates
            .into_iter()
            .filter(|p| self.store_tenant(&p.store_id).as_ref() == Some(tenant))
            .collect();
        newest_first(&mut pages, |p| (p.created_at, p.id.clone()));
        Ok(pages)
    }

    async fn search_stores(&self, query: &ExploreQuery) -> Result<Vec<Store>, StoreError> {
        let tag_ids = self.tag_filter(query);
        let mut stores: Vec<Store> = self
            .stores
            .iter()
            .filter(|s| s.status.is_published())
            .filter(|s| query.matches_text(&s.name) || query.matches_text(&s.slug))
            .map(|s| s.clone())
            .collect();
        if let Some(tag_ids) = tag_ids {
            stores.retain(|s| {
                tag_ids
                    .iter()
                    .any(|t| self.store_tags.contains_key(&(s.id.clone(), t.clone())))
            });
        }
        match query.sort {
            ExploreSort::Name => stores.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id))),
            ExploreSort::New | ExploreSort::Price => {
                newest_first(&mut stores, |s| (s.created_at, s.id.clone()));
            }
        }
        Ok(page_window(stores, query))
    }

    async fn search_products(&self, query: &ExploreQuery) -> Result<Vec<Product>, StoreError> {
        let tag_ids = self.tag_filter(query);
        let candidates: Vec<Product> = self
            .products
            .iter()
            .filter(|p| p.status.is_published())
            .filter(|p| {
                query.matches_text(&p.title)
                    || query.matches_text(&p.slug)
                    || p.description.as_deref().is_some_and(|d| query.matches_text(d))
            })
            .map(|p| p.clone())
            .collect();
        let mut products: Vec<Product> = candidates
            .into_iter()
            .filter(|p| self.store_published(&p.store_id))
            .collect();
        if let Some(tag_ids) = tag_ids {
            products.retain(|p| {
                tag_ids
                    .iter()
                    .any(|t| self.product_tags.contains_key(&(p.id.clone(), t.clone())))
            });
        }
        match query.sort {
            ExploreSort::Name => {
                products.sort_by(|a, b| a.title.cmp(&b.title).then(a.id.cmp(&b.id)));
            }
            ExploreSort::Price => {
                products.sort_by(|a, b| a.price_cents.cmp(&b.price_cents).then(a.id.cmp(&b.id)));
            }
            ExploreSort::New => newest_first(&mut products, |p| (p.created_at, p.id.clone())),
        }
        Ok(page_window(products, query))
    }
}

fn by_tier_then_name(tags: &mut [Tag]) {
    tags.sort_by(|a, b| a.tier.cmp(&b.tier).then_with(|| a.name.cmp(&b.name)));
}

#[async_trait]
impl TagStore for MemoryRepository {
    async fn insert_tag(&self, tag: &Tag) -> Result<(), StoreError> {
        reserve(&self.tag_slugs, tag.slug.clone(), &tag.id, "tag slug")?;
        self.tags.insert(tag.id.clone(), tag.clone());
        Ok(())
    }

    async fn get_tag(&self, id: &TagId) -> Result<Option<Tag>, StoreError> {
        Ok(self.tags.get(id).map(|t| t.clone()))
    }

    async fn find_tag_by_slug(&self, slug: &str) -> Result<Option<Tag>, StoreError> {
        let Some(id) = self.tag_slugs.get(slug).map(|id| id.clone()) else {
            return Ok(None);
        };
        self.get_tag(&id).await
    }

    async fn list_tags(&self) -> Result<Vec<Tag>, StoreError> {
        let mut tags: Vec<Tag> = self.tags.iter().map(|t| t.clone()).collect();
        by_tier_then_name(&mut tags);
        Ok(tags)
    }

    async fn link_store_tag(&self, store: &StoreId, tag: &TagId) -> Result<bool, StoreError> {
        Ok(self
            .store_tags
            .insert((store.clone(), tag.clone()), ())
            .is_none())
    }

    async fn unlink_store_tag(&self, store: &StoreId, tag: &TagId) -> Result<bool, StoreError> {
        Ok(self
            .store_tags
            .remove(&(store.clone(), tag.clone()))
            .is_some())
    }

    async fn link_product_tag(
        &self,
        product: &ProductId,
        tag: &TagId,
    ) -> Result<bool, StoreError> {
        Ok(self
            .product_tags
            .insert((product.clone(), tag.clone()), ())
            .is_none())
    }

    async fn unlink_product_tag(
        &self,
        product: &ProductId,
        tag: &TagId,
    ) -> Result<bool, StoreError> {
        Ok(self
            .product_tags
            .remove(&(product.clone(), tag.clone()))
            .is_some())
    }

    async fn tags_for_store(&self, store: &StoreId) -> Result<Vec<Tag>, StoreError> {
        let ids: Vec<TagId> = self
            .store_tags
            .iter()
            .filter(|link| &link.key().0 == store)
            .map(|link| link.key().1.clone())
            .collect();
        let mut tags: Vec<Tag> = ids
            .iter()
            .filter_map(|id| self.tags.get(id).map(|t| t.clone()))
            .collect();
        by_tier_then_name(&mut tags);
        Ok(tags)
    }

    async fn tags_for_product(&self, product: &ProductId) -> Result<Vec<Tag>, StoreError> {
        let ids: Vec<TagId> = self
            .product_tags
            .iter()
            .filter(|link| &link.key().0 == product)
            .map(|link| link.key().1.clone())
            .collect();
        let mut tags: Vec<Tag> = ids
            .iter()
            .filter_map(|id| self.tags.get(id).map(|t| t.clone()))
            .collect();
        by_tier_then_name(&mut tags);
        Ok(tags)
    }

    async fn published_stores_with_tag(&self, tag: &TagId) -> Result<Vec<Store>, StoreError> {
        let ids: Vec<StoreId> = self
            .store_tags
            .iter()
            .filter(|link| &link.key().1 == tag)
            .map(|link| link.key().0.clone())
            .collect();
        let mut stores: Vec<Store> = ids
            .iter()
            .filter_map(|id| self.stores.get(id).map(|s| s.clone()))
            .filter(|s| s.status.is_published())
            .collect();
        newest_first(&mut stores, |s| (s.created_at, s.id.clone()));
        Ok(stores)
    }

    async fn published_products_with_tag(
        &self,
        tag: &TagId,
    ) -> Result<Vec<Product>, StoreError> {
        let ids: Vec<ProductId> = self
            .product_tags
            .iter()
            .filter(|link| &link.key().1 == tag)
            .map(|link| link.key().0.clone())
            .collect();
        let mut products: Vec<Product> = ids
            .iter()
            .filter_map(|id| self.products.get(id).map(|p| p.clone()))
            .filter(|p| p.status.is_published() && self.store_published(&p.store_id))
            .collect();
        newest_first(&mut products, |p| (p.created_at, p.id.clone()));
        Ok(products)
    }
}

#[async_trait]
impl AnalyticsStore for MemoryRepository {
    async fn insert_event(&self, event: &AnalyticsEvent) -> Result<(), StoreError> {
        if let Some(ref key) = event.idempotency_key {
            reserve(&self.event_keys, key.clone(), &event.id, "idempotency key")?;
        }
        self.events.insert(event.id.clone(), event.clone());
        Ok(())
    }

    async fn upsert_event_by_key(&self, event: &AnalyticsEvent) -> Result<bool, StoreError> {
        let Some(ref key) = event.idempotency_key else {
            return Err(StoreError::Backend(
                "upsert requires an idempotency key".to_owned(),
            ));
        };
        match self.event_keys.entry(key.clone()) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(vacant) => {
                self.events.insert(event.id.clone(), event.clone());
                vacant.insert(event.id.clone());
                Ok(true)
            }
        }
    }

    async fn count_views(
        &self,
        tenant: &TenantId,
        since: Option<DateTime<Utc>>,
    ) -> Result<ViewTotals, StoreError> {
        let mut totals = ViewTotals::default();
        for (event_type, _) in self.tenant_events(tenant, since) {
            totals.record(event_type);
        }
        Ok(totals)
    }

    async fn view_timestamps(
        &self,
        tenant: &TenantId,
        since: DateTime<Utc>,
    ) -> Result<Vec<(ViewEventType, DateTime<Utc>)>, StoreError> {
        Ok(self.tenant_events(tenant, Some(since)))
    }

    async fn count_store_views(
        &self,
        store: &StoreId,
        since: DateTime<Utc>,
    ) -> Result<ViewTotals, StoreError> {
        let recent: Vec<AnalyticsEvent> = self
            .events
            .iter()
            .filter(|e| e.created_at >= since)
            .map(|e| e.value().clone())
            .collect();
        let mut totals = ViewTotals::default();
        for event in recent {
            if self.event_store(&event).as_ref() == Some(store) {
                totals.record(event.event_type);
            }
        }
        Ok(totals)
    }

    async fn count_events_with_key(&self, key: &str) -> Result<u64, StoreError> {
        let rows = self
            .events
            .iter()
            .filter(|e| e.idempotency_key.as_deref() == Some(key))
            .count();
        Ok(rows as u64)
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use hololith_core::{PublishStatus, ViewTarget};

    use super::*;

    fn store(tenant: &TenantId, slug: &str) -> Store {
        let now = Utc::now();
        Store {
            id: StoreId::generate(),
            tenant_id: tenant.clone(),
            name: slug.to_owned(),
            slug: slug.to_owned(),
            subdomain: slug.to_owned(),
            custom_domain: None,
            status: PublishStatus::Draft,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn conformance() {
        let repo = MemoryRepository::new();
        hololith_store::testing::run_repository_conformance_tests(&repo)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn concurrent_upserts_keep_one_row() {
        let repo = Arc::new(MemoryRepository::new());
        let target = ViewTarget::Store(StoreId::new("s1"));
        let at = Utc::now();

        let mut handles = Vec::new();
        for _ in 0..16 {
            let repo = Arc::clone(&repo);
            let target = target.clone();
            handles.push(tokio::spawn(async move {
                let event = AnalyticsEvent::for_target(&target, Some("h".into()), at);
                repo.upsert_event_by_key(&event).await.unwrap()
            }));
        }

        let mut inserted = 0;
        for handle in handles {
            if handle.await.unwrap() {
                inserted += 1;
            }
        }
        assert_eq!(inserted, 1);
        assert_eq!(repo.events.len(), 1);
    }

    #[tokio::test]
    async fn key_count_reflects_stored_rows() {
        let repo = MemoryRepository::new();
        let at = Utc::now();
        let target = ViewTarget::Store(StoreId::new("s1"));
        let event = AnalyticsEvent::for_target(&target, Some("h".into()), at);
        let key = event.idempotency_key.clone().unwrap();

        assert_eq!(repo.count_events_with_key(&key).await.unwrap(), 0);
        repo.upsert_event_by_key(&event).await.unwrap();
        repo.upsert_event_by_key(&event).await.unwrap();
        assert_eq!(repo.count_events_with_key(&key).await.unwrap(), 1);

        // A row written around the key index still counts.
        let stray = AnalyticsEvent {
            id: EventId::generate(),
            ..event.clone()
        };
        repo.events.insert(stray.id.clone(), stray);
        assert_eq!(repo.count_events_with_key(&key).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn failed_subdomain_releases_slug() {
        let repo = MemoryRepository::new();
        let tenant = TenantId::new("t1");
        repo.insert_store(&store(&tenant, "taken")).await.unwrap();

        let clash = Store {
            slug: "fresh".into(),
            ..store(&tenant, "taken")
        };
        assert!(repo.insert_store(&clash).await.is_err());
        assert!(repo.store_slugs.get("fresh").is_none());

        let ok = Store {
            subdomain: "fresh".into(),
            ..store(&tenant, "fresh")
        };
        repo.insert_store(&ok).await.unwrap();
    }

    #[tokio::test]
    async fn update_frees_previous_slug() {
        let repo = MemoryRepository::new();
        let tenant = TenantId::new("t1");
        let original = store(&tenant, "old-name");
        repo.insert_store(&original).await.unwrap();

        let renamed = Store {
            slug: "new-name".into(),
            ..original.clone()
        };
        repo.update_store(&renamed).await.unwrap();
        assert!(repo.find_store_by_slug("old-name").await.unwrap().is_none());
        repo.insert_store(&Store {
            subdomain: "other".into(),
            ..store(&tenant, "old-name")
        })
        .await
        .unwrap();
    }
}
