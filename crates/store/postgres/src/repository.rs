use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use sqlx::postgres::PgRow;
use tracing::debug;

use hololith_core::{
    AnalyticsEvent, ExploreQuery, ExploreSort, Membership, Page, PageId, Plan, PlanDraft, PlanId,
    Product, ProductId, Store, StoreId, Subscription, SubscriptionId, SubscriptionStatus, Tag,
    TagId, Tenant, TenantId, User, UserId, ViewEventType, ViewTotals,
};
use hololith_store::{
    AnalyticsStore, CatalogStore, PlanStore, Repository, StoreError, TagStore, TenantStore,
    UserStore,
};

use crate::config::{PostgresConfig, Tables};
use crate::migrations;
use crate::rows::{
    self, PAGE_COLUMNS, PLAN_COLUMNS, PRODUCT_COLUMNS, STORE_COLUMNS, TAG_COLUMNS, backend,
    write_error,
};

/// SQL expression resolving the store an event row (aliased `e`) belongs to.
///
/// Requires `LEFT JOIN`s of products as `p` and pages as `pg`.
const EVENT_STORE: &str = "COALESCE(e.store_id, p.store_id, pg.store_id)";

/// PostgreSQL-backed implementation of [`Repository`].
///
/// Uniqueness rules are enforced by table constraints; unique violations are
/// reported as [`StoreError::Conflict`]. Keyed view inserts use
/// `ON CONFLICT (idempotency_key) DO NOTHING`, so concurrent duplicates
/// collapse to a single row.
pub struct PostgresRepository {
    pool: PgPool,
    tables: Arc<Tables>,
}

impl PostgresRepository {
    /// Connect, create the pool and run migrations.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Connection`] if pool creation fails, or
    /// [`StoreError::Backend`] if migrations fail.
    pub async fn new(config: PostgresConfig) -> Result<Self, StoreError> {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(config.pool_size)
            .connect(&config.url)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        Self::from_pool(pool, config).await
    }

    /// Build a repository over an existing pool. Runs migrations on creation.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] if migrations fail.
    pub async fn from_pool(pool: PgPool, config: PostgresConfig) -> Result<Self, StoreError> {
        migrations::run_migrations(&pool, &config)
            .await
            .map_err(backend)?;

        Ok(Self {
            pool,
            tables: Arc::new(config.tables()),
        })
    }

    async fn fetch_one_opt<T>(
        &self,
        query: sqlx::query::Query<'_, sqlx::Postgres, sqlx::postgres::PgArguments>,
        decode: fn(&PgRow) -> Result<T, StoreError>,
    ) -> Result<Option<T>, StoreError> {
        let row = query.fetch_optional(&self.pool).await.map_err(backend)?;
        row.as_ref().map(decode).transpose()
    }

    async fn fetch_many<T>(
        &self,
        query: sqlx::query::Query<'_, sqlx::Postgres, sqlx::postgres::PgArguments>,
        decode: fn(&PgRow) -> Result<T, StoreError>,
    ) -> Result<Vec<T>, StoreError> {
        let fetched = query.fetch_all(&self.pool).await.map_err(backend)?;
        fetched.iter().map(decode).collect()
    }

    async fn count(
        &self,
        query: sqlx::query::QueryScalar<'_, sqlx::Postgres, i64, sqlx::postgres::PgArguments>,
    ) -> Result<u64, StoreError> {
        let n = query.fetch_one(&self.pool).await.map_err(backend)?;
        Ok(u64::try_from(n).unwrap_or(0))
    }

    async fn totals(
        &self,
        query: sqlx::query::QueryAs<'_, sqlx::Postgres, (String, i64), sqlx::postgres::PgArguments>,
    ) -> Result<ViewTotals, StoreError> {
        let counts = query.fetch_all(&self.pool).await.map_err(backend)?;
        let mut totals = ViewTotals::default();
        for (raw, n) in counts {
            totals.add(rows::event_type(&raw)?, u64::try_from(n).unwrap_or(0));
        }
        Ok(totals)
    }

    fn explore_order(sort: ExploreSort, name_column: &str, alias: &str) -> String {
        match sort {
            ExploreSort::Name => format!("{alias}.{name_column} ASC, {alias}.id ASC"),
            ExploreSort::Price if alias == "p" => "p.price_cents ASC, p.id ASC".to_owned(),
            ExploreSort::Price | ExploreSort::New => {
                format!("{alias}.created_at DESC, {alias}.id DESC")
            }
        }
    }
}

#[async_trait]
impl PlanStore for PostgresRepository {
    async fn upsert_plan(&self, draft: &PlanDraft) -> Result<Plan, StoreError> {
        let table = &self.tables.plans;
        let id = PlanId::generate();
        let query = format!(
            "INSERT INTO {table} (id, code, name, max_stores, max_products_per_store, \
             max_products_total, max_tag_tier, features, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, NOW(), NOW()) \
             ON CONFLICT (code) DO UPDATE \
             SET name = EXCLUDED.name, \
                 max_stores = EXCLUDED.max_stores, \
                 max_products_per_store = EXCLUDED.max_products_per_store, \
                 max_products_total = EXCLUDED.max_products_total, \
                 max_tag_tier = EXCLUDED.max_tag_tier, \
                 features = EXCLUDED.features, \
                 updated_at = NOW() \
             RETURNING {PLAN_COLUMNS}"
        );
        let row = sqlx::query(&query)
            .bind(id.as_str())
            .bind(&draft.code)
            .bind(&draft.name)
            .bind(i64::from(draft.quotas.max_stores))
            .bind(i64::from(draft.quotas.max_products_per_store))
            .bind(draft.quotas.max_products_total.map(i64::from))
            .bind(i16::from(draft.quotas.max_tag_tier))
            .bind(rows::to_json(&draft.features)?)
            .fetch_one(&self.pool)
            .await
            .map_err(backend)?;
        rows::plan(&row)
    }

    async fn get_or_create_plan(&self, draft: &PlanDraft) -> Result<Plan, StoreError> {
        let table = &self.tables.plans;
        let id = PlanId::generate();
        let insert = format!(
            "INSERT INTO {table} (id, code, name, max_stores, max_products_per_store, \
             max_products_total, max_tag_tier, features, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, NOW(), NOW()) \
             ON CONFLICT (code) DO NOTHING"
        );
        sqlx::query(&insert)
            .bind(id.as_str())
            .bind(&draft.code)
            .bind(&draft.name)
            .bind(i64::from(draft.quotas.max_stores))
            .bind(i64::from(draft.quotas.max_products_per_store))
            .bind(draft.quotas.max_products_total.map(i64::from))
            .bind(i16::from(draft.quotas.max_tag_tier))
            .bind(rows::to_json(&draft.features)?)
            .execute(&self.pool)
            .await
            .map_err(backend)?;

        self.get_plan_by_code(&draft.code)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("plan {}", draft.code)))
    }

    async fn get_plan(&self, id: &PlanId) -> Result<Option<Plan>, StoreError> {
        let query = format!(
            "SELECT {PLAN_COLUMNS} FROM {} WHERE id = $1",
            self.tables.plans
        );
        self.fetch_one_opt(sqlx::query(&query).bind(id.as_str()), rows::plan)
            .await
    }

    async fn get_plan_by_code(&self, code: &str) -> Result<Option<Plan>, StoreError> {
        let query = format!(
            "SELECT {PLAN_COLUMNS} FROM {} WHERE code = $1",
            self.tables.plans
        );
        self.fetch_one_opt(sqlx::query(&query).bind(code), rows::plan)
            .await
    }

    async fn list_plans(&self) -> Result<Vec<Plan>, StoreError> {
        let query = format!(
            "SELECT {PLAN_COLUMNS} FROM {} ORDER BY max_stores ASC, code ASC",
            self.tables.plans
        );
        self.fetch_many(sqlx::query(&query), rows::plan).await
    }

    async fn get_subscription(
        &self,
        tenant: &TenantId,
    ) -> Result<Option<Subscription>, StoreError> {
        let query = format!(
            "SELECT id, tenant_id, plan_id, status, created_at, updated_at \
             FROM {} WHERE tenant_id = $1",
            self.tables.subscriptions
        );
        self.fetch_one_opt(sqlx::query(&query).bind(tenant.as_str()), rows::subscription)
            .await
    }

    async fn get_or_create_subscription(
        &self,
        tenant: &TenantId,
        plan: &PlanId,
    ) -> Result<Subscription, StoreError> {
        let id = SubscriptionId::generate();
        let insert = format!(
            "INSERT INTO {} (id, tenant_id, plan_id, status, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, NOW(), NOW()) \
             ON CONFLICT (tenant_id) DO NOTHING",
            self.tables.subscriptions
        );
        sqlx::query(&insert)
            .bind(id.as_str())
            .bind(tenant.as_str())
            .bind(plan.as_str())
            .bind(SubscriptionStatus::Active.as_str())
            .execute(&self.pool)
            .await
            .map_err(backend)?;

        self.get_subscription(tenant)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("subscription for tenant {tenant}")))
    }

    async fn set_subscription_plan(
        &self,
        tenant: &TenantId,
        plan: &PlanId,
    ) -> Result<Subscription, StoreError> {
        let query = format!(
            "UPDATE {} SET plan_id = $1, status = $2, updated_at = NOW() \
             WHERE tenant_id = $3 \
             RETURNING id, tenant_id, plan_id, status, created_at, updated_at",
            self.tables.subscriptions
        );
        self.fetch_one_opt(
            sqlx::query(&query)
                .bind(plan.as_str())
                .bind(SubscriptionStatus::Active.as_str())
                .bind(tenant.as_str()),
            rows::subscription,
        )
        .await?
        .ok_or_else(|| StoreError::NotFound(format!("subscription for tenant {tenant}")))
    }
}

#[async_trait]
impl UserStore for PostgresRepository {
    async fn create_user(&self, user: &User) -> Result<(), StoreError> {
        let query = format!(
            "INSERT INTO {} (id, email, password_hash, refresh_token_hash, created_at) \
             VALUES ($1, $2, $3, $4, $5)",
            self.tables.users
        );
        sqlx::query(&query)
            .bind(user.id.as_str())
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(user.refresh_token_hash.as_deref())
            .bind(user.created_at)
            .execute(&self.pool)
            .await
            .map_err(|e| write_error(e, "email"))?;
        Ok(())
    }

    async fn get_user(&self, id: &UserId) -> Result<Option<User>, StoreError> {
        let query = format!(
            "SELECT id, email, password_hash, refresh_token_hash, created_at \
             FROM {} WHERE id = $1",
            self.tables.users
        );
        self.fetch_one_opt(sqlx::query(&query).bind(id.as_str()), rows::user)
            .await
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let query = format!(
            "SELECT id, email, password_hash, refresh_token_hash, created_at \
             FROM {} WHERE email = $1",
            self.tables.users
        );
        self.fetch_one_opt(sqlx::query(&query).bind(email), rows::user)
            .await
    }

    async fn set_refresh_token_hash(
        &self,
        id: &UserId,
        hash: Option<&str>,
    ) -> Result<(), StoreError> {
        let query = format!(
            "UPDATE {} SET refresh_token_hash = $1 WHERE id = $2",
            self.tables.users
        );
        let result = sqlx::query(&query)
            .bind(hash)
            .bind(id.as_str())
            .execute(&self.pool)
            .await
            .map_err(backend)?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("user {id}")));
        }
        Ok(())
    }
}

#[async_trait]
impl TenantStore for PostgresRepository {
    async fn create_tenant(&self, tenant: &Tenant, owner: &Membership) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await.map_err(backend)?;

        let insert_tenant = format!(
            "INSERT INTO {} (id, name, owner_id, created_at) VALUES ($1, $2, $3, $4)",
            self.tables.tenants
        );
        sqlx::query(&insert_tenant)
            .bind(tenant.id.as_str())
            .bind(&tenant.name)
            .bind(tenant.owner_id.as_str())
            .bind(tenant.created_at)
            .execute(&mut *tx)
            .await
            .map_err(|e| write_error(e, "tenant"))?;

        let insert_membership = format!(
            "INSERT INTO {} (id, tenant_id, user_id, role, created_at) \
             VALUES ($1, $2, $3, $4, $5)",
            self.tables.memberships
        );
        sqlx::query(&insert_membership)
            .bind(owner.id.as_str())
            .bind(owner.tenant_id.as_str())
            .bind(owner.user_id.as_str())
            .bind(owner.role.as_str())
            .bind(owner.created_at)
            .execute(&mut *tx)
            .await
            .map_err(|e| write_error(e, "membership"))?;

        tx.commit().await.map_err(backend)
    }

    async fn get_tenant(&self, id: &TenantId) -> Result<Option<Tenant>, StoreError> {
        let query = format!(
            "SELECT id, name, owner_id, created_at FROM {} WHERE id = $1",
            self.tables.tenants
        );
        self.fetch_one_opt(sqlx::query(&query).bind(id.as_str()), rows::tenant)
            .await
    }

    async fn get_membership(
        &self,
        tenant: &TenantId,
        user: &UserId,
    ) -> Result<Option<Membership>, StoreError> {
        let query = format!(
            "SELECT id, tenant_id, user_id, role, created_at FROM {} \
             WHERE tenant_id = $1 AND user_id = $2",
            self.tables.memberships
        );
        self.fetch_one_opt(
            sqlx::query(&query).bind(tenant.as_str()).bind(user.as_str()),
            rows::membership,
        )
        .await
    }

    async fn list_memberships(
        &self,
        user: &UserId,
    ) -> Result<Vec<(Membership, Tenant)>, StoreError> {
        let query = format!(
            "SELECT m.id AS m_id, m.tenant_id AS m_tenant_id, m.user_id AS m_user_id, \
                    m.role AS m_role, m.created_at AS m_created_at, \
                    t.id AS t_id, t.name AS t_name, t.owner_id AS t_owner_id, \
                    t.created_at AS t_created_at \
             FROM {memberships} m JOIN {tenants} t ON t.id = m.tenant_id \
             WHERE m.user_id = $1 \
             ORDER BY m.created_at ASC, m.id ASC",
            memberships = self.tables.memberships,
            tenants = self.tables.tenants
        );
        self.fetch_many(
            sqlx::query(&query).bind(user.as_str()),
            rows::membership_with_tenant,
        )
        .await
    }
}

#[async_trait]
impl CatalogStore for PostgresRepository {
    async fn insert_store(&self, store: &Store) -> Result<(), StoreError> {
        let query = format!(
            "INSERT INTO {} ({STORE_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
            self.tables.stores
        );
        sqlx::query(&query)
            .bind(store.id.as_str())
            .bind(store.tenant_id.as_str())
            .bind(&store.name)
            .bind(&store.slug)
            .bind(&store.subdomain)
            .bind(store.custom_domain.as_deref())
            .bind(store.status.as_str())
            .bind(store.created_at)
            .bind(store.updated_at)
            .execute(&self.pool)
            .await
            .map_err(|e| write_error(e, "store slug or subdomain"))?;
        Ok(())
    }

    async fn update_store(&self, store: &Store) -> Result<(), StoreError> {
        let query = format!(
            "UPDATE {} SET name = $1, slug = $2, subdomain = $3, custom_domain = $4, \
             status = $5, updated_at = $6 WHERE id = $7",
            self.tables.stores
        );
        let result = sqlx::query(&query)
            .bind(&store.name)
            .bind(&store.slug)
            .bind(&store.subdomain)
            .bind(store.custom_domain.as_deref())
            .bind(store.status.as_str())
            .bind(store.updated_at)
            .bind(store.id.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| write_error(e, "store slug or subdomain"))?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("store {}", store.id)));
        }
        Ok(())
    }

    async fn get_store(&self, id: &StoreId) -> Result<Option<Store>, StoreError> {
        let query = format!(
            "SELECT {STORE_COLUMNS} FROM {} WHERE id = $1",
            self.tables.stores
        );
        self.fetch_one_opt(sqlx::query(&query).bind(id.as_str()), rows::store)
            .await
    }

    async fn find_store_by_slug(&self, slug: &str) -> Result<Option<Store>, StoreError> {
        let query = format!(
            "SELECT {STORE_COLUMNS} FROM {} WHERE slug = $1",
            self.tables.stores
        );
        self.fetch_one_opt(sqlx::query(&query).bind(slug), rows::store)
            .await
    }

    async fn find_store_by_subdomain(
        &self,
        subdomain: &str,
    ) -> Result<Option<Store>, StoreError> {
        let query = format!(
            "SELECT {STORE_COLUMNS} FROM {} WHERE subdomain = $1",
            self.tables.stores
        );
        self.fetch_one_opt(sqlx::query(&query).bind(subdomain), rows::store)
            .await
    }

    async fn list_stores(&self, tenant: &TenantId) -> Result<Vec<Store>, StoreError> {
        let query = format!(
            "SELECT {STORE_COLUMNS} FROM {} WHERE tenant_id = $1 \
             ORDER BY created_at DESC, id DESC",
            self.tables.stores
        );
        self.fetch_many(sqlx::query(&query).bind(tenant.as_str()), rows::store)
            .await
    }

    async fn count_stores(&self, tenant: &TenantId) -> Result<u64, StoreError> {
        let query = format!(
            "SELECT COUNT(*) FROM {} WHERE tenant_id = $1",
            self.tables.stores
        );
        self.count(sqlx::query_scalar(&query).bind(tenant.as_str()))
            .await
    }

    async fn insert_product(&self, product: &Product) -> Result<(), StoreError> {
        let query = format!(
            "INSERT INTO {} ({PRODUCT_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
            self.tables.products
        );
        sqlx::query(&query)
            .bind(product.id.as_str())
            .bind(product.store_id.as_str())
            .bind(&product.title)
            .bind(&product.slug)
            .bind(product.description.as_deref())
            .bind(product.price_cents)
            .bind(&product.currency)
            .bind(rows::to_json(&product.media)?)
            .bind(product.status.as_str())
            .bind(product.created_at)
            .bind(product.updated_at)
            .execute(&self.pool)
            .await
            .map_err(|e| write_error(e, "product slug"))?;
        Ok(())
    }

    async fn update_product(&self, product: &Product) -> Result<(), StoreError> {
        let query = format!(
            "UPDATE {} SET title = $1, slug = $2, description = $3, price_cents = $4, \
             currency = $5, media = $6, status = $7, updated_at = $8 WHERE id = $9",
            self.tables.products
        );
        let result = sqlx::query(&query)
            .bind(&product.title)
            .bind(&product.slug)
            .bind(product.description.as_deref())
            .bind(product.price_cents)
            .bind(&product.currency)
            .bind(rows::to_json(&product.media)?)
            .bind(product.status.as_str())
            .bind(product.updated_at)
            .bind(product.id.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| write_error(e, "product slug"))?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("product {}", product.id)));
        }
        Ok(())
    }

    async fn get_product(&self, id: &ProductId) -> Result<Option<Product>, StoreError> {
        let query = format!(
            "SELECT {PRODUCT_COLUMNS} FROM {} WHERE id = $1",
            self.tables.products
        );
        self.fetch_one_opt(sqlx::query(&query).bind(id.as_str()), rows::product)
            .await
    }

    async fn find_product_by_slug(
        &self,
        store: &StoreId,
        slug: &str,
    ) -> Result<Option<Product>, StoreError> {
        let query = format!(
            "SELECT {PRODUCT_COLUMNS} FROM {} WHERE store_id = $1 AND slug = $2",
            self.tables.products
        );
        self.fetch_one_opt(
            sqlx::query(&query).bind(store.as_str()).bind(slug),
            rows::product,
        )
        .await
    }

    async fn list_products(
        &self,
        tenant: &TenantId,
        store: Option<&StoreId>,
    ) -> Result<Vec<Product>, StoreError> {
        let query = format!(
            "SELECT p.* FROM {products} p JOIN {stores} s ON s.id = p.store_id \
             WHERE s.tenant_id = $1 AND ($2::text IS NULL OR p.store_id = $2) \
             ORDER BY p.created_at DESC, p.id DESC",
            products = self.tables.products,
            stores = self.tables.stores
        );
        self.fetch_many(
            sqlx::query(&query)
                .bind(tenant.as_str())
                .bind(store.map(StoreId::as_str)),
            rows::product,
        )
        .await
    }

    async fn list_published_products(&self, store: &StoreId) -> Result<Vec<Product>, StoreError> {
        let query = format!(
            "SELECT {PRODUCT_COLUMNS} FROM {} WHERE store_id = $1 AND status = 'PUBLISHED' \
             ORDER BY created_at DESC, id DESC",
            self.tables.products
        );
        self.fetch_many(sqlx::query(&query).bind(store.as_str()), rows::product)
            .await
    }

    async fn count_products_in_store(&self, store: &StoreId) -> Result<u64, StoreError> {
        let query = format!(
            "SELECT COUNT(*) FROM {} WHERE store_id = $1",
            self.tables.products
        );
        self.count(sqlx::query_scalar(&query).bind(store.as_str()))
            .await
    }

    async fn count_products_for_tenant(&self, tenant: &TenantId) -> Result<u64, StoreError> {
        let query = format!(
            "SELECT COUNT(*) FROM {products} p JOIN {stores} s ON s.id = p.store_id \
             WHERE s.tenant_id = $1",
            products = self.tables.products,
            stores = self.tables.stores
        );
        self.count(sqlx::query_scalar(&query).bind(tenant.as_str()))
            .await
    }

    async fn insert_page(&self, page: &Page) -> Result<(), StoreError> {
        let query = format!(
            "INSERT INTO {} ({PAGE_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
            self.tables.pages
        );
        sqlx::query(&query)
            .bind(page.id.as_str())
            .bind(page.store_id.as_str())
            .bind(&page.title)
            .bind(&page.slug)
            .bind(rows::to_json(&page.content)?)
            .bind(page.status.as_str())
            .bind(page.created_at)
            .bind(page.updated_at)
            .execute(&self.pool)
            .await
            .map_err(|e| write_error(e, "page slug"))?;
        Ok(())
    }

    async fn update_page(&self, page: &Page) -> Result<(), StoreError> {
        let query = format!(
            "UPDATE {} SET title = $1, slug = $2, content = $3, status = $4, updated_at = $5 \
             WHERE id = $6",
            self.tables.pages
        );
        let result = sqlx::query(&query)
            .bind(&page.title)
            .bind(&page.slug)
            .bind(rows::to_json(&page.content)?)
            .bind(page.status.as_str())
            .bind(page.updated_at)
            .bind(page.id.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| write_error(e, "page slug"))?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("page {}", page.id)));
        }
        Ok(())
    }

    async fn get_page(&self, id: &PageId) -> Result<Option<Page>, StoreError> {
        let query = format!(
            "SELECT {PAGE_COLUMNS} FROM {} WHERE id = $1",
            self.tables.pages
        );
        self.fetch_one_opt(sqlx::query(&query).bind(id.as_str()), rows::page)
            .await
    }

    async fn find_page_by_slug(
        &self,
        store: &StoreId,
        slug: &str,
    ) -> Result<Option<Page>, StoreError> {
        let query = format!(
            "SELECT {PAGE_COLUMNS} FROM {} WHERE store_id = $1 AND slug = $2",
            self.tables.pages
        );
        self.fetch_one_opt(
            sqlx::query(&query).bind(store.as_str()).bind(slug),
            rows::page,
        )
        .await
    }

    async fn list_pages(
        &self,
        tenant: &TenantId,
        store: Option<&StoreId>,
    ) -> Result<Vec<Page>, StoreError> {
        let query = format!(
            "SELECT pg.* FROM {pages} pg JOIN {stores} s ON s.id = pg.store_id \
             WHERE s.tenant_id = $1 AND ($2::text IS NULL OR pg.store_id = $2) \
             ORDER BY pg.created_at DESC, pg.id DESC",
            pages = self.tables.pages,
            stores = self.tables.stores
        );
        self.fetch_many(
            sqlx::query(&query)
                .bind(tenant.as_str())
                .bind(store.map(StoreId::as_str)),
            rows::page,
        )
        .await
    }

    async fn search_stores(&self, query: &ExploreQuery) -> Result<Vec<Store>, StoreError> {
        let order = Self::explore_order(query.sort, "name", "s");
        let sql = format!(
            "SELECT s.* FROM {stores} s \
             WHERE s.status = 'PUBLISHED' \
               AND ($1::text IS NULL \
                    OR strpos(lower(s.name), lower($1)) > 0 \
                    OR strpos(lower(s.slug), lower($1)) > 0) \
               AND (cardinality($2::text[]) = 0 OR EXISTS ( \
                    SELECT 1 FROM {links} l JOIN {tags} t ON t.id = l.tag_id \
                    WHERE l.store_id = s.id AND t.slug = ANY($2))) \
             ORDER BY {order} LIMIT $3 OFFSET $4",
            stores = self.tables.stores,
            links = self.tables.store_tags,
            tags = self.tables.tags
        );
        debug!(sort = ?query.sort, "searching stores");
        self.fetch_many(
            sqlx::query(&sql)
                .bind(query.q.as_deref())
                .bind(query.tags.as_slice())
                .bind(i64::from(query.limit))
                .bind(i64::from(query.offset)),
            rows::store,
        )
        .await
    }

    async fn search_products(&self, query: &ExploreQuery) -> Result<Vec<Product>, StoreError> {
        let order = Self::explore_order(query.sort, "title", "p");
        let sql = format!(
            "SELECT p.* FROM {products} p JOIN {stores} s ON s.id = p.store_id \
             WHERE p.status = 'PUBLISHED' AND s.status = 'PUBLISHED' \
               AND ($1::text IS NULL \
                    OR strpos(lower(p.title), lower($1)) > 0 \
                    OR strpos(lower(p.slug), lower($1)) > 0 \
                    OR strpos(lower(coalesce(p.description, '')), lower($1)) > 0) \
               AND (cardinality($2::text[]) = 0 OR EXISTS ( \
                    SELECT 1 FROM {links} l JOIN {tags} t ON t.id = l.tag_id \
                    WHERE l.product_id = p.id AND t.slug = ANY($2))) \
             ORDER BY {order} LIMIT $3 OFFSET $4",
            products = self.tables.products,
            stores = self.tables.stores,
            links = self.tables.product_tags,
            tags = self.tables.tags
        );
        debug!(sort = ?query.sort, "searching products");
        self.fetch_many(
            sqlx::query(&sql)
                .bind(query.q.as_deref())
                .bind(query.tags.as_slice())
                .bind(i64::from(query.limit))
                .bind(i64::from(query.offset)),
            rows::product,
        )
        .await
    }
}

#[async_trait]
impl TagStore for PostgresRepository {
    async fn insert_tag(&self, tag: &Tag) -> Result<(), StoreError> {
        let query = format!(
            "INSERT INTO {} ({TAG_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6)",
            self.tables.tags
        );
        sqlx::query(&query)
            .bind(tag.id.as_str())
            .bind(&tag.slug)
            .bind(&tag.name)
            .bind(i16::from(tag.tier))
            .bind(rows::to_json(&tag.flags)?)
            .bind(tag.created_at)
            .execute(&self.pool)
            .await
            .map_err(|e| write_error(e, "tag slug"))?;
        Ok(())
    }

    async fn get_tag(&self, id: &TagId) -> Result<Option<Tag>, StoreError> {
        let query = format!("SELECT {TAG_COLUMNS} FROM {} WHERE id = $1", self.tables.tags);
        self.fetch_one_opt(sqlx::query(&query).bind(id.as_str()), rows::tag)
            .await
    }

    async fn find_tag_by_slug(&self, slug: &str) -> Result<Option<Tag>, StoreError> {
        let query = format!(
            "SELECT {TAG_COLUMNS} FROM {} WHERE slug = $1",
            self.tables.tags
        );
        self.fetch_one_opt(sqlx::query(&query).bind(slug), rows::tag)
            .await
    }

    async fn list_tags(&self) -> Result<Vec<Tag>, StoreError> {
        let query = format!(
            "SELECT {TAG_COLUMNS} FROM {} ORDER BY tier ASC, name ASC",
            self.tables.tags
        );
        self.fetch_many(sqlx::query(&query), rows::tag).await
    }

    async fn link_store_tag(&self, store: &StoreId, tag: &TagId) -> Result<bool, StoreError> {
        let query = format!(
            "INSERT INTO {} (store_id, tag_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
            self.tables.store_tags
        );
        let result = sqlx::query(&query)
            .bind(store.as_str())
            .bind(tag.as_str())
            .execute(&self.pool)
            .await
            .map_err(backend)?;
        Ok(result.rows_affected() > 0)
    }

    async fn unlink_store_tag(&self, store: &StoreId, tag: &TagId) -> Result<bool, StoreError> {
        let query = format!(
            "DELETE FROM {} WHERE store_id = $1 AND tag_id = $2",
            self.tables.store_tags
        );
        let result = sqlx::query(&query)
            .bind(store.as_str())
            .bind(tag.as_str())
            .execute(&self.pool)
            .await
            .map_err(backend)?;
        Ok(result.rows_affected() > 0)
    }

    async fn link_product_tag(
        &self,
        product: &ProductId,
        tag: &TagId,
    ) -> Result<bool, StoreError> {
        let query = format!(
            "INSERT INTO {} (product_id, tag_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
            self.tables.product_tags
        );
        let result = sqlx::query(&query)
            .bind(product.as_str())
            .bind(tag.as_str())
            .execute(&self.pool)
            .await
            .map_err(backend)?;
        Ok(result.rows_affected() > 0)
    }

    async fn unlink_product_tag(
        &self,
        product: &ProductId,
        tag: &TagId,
    ) -> Result<bool, StoreError> {
        let query = format!(
            "DELETE FROM {} WHERE product_id = $1 AND tag_id = $2",
            self.tables.product_tags
        );
        let result = sqlx::query(&query)
            .bind(product.as_str())
            .bind(tag.as_str())
            .execute(&self.pool)
            .await
            .map_err(backend)?;
        Ok(result.rows_affected() > 0)
    }

    async fn tags_for_store(&self, store: &StoreId) -> Result<Vec<Tag>, StoreError> {
        let query = format!(
            "SELECT t.* FROM {tags} t JOIN {links} l ON l.tag_id = t.id \
             WHERE l.store_id = $1 ORDER BY t.tier ASC, t.name ASC",
            tags = self.tables.tags,
            links = self.tables.store_tags
        );
        self.fetch_many(sqlx::query(&query).bind(store.as_str()), rows::tag)
            .await
    }

    async fn tags_for_product(&self, product: &ProductId) -> Result<Vec<Tag>, StoreError> {
        let query = format!(
            "SELECT t.* FROM {tags} t JOIN {links} l ON l.tag_id = t.id \
             WHERE l.product_id = $1 ORDER BY t.tier ASC, t.name ASC",
            tags = self.tables.tags,
            links = self.tables.product_tags
        );
        self.fetch_many(sqlx::query(&query).bind(product.as_str()), rows::tag)
            .await
    }

    async fn published_stores_with_tag(&self, tag: &TagId) -> Result<Vec<Store>, StoreError> {
        let query = format!(
            "SELECT s.* FROM {stores} s JOIN {links} l ON l.store_id = s.id \
             WHERE l.tag_id = $1 AND s.status = 'PUBLISHED' \
             ORDER BY s.created_at DESC, s.id DESC",
            stores = self.tables.stores,
            links = self.tables.store_tags
        );
        self.fetch_many(sqlx::query(&query).bind(tag.as_str()), rows::store)
            .await
    }

    async fn published_products_with_tag(
        &self,
        tag: &TagId,
    ) -> Result<Vec<Product>, StoreError> {
        let query = format!(
            "SELECT p.* FROM {products} p \
             JOIN {links} l ON l.product_id = p.id \
             JOIN {stores} s ON s.id = p.store_id \
             WHERE l.tag_id = $1 AND p.status = 'PUBLISHED' AND s.status = 'PUBLISHED' \
             ORDER BY p.created_at DESC, p.id DESC",
            products = self.tables.products,
            links = self.tables.product_tags,
            stores = self.tables.stores
        );
        self.fetch_many(sqlx::query(&query).bind(tag.as_str()), rows::product)
            .await
    }
}

impl PostgresRepository {
    /// `FROM` clause joining events to their owning store as `s`.
    fn events_with_store(&self) -> String {
        format!(
            "{events} e \
             LEFT JOIN {products} p ON p.id = e.product_id \
             LEFT JOIN {pages} pg ON pg.id = e.page_id \
             JOIN {stores} s ON s.id = {EVENT_STORE}",
            events = self.tables.events,
            products = self.tables.products,
            pages = self.tables.pages,
            stores = self.tables.stores
        )
    }

    async fn write_event(
        &self,
        event: &AnalyticsEvent,
        on_conflict: &str,
    ) -> Result<bool, StoreError> {
        let query = format!(
            "INSERT INTO {} (id, type, store_id, product_id, page_id, viewer_hash, \
             idempotency_key, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) {on_conflict}",
            self.tables.events
        );
        let result = sqlx::query(&query)
            .bind(event.id.as_str())
            .bind(event.event_type.as_str())
            .bind(event.store_id.as_ref().map(StoreId::as_str))
            .bind(event.product_id.as_ref().map(ProductId::as_str))
            .bind(event.page_id.as_ref().map(PageId::as_str))
            .bind(event.viewer_hash.as_deref())
            .bind(event.idempotency_key.as_deref())
            .bind(event.created_at)
            .execute(&self.pool)
            .await
            .map_err(|e| write_error(e, "idempotency key"))?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl AnalyticsStore for PostgresRepository {
    async fn insert_event(&self, event: &AnalyticsEvent) -> Result<(), StoreError> {
        self.write_event(event, "").await.map(|_| ())
    }

    async fn upsert_event_by_key(&self, event: &AnalyticsEvent) -> Result<bool, StoreError> {
        if event.idempotency_key.is_none() {
            return Err(StoreError::Backend(
                "upsert requires an idempotency key".to_owned(),
            ));
        }
        self.write_event(event, "ON CONFLICT (idempotency_key) DO NOTHING")
            .await
    }

    async fn count_views(
        &self,
        tenant: &TenantId,
        since: Option<DateTime<Utc>>,
    ) -> Result<ViewTotals, StoreError> {
        let query = format!(
            "SELECT e.type, COUNT(*) FROM {} \
             WHERE s.tenant_id = $1 AND ($2::timestamptz IS NULL OR e.created_at >= $2) \
             GROUP BY e.type",
            self.events_with_store()
        );
        self.totals(sqlx::query_as(&query).bind(tenant.as_str()).bind(since))
            .await
    }

    async fn view_timestamps(
        &self,
        tenant: &TenantId,
        since: DateTime<Utc>,
    ) -> Result<Vec<(ViewEventType, DateTime<Utc>)>, StoreError> {
        let query = format!(
            "SELECT e.type, e.created_at FROM {} \
             WHERE s.tenant_id = $1 AND e.created_at >= $2",
            self.events_with_store()
        );
        self.fetch_many(
            sqlx::query(&query).bind(tenant.as_str()).bind(since),
            rows::view_stamp,
        )
        .await
    }

    async fn count_store_views(
        &self,
        store: &StoreId,
        since: DateTime<Utc>,
    ) -> Result<ViewTotals, StoreError> {
        let query = format!(
            "SELECT e.type, COUNT(*) FROM {} \
             WHERE s.id = $1 AND e.created_at >= $2 \
             GROUP BY e.type",
            self.events_with_store()
        );
        self.totals(sqlx::query_as(&query).bind(store.as_str()).bind(since))
            .await
    }

    async fn count_events_with_key(&self, key: &str) -> Result<u64, StoreError> {
        let query = format!(
            "SELECT COUNT(*) FROM {} WHERE idempotency_key = $1",
            self.tables.events
        );
        self.count(sqlx::query_scalar(&query).bind(key)).await
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explore_order_by_sort() {
        assert_eq!(
            PostgresRepository::explore_order(ExploreSort::Price, "title", "p"),
            "p.price_cents ASC, p.id ASC"
        );
        assert_eq!(
            PostgresRepository::explore_order(ExploreSort::Price, "name", "s"),
            "s.created_at DESC, s.id DESC"
        );
        assert_eq!(
            PostgresRepository::explore_order(ExploreSort::Name, "name", "s"),
            "s.name ASC, s.id ASC"
        );
    }
}

#[cfg(all(test, feature = "integration"))]
mod integration_tests {
    use super::*;

    fn test_config() -> PostgresConfig {
        PostgresConfig {
            url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "postgres://localhost:5432/hololith_test".to_string()),
            table_prefix: format!("test_{}_", uuid::Uuid::new_v4().simple()),
            ..PostgresConfig::default()
        }
    }

    #[tokio::test]
    async fn repository_conformance() {
        let repo = PostgresRepository::new(test_config())
            .await
            .expect("pool creation should succeed");
        hololith_store::testing::run_repository_conformance_tests(&repo)
            .await
            .expect("conformance tests should pass");
    }

    #[tokio::test]
    async fn concurrent_upserts_keep_one_row() {
        let repo = Arc::new(
            PostgresRepository::new(test_config())
                .await
                .expect("pool creation should succeed"),
        );
        let target = hololith_core::ViewTarget::Store(StoreId::generate());
        let at = Utc::now();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let repo = Arc::clone(&repo);
            let target = target.clone();
            handles.push(tokio::spawn(async move {
                let event = AnalyticsEvent::for_target(&target, Some("hash".into()), at);
                repo.upsert_event_by_key(&event).await.expect("upsert")
            }));
        }
        let mut inserted = 0;
        for handle in handles {
            if handle.await.expect("join") {
                inserted += 1;
            }
        }
        assert_eq!(inserted, 1);
    }
}
