//! Row decoding for the `PostgreSQL` backend.

use chrono::{DateTime, Utc};
use sqlx::Row;
use sqlx::postgres::{PgRow, Postgres};

use hololith_core::{
    MemberRole, Membership, MembershipId, Page, PageContent, PageId,
    Plan, PlanId, Product, ProductId, PublishStatus, Quotas, Store, StoreId, Subscription,
    SubscriptionId, SubscriptionStatus, Tag, TagId, Tenant, TenantId, User, UserId,
    ViewEventType,
};
use hololith_store::StoreError;

/// Column selection shared by every query that decodes a [`Store`].
pub(crate) const STORE_COLUMNS: &str =
    "id, tenant_id, name, slug, subdomain, custom_domain, status, created_at, updated_at";
pub(crate) const PRODUCT_COLUMNS: &str = "id, store_id, title, slug, description, price_cents, \
     currency, media, status, created_at, updated_at";
pub(crate) const PAGE_COLUMNS: &str =
    "id, store_id, title, slug, content, status, created_at, updated_at";
pub(crate) const PLAN_COLUMNS: &str = "id, code, name, max_stores, max_products_per_store, \
     max_products_total, max_tag_tier, features, created_at, updated_at";
pub(crate) const TAG_COLUMNS: &str = "id, slug, name, tier, flags, created_at";

pub(crate) fn backend(e: sqlx::Error) -> StoreError {
    StoreError::Backend(e.to_string())
}

pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    if let sqlx::Error::Database(db_err) = err {
        return db_err.code().is_some_and(|code| code == "23505");
    }
    false
}

/// Map a write failure, turning unique-constraint violations into conflicts.
pub(crate) fn write_error(e: sqlx::Error, what: &str) -> StoreError {
    if is_unique_violation(&e) {
        StoreError::Conflict(format!("{what} already in use"))
    } else {
        backend(e)
    }
}

fn get<'r, T>(row: &'r PgRow, column: &str) -> Result<T, StoreError>
where
    T: sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres>,
{
    row.try_get(column).map_err(backend)
}

fn json(row: &PgRow, column: &str) -> Result<serde_json::Value, StoreError> {
    let raw: String = get(row, column)?;
    serde_json::from_str(&raw).map_err(|e| StoreError::Serialization(e.to_string()))
}

fn count(row: &PgRow, column: &str) -> Result<u32, StoreError> {
    let raw: i64 = get(row, column)?;
    u32::try_from(raw).map_err(|e| StoreError::Serialization(format!("{column}: {e}")))
}

fn small(row: &PgRow, column: &str) -> Result<u8, StoreError> {
    let raw: i16 = get(row, column)?;
    u8::try_from(raw).map_err(|e| StoreError::Serialization(format!("{column}: {e}")))
}

fn publish_status(row: &PgRow) -> Result<PublishStatus, StoreError> {
    let raw: String = get(row, "status")?;
    PublishStatus::parse(&raw)
        .ok_or_else(|| StoreError::Serialization(format!("unknown status {raw}")))
}

pub(crate) fn to_json(value: &impl serde::Serialize) -> Result<String, StoreError> {
    serde_json::to_string(value).map_err(|e| StoreError::Serialization(e.to_string()))
}

pub(crate) fn plan(row: &PgRow) -> Result<Plan, StoreError> {
    let max_products_total: Option<i64> = get(row, "max_products_total")?;
    Ok(Plan {
        id: PlanId::new(get::<String>(row, "id")?),
        code: get(row, "code")?,
        name: get(row, "name")?,
        quotas: Quotas {
            max_stores: count(row, "max_stores")?,
            max_products_per_store: count(row, "max_products_per_store")?,
            max_products_total: max_products_total
                .map(u32::try_from)
                .transpose()
                .map_err(|e| StoreError::Serialization(e.to_string()))?,
            max_tag_tier: small(row, "max_tag_tier")?,
        },
        features: json(row, "features")?,
        created_at: get(row, "created_at")?,
        updated_at: get(row, "updated_at")?,
    })
}

pub(crate) fn subscription(row: &PgRow) -> Result<Subscription, StoreError> {
    let status: String = get(row, "status")?;
    Ok(Subscription {
        id: SubscriptionId::new(get::<String>(row, "id")?),
        tenant_id: TenantId::new(get::<String>(row, "tenant_id")?),
        plan_id: PlanId::new(get::<String>(row, "plan_id")?),
        status: SubscriptionStatus::parse(&status)
            .ok_or_else(|| StoreError::Serialization(format!("unknown status {status}")))?,
        created_at: get(row, "created_at")?,
        updated_at: get(row, "updated_at")?,
    })
}

pub(crate) fn user(row: &PgRow) -> Result<User, StoreError> {
    Ok(User {
        id: UserId::new(get::<String>(row, "id")?),
        email: get(row, "email")?,
        password_hash: get(row, "password_hash")?,
        refresh_token_hash: get(row, "refresh_token_hash")?,
        created_at: get(row, "created_at")?,
    })
}

/// Decode a joined membership/tenant row (columns prefixed `m_` and `t_`).
pub(crate) fn membership_with_tenant(row: &PgRow) -> Result<(Membership, Tenant), StoreError> {
    let tenant = Tenant {
        id: TenantId::new(get::<String>(row, "t_id")?),
        name: get(row, "t_name")?,
        owner_id: UserId::new(get::<String>(row, "t_owner_id")?),
        created_at: get(row, "t_created_at")?,
    };
    Ok((membership_prefixed(row, "m_")?, tenant))
}

pub(crate) fn membership(row: &PgRow) -> Result<Membership, StoreError> {
    membership_prefixed(row, "")
}

fn membership_prefixed(row: &PgRow, prefix: &str) -> Result<Membership, StoreError> {
    let col = |name: &str| format!("{prefix}{name}");
    let role: String = get(row, &col("role"))?;
    Ok(Membership {
        id: MembershipId::new(get::<String>(row, &col("id"))?),
        tenant_id: TenantId::new(get::<String>(row, &col("tenant_id"))?),
        user_id: UserId::new(get::<String>(row, &col("user_id"))?),
        role: MemberRole::from_str_loose(&role)
            .ok_or_else(|| StoreError::Serialization(format!("unknown role {role}")))?,
        created_at: get(row, &col("created_at"))?,
    })
}

pub(crate) fn tenant(row: &PgRow) -> Result<Tenant, StoreError> {
    Ok(Tenant {
        id: TenantId::new(get::<String>(row, "id")?),
        name: get(row, "name")?,
        owner_id: UserId::new(get::<String>(row, "owner_id")?),
        created_at: get(row, "created_at")?,
    })
}

pub(crate) fn store(row: &PgRow) -> Result<Store, StoreError> {
    Ok(Store {
        id: StoreId::new(get::<String>(row, "id")?),
        tenant_id: TenantId::new(get::<String>(row, "tenant_id")?),
        name: get(row, "name")?,
        slug: get(row, "slug")?,
        subdomain: get(row, "subdomain")?,
        custom_domain: get(row, "custom_domain")?,
        status: publish_status(row)?,
        created_at: get(row, "created_at")?,
        updated_at: get(row, "updated_at")?,
    })
}

pub(crate) fn product(row: &PgRow) -> Result<Product, StoreError> {
    Ok(Product {
        id: ProductId::new(get::<String>(row, "id")?),
        store_id: StoreId::new(get::<String>(row, "store_id")?),
        title: get(row, "title")?,
        slug: get(row, "slug")?,
        description: get(row, "description")?,
        price_cents: get(row, "price_cents")?,
        currency: get(row, "currency")?,
        media: json(row, "media")?,
        status: publish_status(row)?,
        created_at: get(row, "created_at")?,
        updated_at: get(row, "updated_at")?,
    })
}

pub(crate) fn page(row: &PgRow) -> Result<Page, StoreError> {
    let raw: String = get(row, "content")?;
    let content: PageContent =
        serde_json::from_str(&raw).map_err(|e| StoreError::Serialization(e.to_string()))?;
    Ok(Page {
        id: PageId::new(get::<String>(row, "id")?),
        store_id: StoreId::new(get::<String>(row, "store_id")?),
        title: get(row, "title")?,
        slug: get(row, "slug")?,
        content,
        status: publish_status(row)?,
        created_at: get(row, "created_at")?,
        updated_at: get(row, "updated_at")?,
    })
}

pub(crate) fn tag(row: &PgRow) -> Result<Tag, StoreError> {
    Ok(Tag {
        id: TagId::new(get::<String>(row, "id")?),
        slug: get(row, "slug")?,
        name: get(row, "name")?,
        tier: small(row, "tier")?,
        flags: json(row, "flags")?,
        created_at: get(row, "created_at")?,
    })
}

pub(crate) fn event_type(raw: &str) -> Result<ViewEventType, StoreError> {
    ViewEventType::parse(raw)
        .ok_or_else(|| StoreError::Serialization(format!("unknown event type {raw}")))
}

/// Decode a `(type, created_at)` pair.
pub(crate) fn view_stamp(row: &PgRow) -> Result<(ViewEventType, DateTime<Utc>), StoreError> {
    let raw: String = get(row, "type")?;
    Ok((event_type(&raw)?, get(row, "created_at")?))
}
