use sqlx::PgPool;

use crate::config::PostgresConfig;

/// Run database migrations, creating required tables if they do not exist.
///
/// Uniqueness rules the repository relies on (store slug and subdomain, per-store
/// product and page slugs, tag slug, user email, event idempotency key) are
/// enforced by constraints here.
///
/// # Errors
///
/// Returns a [`sqlx::Error`] if any DDL statement fails.
pub async fn run_migrations(pool: &PgPool, config: &PostgresConfig) -> Result<(), sqlx::Error> {
    let t = config.tables();
    let prefix = &config.table_prefix;

    let statements = [
        format!(
            "CREATE TABLE IF NOT EXISTS {plans} (
                id TEXT PRIMARY KEY,
                code TEXT NOT NULL UNIQUE,
                name TEXT NOT NULL,
                max_stores BIGINT NOT NULL,
                max_products_per_store BIGINT NOT NULL,
                max_products_total BIGINT,
                max_tag_tier SMALLINT NOT NULL,
                features TEXT NOT NULL DEFAULT '{{}}',
                created_at TIMESTAMPTZ NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL
            )",
            plans = t.plans
        ),
        format!(
            "CREATE TABLE IF NOT EXISTS {users} (
                id TEXT PRIMARY KEY,
                email TEXT NOT NULL UNIQUE,
                password_hash TEXT NOT NULL,
                refresh_token_hash TEXT,
                created_at TIMESTAMPTZ NOT NULL
            )",
            users = t.users
        ),
        format!(
            "CREATE TABLE IF NOT EXISTS {tenants} (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                owner_id TEXT NOT NULL REFERENCES {users} (id),
                created_at TIMESTAMPTZ NOT NULL
            )",
            tenants = t.tenants,
            users = t.users
        ),
        format!(
            "CREATE TABLE IF NOT EXISTS {memberships} (
                id TEXT PRIMARY KEY,
                tenant_id TEXT NOT NULL REFERENCES {tenants} (id) ON DELETE CASCADE,
                user_id TEXT NOT NULL REFERENCES {users} (id) ON DELETE CASCADE,
                role TEXT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL,
                UNIQUE (tenant_id, user_id)
            )",
            memberships = t.memberships,
            tenants = t.tenants,
            users = t.users
        ),
        format!(
            "CREATE TABLE IF NOT EXISTS {subs} (
                id TEXT PRIMARY KEY,
                tenant_id TEXT NOT NULL UNIQUE,
                plan_id TEXT NOT NULL REFERENCES {plans} (id),
                status TEXT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL
            )",
            subs = t.subscriptions,
            plans = t.plans
        ),
        format!(
            "CREATE TABLE IF NOT EXISTS {stores} (
                id TEXT PRIMARY KEY,
                tenant_id TEXT NOT NULL,
                name TEXT NOT NULL,
                slug TEXT NOT NULL UNIQUE,
                subdomain TEXT NOT NULL UNIQUE,
                custom_domain TEXT,
                status TEXT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL
            )",
            stores = t.stores
        ),
        format!(
            "CREATE TABLE IF NOT EXISTS {products} (
                id TEXT PRIMARY KEY,
                store_id TEXT NOT NULL REFERENCES {stores} (id) ON DELETE CASCADE,
                title TEXT NOT NULL,
                slug TEXT NOT NULL,
                description TEXT,
                price_cents BIGINT NOT NULL,
                currency TEXT NOT NULL,
                media TEXT NOT NULL DEFAULT '[]',
                status TEXT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL,
                UNIQUE (store_id, slug)
            )",
            products = t.products,
            stores = t.stores
        ),
        format!(
            "CREATE TABLE IF NOT EXISTS {pages} (
                id TEXT PRIMARY KEY,
                store_id TEXT NOT NULL REFERENCES {stores} (id) ON DELETE CASCADE,
                title TEXT NOT NULL,
                slug TEXT NOT NULL,
                content TEXT NOT NULL,
                status TEXT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL,
                UNIQUE (store_id, slug)
            )",
            pages = t.pages,
            stores = t.stores
        ),
        format!(
            "CREATE TABLE IF NOT EXISTS {tags} (
                id TEXT PRIMARY KEY,
                slug TEXT NOT NULL UNIQUE,
                name TEXT NOT NULL,
                tier SMALLINT NOT NULL,
                flags TEXT NOT NULL DEFAULT '{{}}',
                created_at TIMESTAMPTZ NOT NULL
            )",
            tags = t.tags
        ),
        format!(
            "CREATE TABLE IF NOT EXISTS {links} (
                store_id TEXT NOT NULL REFERENCES {stores} (id) ON DELETE CASCADE,
                tag_id TEXT NOT NULL REFERENCES {tags} (id) ON DELETE CASCADE,
                PRIMARY KEY (store_id, tag_id)
            )",
            links = t.store_tags,
            stores = t.stores,
            tags = t.tags
        ),
        format!(
            "CREATE TABLE IF NOT EXISTS {links} (
                product_id TEXT NOT NULL REFERENCES {products} (id) ON DELETE CASCADE,
                tag_id TEXT NOT NULL REFERENCES {tags} (id) ON DELETE CASCADE,
                PRIMARY KEY (product_id, tag_id)
            )",
            links = t.product_tags,
            products = t.products,
            tags = t.tags
        ),
        format!(
            "CREATE TABLE IF NOT EXISTS {events} (
                id TEXT PRIMARY KEY,
                type TEXT NOT NULL,
                store_id TEXT,
                product_id TEXT,
                page_id TEXT,
                viewer_hash TEXT,
                idempotency_key TEXT UNIQUE,
                created_at TIMESTAMPTZ NOT NULL
            )",
            events = t.events
        ),
        format!(
            "CREATE INDEX IF NOT EXISTS {prefix}analytics_events_created_idx \
             ON {events} (created_at)",
            events = t.events
        ),
        format!(
            "CREATE INDEX IF NOT EXISTS {prefix}stores_tenant_idx ON {stores} (tenant_id)",
            stores = t.stores
        ),
    ];

    for statement in &statements {
        sqlx::query(statement).execute(pool).await?;
    }

    Ok(())
}
