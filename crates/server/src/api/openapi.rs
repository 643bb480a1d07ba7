#![allow(clippy::needless_for_each)]

use utoipa::Modify;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};

use hololith_core::{
    DayBucket, ExploreKind, ExploreQuery, ExploreSort, MemberRole, Membership, Page, PageContent,
    Plan, Product, PublishStatus, Quotas, Store, Subscription, SubscriptionStatus, Tag, TagRef,
    Tenant, TenantPlan, TrackOutcome, Usage, ViewEventInput, ViewEventType, ViewTotals,
    WeekSeries,
};
use hololith_engine::{
    BillingSummary, CreatePage, CreateProduct, CreateStore, CreateTag, CreateTenant,
    ExploreResponse, ExploreResults, StorePage, StoreProduct, StoreProducts, StoreRef, StoreStats,
    TagLanding, TenantMembership, TenantSummary, UpdatePage, UpdateProduct, UpdateStore,
};

use super::schemas::{
    AssignTagRequest, BatchRequest, BatchResponse, DbHealthResponse, ErrorResponse, LoginRequest,
    MeResponse, OkResponse, OverviewResponse, RefreshRequest, RegisterRequest, StatusResponse,
    UpgradeRequest,
};
use crate::auth::AuthSession;
use crate::auth::identity::UserInfo;

/// Registers the `bearer` JWT scheme referenced by protected paths.
struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(utoipa::OpenApi)]
#[openapi(
    info(
        title = "Hololith API",
        version = "0.1.0",
        description = "Multi-tenant storefront backend: stores, products, pages, tags, discovery, plan quotas and view analytics.",
        license(name = "Apache-2.0")
    ),
    modifiers(&BearerAuth),
    tags(
        (name = "Health", description = "Liveness, readiness and database checks"),
        (name = "Auth", description = "Registration, login and token rotation"),
        (name = "Tenants", description = "Tenant creation and membership"),
        (name = "Stores", description = "Tenant store management"),
        (name = "Products", description = "Tenant product management"),
        (name = "Pages", description = "Tenant content pages"),
        (name = "Tags", description = "Tag catalogue and tier-gated assignment"),
        (name = "Discovery", description = "Public search over published listings"),
        (name = "Public", description = "Published storefront content"),
        (name = "Billing", description = "Plans, subscriptions and usage"),
        (name = "Analytics", description = "View ingestion and dashboard statistics")
    ),
    paths(
        super::health::live,
        super::health::ready,
        super::health::db,
        super::auth::register,
        super::auth::login,
        super::auth::refresh,
        super::auth::logout,
        super::auth::me,
        super::tenants::create_tenant,
        super::tenants::my_tenants,
        super::stores::create_store,
        super::stores::list_stores,
        super::stores::get_store,
        super::stores::update_store,
        super::stores::publish_store,
        super::stores::unpublish_store,
        super::stores::public_store,
        super::products::create_product,
        super::products::list_products,
        super::products::get_product,
        super::products::update_product,
        super::products::publish_product,
        super::products::unpublish_product,
        super::products::public_products,
        super::products::public_product,
        super::pages::create_page,
        super::pages::list_pages,
        super::pages::get_page,
        super::pages::update_page,
        super::pages::publish_page,
        super::pages::unpublish_page,
        super::pages::public_page,
        super::tags::list_tags,
        super::tags::tag_landing,
        super::tags::create_tag,
        super::tags::assign_store_tag,
        super::tags::unassign_store_tag,
        super::tags::store_tags,
        super::tags::assign_product_tag,
        super::tags::unassign_product_tag,
        super::tags::product_tags,
        super::explore::explore,
        super::billing::list_plans,
        super::billing::current_plan,
        super::billing::upgrade,
        super::analytics::track_view,
        super::analytics::track_batch,
        super::analytics::overview,
        super::analytics::last_7_days,
        super::analytics::store_stats,
    ),
    components(schemas(
        ErrorResponse, OkResponse, StatusResponse, DbHealthResponse,
        RegisterRequest, LoginRequest, RefreshRequest, MeResponse, AuthSession, UserInfo,
        CreateTenant, Tenant, TenantMembership, TenantSummary, Membership, MemberRole,
        CreateStore, UpdateStore, Store, StoreRef, PublishStatus,
        CreateProduct, UpdateProduct, Product, StoreProducts, StoreProduct,
        CreatePage, UpdatePage, Page, PageContent, StorePage,
        CreateTag, Tag, TagRef, TagLanding, AssignTagRequest,
        ExploreQuery, ExploreKind, ExploreSort, ExploreResponse, ExploreResults,
        Plan, Quotas, Subscription, SubscriptionStatus, TenantPlan, Usage, BillingSummary,
        UpgradeRequest,
        ViewEventInput, ViewEventType, TrackOutcome, BatchRequest, BatchResponse,
        ViewTotals, OverviewResponse, DayBucket, WeekSeries, StoreStats,
    ))
)]
pub struct ApiDoc;
