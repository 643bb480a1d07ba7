//! Domain model for the Hololith multi-tenant storefront backend.
//!
//! This crate is free of I/O: it holds the entity types shared by the
//! repository backends, the engine and the HTTP layer, together with the
//! pure rules (quota arithmetic, view idempotency keys, content validation).

pub mod analytics;
pub mod catalog;
pub mod discovery;
pub mod error;
pub mod plan;
pub mod quota;
pub mod tag;
pub mod tenant;
pub mod types;

pub use analytics::{
    AnalyticsEvent, DayBucket, TrackOutcome, ViewEventInput, ViewEventType, ViewTarget,
    ViewTotals, WeekSeries, day_key_utc, hash_viewer, idempotency_key,
};
pub use catalog::{DEFAULT_CURRENCY, Page, PageContent, Product, PublishStatus, Store};
pub use discovery::{ExploreKind, ExploreQuery, ExploreSort};
pub use error::ValidationError;
pub use plan::{
    FREE_PLAN_CODE, Plan, PlanDraft, Quotas, Subscription, SubscriptionStatus, TenantPlan, Usage,
};
pub use quota::QuotaViolation;
pub use tag::{Tag, TagDraft, TagRef};
pub use tenant::{MemberRole, Membership, Tenant, User};
pub use types::{
    EventId, MembershipId, PageId, PlanId, ProductId, StoreId, SubscriptionId, TagId, TenantId,
    UserId,
};
