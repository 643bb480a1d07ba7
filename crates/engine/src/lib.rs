//! Business services for the Hololith storefront backend.
//!
//! The [`Engine`] bundles the Quota Engine, the View Deduplication Engine, the
//! Tag-Tier Gate and the catalog services over a single [`Repository`]
//! implementation.
//!
//! [`Repository`]: hololith_store::Repository

pub mod analytics;
pub mod builder;
pub mod catalog;
pub mod clock;
pub mod discovery;
pub mod engine;
pub mod error;
pub mod pages;
mod patch;
pub mod quota;
pub mod seed;
pub mod stores;
pub mod tags;
pub mod tenants;

#[cfg(test)]
mod testing;

pub use analytics::{MAX_BATCH_EVENTS, StoreStats, ViewDedupEngine};
pub use builder::EngineBuilder;
pub use catalog::{CreateProduct, ProductService, StoreProduct, StoreProducts, UpdateProduct};
pub use clock::{Clock, ManualClock, SystemClock};
pub use discovery::{DiscoveryService, ExploreResponse, ExploreResults};
pub use engine::Engine;
pub use error::EngineError;
pub use pages::{CreatePage, PageService, StorePage, UpdatePage};
pub use quota::{BillingSummary, QuotaEngine};
pub use seed::SeedReport;
pub use stores::{CreateStore, StoreRef, StoreService, UpdateStore};
pub use tags::{CreateTag, TagLanding, TagService, TagTierGate};
pub use tenants::{CreateTenant, TenantMembership, TenantService, TenantSummary};
