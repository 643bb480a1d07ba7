pub mod analytics;
pub mod auth;
pub mod billing;
pub mod explore;
pub mod extract;
pub mod health;
pub mod openapi;
pub mod pages;
pub mod products;
pub mod schemas;
pub mod stores;
pub mod tags;
pub mod tenant;
pub mod tenants;

use std::sync::Arc;

use axum::Router;
use axum::http::{HeaderName, HeaderValue};
use axum::routing::{delete, get, post};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use hololith_engine::Engine;

use crate::auth::AuthProvider;
use crate::auth::middleware::AuthLayer;
use crate::config::{HololithConfig, ServerConfig};
use crate::ratelimit::{RateLimitLayer, RateLimiter};

use self::openapi::ApiDoc;

const REQUEST_ID_HEADER: &str = "x-request-id";

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub engine: Engine,
    pub auth: Arc<AuthProvider>,
    /// `None` when rate limiting is disabled.
    pub rate_limiter: Option<Arc<RateLimiter>>,
    pub server: Arc<ServerConfig>,
}

impl AppState {
    /// Wire auth and rate limiting around an engine according to `config`.
    pub fn new(engine: Engine, config: &HololithConfig) -> Self {
        let auth = AuthProvider::new(
            &config.auth,
            Arc::clone(engine.repository()),
            Arc::clone(engine.clock()),
        );
        let rate_limiter = config
            .rate_limit
            .enabled
            .then(|| Arc::new(RateLimiter::new(config.rate_limit.clone())));
        Self {
            engine,
            auth: Arc::new(auth),
            rate_limiter,
            server: Arc::new(config.server.clone()),
        }
    }
}

fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/refresh", post(auth::refresh))
        .route("/plans", get(billing::list_plans))
        .route("/tags", get(tags::list_tags))
        .route("/tags/{slug}", get(tags::tag_landing))
        .route("/explore", get(explore::explore))
        .route("/public/stores/{slug}", get(stores::public_store))
        .route(
            "/public/stores/{slug}/products",
            get(products::public_products),
        )
        .route(
            "/public/stores/{slug}/p/{productSlug}",
            get(products::public_product),
        )
        .route(
            "/public/stores/{slug}/pages/{pageSlug}",
            get(pages::public_page),
        )
        .route("/analytics/view", post(analytics::track_view))
        .route("/analytics/batch", post(analytics::track_batch))
}

fn protected_routes(provider: Arc<AuthProvider>) -> Router<AppState> {
    Router::new()
        .route("/auth/logout", post(auth::logout))
        .route("/auth/me", get(auth::me))
        // Tenants
        .route("/tenants", post(tenants::create_tenant))
        .route("/tenants/mine", get(tenants::my_tenants))
        // Stores
        .route("/stores", get(stores::list_stores).post(stores::create_store))
        .route(
            "/stores/{id}",
            get(stores::get_store).patch(stores::update_store),
        )
        .route("/stores/{id}/publish", post(stores::publish_store))
        .route("/stores/{id}/unpublish", post(stores::unpublish_store))
        .route(
            "/stores/{id}/tags",
            get(tags::store_tags).post(tags::assign_store_tag),
        )
        .route(
            "/stores/{id}/tags/{tagId}",
            delete(tags::unassign_store_tag),
        )
        // Products
        .route(
            "/products",
            get(products::list_products).post(products::create_product),
        )
        .route(
            "/products/{id}",
            get(products::get_product).patch(products::update_product),
        )
        .route("/products/{id}/publish", post(products::publish_product))
        .route(
            "/products/{id}/unpublish",
            post(products::unpublish_product),
        )
        .route(
            "/products/{id}/tags",
            get(tags::product_tags).post(tags::assign_product_tag),
        )
        .route(
            "/products/{id}/tags/{tagId}",
            delete(tags::unassign_product_tag),
        )
        // Pages
        .route("/pages", get(pages::list_pages).post(pages::create_page))
        .route("/pages/{id}", get(pages::get_page).patch(pages::update_page))
        .route("/pages/{id}/publish", post(pages::publish_page))
        .route("/pages/{id}/unpublish", post(pages::unpublish_page))
        // Tag administration
        .route("/admin/tags", post(tags::create_tag))
        // Billing
        .route("/billing/plan", get(billing::current_plan))
        .route("/billing/upgrade", post(billing::upgrade))
        // Dashboard analytics
        .route("/dashboard/analytics/overview", get(analytics::overview))
        .route(
            "/dashboard/analytics/last7days",
            get(analytics::last_7_days),
        )
        .route("/dashboard/analytics/store", get(analytics::store_stats))
        .layer(AuthLayer::new(provider))
}

fn cors_layer(server: &ServerConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = server
        .cors_origins()
        .into_iter()
        .filter_map(|origin| match HeaderValue::from_str(&origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    if origins.is_empty() {
        CorsLayer::permissive()
    } else {
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods(Any)
            .allow_headers(Any)
    }
}

/// Build the Axum router with all API routes, middleware, and Swagger UI.
pub fn router(state: AppState) -> Router {
    let api = public_routes().merge(protected_routes(Arc::clone(&state.auth)));
    let api = match state.server.api_prefix.trim_end_matches('/') {
        "" => api,
        prefix => Router::new().nest(prefix, api),
    };

    let request_id = HeaderName::from_static(REQUEST_ID_HEADER);
    let cors = cors_layer(&state.server);
    let rate_limit = RateLimitLayer::new(state.rate_limiter.clone());

    Router::new()
        .route("/health/live", get(health::live))
        .route("/health/ready", get(health::ready))
        .route("/health/db", get(health::db))
        .merge(api)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .with_state(state)
        .layer(rate_limit)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(PropagateRequestIdLayer::new(request_id.clone()))
        .layer(SetRequestIdLayer::new(request_id, MakeRequestUuid))
}
