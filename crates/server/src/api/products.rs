use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;

use hololith_core::{Product, ProductId};
use hololith_engine::{CreateProduct, StoreProduct, StoreProducts, UpdateProduct};

use super::extract::{Json, Query};
use super::AppState;
use super::schemas::{ErrorResponse, StoreFilter};
use super::tenant::TenantContext;
use crate::error::ServerError;

/// `POST /products` -- create a draft product, subject to the plan's product limits.
#[utoipa::path(
    post,
    path = "/products",
    tag = "Products",
    summary = "Create product",
    security(("bearer" = [])),
    params(("X-Tenant-Id" = String, Header, description = "Tenant to act on")),
    request_body(content = CreateProduct),
    responses(
        (status = 201, description = "Product created as DRAFT", body = Product),
        (status = 400, description = "Invalid input or slug taken", body = ErrorResponse),
        (status = 403, description = "Plan limit reached or store of another tenant", body = ErrorResponse),
        (status = 404, description = "Store not found", body = ErrorResponse)
    )
)]
pub async fn create_product(
    State(state): State<AppState>,
    ctx: TenantContext,
    Json(body): Json<CreateProduct>,
) -> Result<impl IntoResponse, ServerError> {
    let product = state.engine.products().create(&ctx.tenant_id, &body).await?;
    Ok((StatusCode::CREATED, Json(product)))
}

/// `GET /products?storeId=` -- the tenant's products, newest first.
#[utoipa::path(
    get,
    path = "/products",
    tag = "Products",
    summary = "List products",
    security(("bearer" = [])),
    params(
        StoreFilter,
        ("X-Tenant-Id" = String, Header, description = "Tenant to act on")
    ),
    responses(
        (status = 200, description = "The tenant's products", body = Vec<Product>)
    )
)]
pub async fn list_products(
    State(state): State<AppState>,
    ctx: TenantContext,
    Query(filter): Query<StoreFilter>,
) -> Result<Json<Vec<Product>>, ServerError> {
    let products = state
        .engine
        .products()
        .list(&ctx.tenant_id, filter.store_id.as_ref())
        .await?;
    Ok(Json(products))
}

/// `GET /products/{id}`
#[utoipa::path(
    get,
    path = "/products/{id}",
    tag = "Products",
    summary = "Get product",
    security(("bearer" = [])),
    params(
        ("id" = String, Path, description = "Product id"),
        ("X-Tenant-Id" = String, Header, description = "Tenant to act on")
    ),
    responses(
        (status = 200, description = "The product", body = Product),
        (status = 403, description = "Product belongs to another tenant", body = ErrorResponse),
        (status = 404, description = "Product not found", body = ErrorResponse)
    )
)]
pub async fn get_product(
    State(state): State<AppState>,
    ctx: TenantContext,
    Path(id): Path<ProductId>,
) -> Result<Json<Product>, ServerError> {
    Ok(Json(state.engine.products().get(&ctx.tenant_id, &id).await?))
}

/// `PATCH /products/{id}` -- partial update.
#[utoipa::path(
    patch,
    path = "/products/{id}",
    tag = "Products",
    summary = "Update product",
    security(("bearer" = [])),
    params(
        ("id" = String, Path, description = "Product id"),
        ("X-Tenant-Id" = String, Header, description = "Tenant to act on")
    ),
    request_body(content = UpdateProduct),
    responses(
        (status = 200, description = "Updated product", body = Product),
        (status = 400, description = "Invalid input or slug taken", body = ErrorResponse),
        (status = 403, description = "Product belongs to another tenant", body = ErrorResponse),
        (status = 404, description = "Product not found", body = ErrorResponse)
    )
)]
pub async fn update_product(
    State(state): State<AppState>,
    ctx: TenantContext,
    Path(id): Path<ProductId>,
    Json(body): Json<UpdateProduct>,
) -> Result<Json<Product>, ServerError> {
    Ok(Json(state.engine.products().update(&ctx.tenant_id, &id, &body).await?))
}

/// `POST /products/{id}/publish`
#[utoipa::path(
    post,
    path = "/products/{id}/publish",
    tag = "Products",
    summary = "Publish product",
    security(("bearer" = [])),
    params(
        ("id" = String, Path, description = "Product id"),
        ("X-Tenant-Id" = String, Header, description = "Tenant to act on")
    ),
    responses(
        (status = 201, description = "Published product", body = Product),
        (status = 404, description = "Product not found", body = ErrorResponse)
    )
)]
pub async fn publish_product(
    State(state): State<AppState>,
    ctx: TenantContext,
    Path(id): Path<ProductId>,
) -> Result<impl IntoResponse, ServerError> {
    let product = state.engine.products().publish(&ctx.tenant_id, &id).await?;
    Ok((StatusCode::CREATED, Json(product)))
}

/// `POST /products/{id}/unpublish`
#[utoipa::path(
    post,
    path = "/products/{id}/unpublish",
    tag = "Products",
    summary = "Unpublish product",
    security(("bearer" = [])),
    params(
        ("id" = String, Path, description = "Product id"),
        ("X-Tenant-Id" = String, Header, description = "Tenant to act on")
    ),
    responses(
        (status = 201, description = "Product moved back to DRAFT", body = Product),
        (status = 404, description = "Product not found", body = ErrorResponse)
    )
)]
pub async fn unpublish_product(
    State(state): State<AppState>,
    ctx: TenantContext,
    Path(id): Path<ProductId>,
) -> Result<impl IntoResponse, ServerError> {
    let product = state.engine.products().unpublish(&ctx.tenant_id, &id).await?;
    Ok((StatusCode::CREATED, Json(product)))
}

/// `GET /public/stores/{slug}/products` -- published products of a published store.
#[utoipa::path(
    get,
    path = "/public/stores/{slug}/products",
    tag = "Public",
    summary = "Public product list",
    params(("slug" = String, Path, description = "Store slug")),
    responses(
        (status = 200, description = "The store and its published products", body = StoreProducts),
        (status = 404, description = "Store not found", body = ErrorResponse)
    )
)]
pub async fn public_products(
    State(state): State<AppState>,
    Path(store_slug): Path<String>,
) -> Result<Json<StoreProducts>, ServerError> {
    Ok(Json(state.engine.products().public_list(&store_slug).await?))
}

/// `GET /public/stores/{slug}/p/{productSlug}`
#[utoipa::path(
    get,
    path = "/public/stores/{slug}/p/{productSlug}",
    tag = "Public",
    summary = "Public product",
    params(
        ("slug" = String, Path, description = "Store slug"),
        ("productSlug" = String, Path, description = "Product slug")
    ),
    responses(
        (status = 200, description = "The published product", body = StoreProduct),
        (status = 404, description = "Store or product not found", body = ErrorResponse)
    )
)]
pub async fn public_product(
    State(state): State<AppState>,
    Path((store_slug, product_slug)): Path<(String, String)>,
) -> Result<Json<StoreProduct>, ServerError> {
    Ok(Json(
        state
            .engine
            .products()
            .public_get(&store_slug, &product_slug)
            .await?,
    ))
}
