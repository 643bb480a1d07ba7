use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;

use hololith_core::{Store, StoreId};
use hololith_engine::{CreateStore, UpdateStore};

use super::extract::Json;
use super::AppState;
use super::schemas::ErrorResponse;
use super::tenant::TenantContext;
use crate::error::ServerError;

/// `POST /stores` -- create a draft store, subject to the plan's `maxStores`.
#[utoipa::path(
    post,
    path = "/stores",
    tag = "Stores",
    summary = "Create store",
    security(("bearer" = [])),
    params(("X-Tenant-Id" = String, Header, description = "Tenant to act on")),
    request_body(content = CreateStore),
    responses(
        (status = 201, description = "Store created as DRAFT", body = Store),
        (status = 400, description = "Invalid input or slug/subdomain taken", body = ErrorResponse),
        (status = 403, description = "Plan limit reached or not a member", body = ErrorResponse)
    )
)]
pub async fn create_store(
    State(state): State<AppState>,
    ctx: TenantContext,
    Json(body): Json<CreateStore>,
) -> Result<impl IntoResponse, ServerError> {
    let store = state.engine.stores().create(&ctx.tenant_id, &body).await?;
    Ok((StatusCode::CREATED, Json(store)))
}

/// `GET /stores` -- the tenant's stores, newest first.
#[utoipa::path(
    get,
    path = "/stores",
    tag = "Stores",
    summary = "List stores",
    security(("bearer" = [])),
    params(("X-Tenant-Id" = String, Header, description = "Tenant to act on")),
    responses(
        (status = 200, description = "The tenant's stores", body = Vec<Store>)
    )
)]
pub async fn list_stores(
    State(state): State<AppState>,
    ctx: TenantContext,
) -> Result<Json<Vec<Store>>, ServerError> {
    Ok(Json(state.engine.stores().list(&ctx.tenant_id).await?))
}

/// `GET /stores/{id}` -- one of the tenant's stores.
#[utoipa::path(
    get,
    path = "/stores/{id}",
    tag = "Stores",
    summary = "Get store",
    security(("bearer" = [])),
    params(
        ("id" = String, Path, description = "Store id"),
        ("X-Tenant-Id" = String, Header, description = "Tenant to act on")
    ),
    responses(
        (status = 200, description = "The store", body = Store),
        (status = 403, description = "Store belongs to another tenant", body = ErrorResponse),
        (status = 404, description = "Store not found", body = ErrorResponse)
    )
)]
pub async fn get_store(
    State(state): State<AppState>,
    ctx: TenantContext,
    Path(id): Path<StoreId>,
) -> Result<Json<Store>, ServerError> {
    Ok(Json(state.engine.stores().get(&ctx.tenant_id, &id).await?))
}

/// `PATCH /stores/{id}` -- partial update.
#[utoipa::path(
    patch,
    path = "/stores/{id}",
    tag = "Stores",
    summary = "Update store",
    security(("bearer" = [])),
    params(
        ("id" = String, Path, description = "Store id"),
        ("X-Tenant-Id" = String, Header, description = "Tenant to act on")
    ),
    request_body(content = UpdateStore),
    responses(
        (status = 200, description = "Updated store", body = Store),
        (status = 400, description = "Invalid input or slug/subdomain taken", body = ErrorResponse),
        (status = 403, description = "Store belongs to another tenant", body = ErrorResponse),
        (status = 404, description = "Store not found", body = ErrorResponse)
    )
)]
pub async fn update_store(
    State(state): State<AppState>,
    ctx: TenantContext,
    Path(id): Path<StoreId>,
    Json(body): Json<UpdateStore>,
) -> Result<Json<Store>, ServerError> {
    Ok(Json(state.engine.stores().update(&ctx.tenant_id, &id, &body).await?))
}

/// `POST /stores/{id}/publish`
#[utoipa::path(
    post,
    path = "/stores/{id}/publish",
    tag = "Stores",
    summary = "Publish store",
    security(("bearer" = [])),
    params(
        ("id" = String, Path, description = "Store id"),
        ("X-Tenant-Id" = String, Header, description = "Tenant to act on")
    ),
    responses(
        (status = 201, description = "Published store", body = Store),
        (status = 403, description = "Store belongs to another tenant", body = ErrorResponse),
        (status = 404, description = "Store not found", body = ErrorResponse)
    )
)]
pub async fn publish_store(
    State(state): State<AppState>,
    ctx: TenantContext,
    Path(id): Path<StoreId>,
) -> Result<impl IntoResponse, ServerError> {
    let store = state.engine.stores().publish(&ctx.tenant_id, &id).await?;
    Ok((StatusCode::CREATED, Json(store)))
}

/// `POST /stores/{id}/unpublish`
#[utoipa::path(
    post,
    path = "/stores/{id}/unpublish",
    tag = "Stores",
    summary = "Unpublish store",
    security(("bearer" = [])),
    params(
        ("id" = String, Path, description = "Store id"),
        ("X-Tenant-Id" = String, Header, description = "Tenant to act on")
    ),
    responses(
        (status = 201, description = "Store moved back to DRAFT", body = Store),
        (status = 403, description = "Store belongs to another tenant", body = ErrorResponse),
        (status = 404, description = "Store not found", body = ErrorResponse)
    )
)]
pub async fn unpublish_store(
    State(state): State<AppState>,
    ctx: TenantContext,
    Path(id): Path<StoreId>,
) -> Result<impl IntoResponse, ServerError> {
    let store = state.engine.stores().unpublish(&ctx.tenant_id, &id).await?;
    Ok((StatusCode::CREATED, Json(store)))
}

/// `GET /public/stores/{slug}` -- a published store.
#[utoipa::path(
    get,
    path = "/public/stores/{slug}",
    tag = "Public",
    summary = "Public store",
    params(("slug" = String, Path, description = "Store slug")),
    responses(
        (status = 200, description = "The published store", body = Store),
        (status = 404, description = "Store not found or not published", body = ErrorResponse)
    )
)]
pub async fn public_store(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<Store>, ServerError> {
    Ok(Json(state.engine.stores().public_by_slug(&slug).await?))
}
