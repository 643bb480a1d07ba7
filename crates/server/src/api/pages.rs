use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;

use hololith_core::{Page, PageId};
use hololith_engine::{CreatePage, StorePage, UpdatePage};

use super::extract::{Json, Query};
use super::AppState;
use super::schemas::{ErrorResponse, StoreFilter};
use super::tenant::TenantContext;
use crate::error::ServerError;

/// `POST /pages` -- create a draft content page.
#[utoipa::path(
    post,
    path = "/pages",
    tag = "Pages",
    summary = "Create page",
    security(("bearer" = [])),
    params(("X-Tenant-Id" = String, Header, description = "Tenant to act on")),
    request_body(content = CreatePage),
    responses(
        (status = 201, description = "Page created as DRAFT", body = Page),
        (status = 400, description = "Invalid content shape or slug taken", body = ErrorResponse),
        (status = 404, description = "Store not found", body = ErrorResponse)
    )
)]
pub async fn create_page(
    State(state): State<AppState>,
    ctx: TenantContext,
    Json(body): Json<CreatePage>,
) -> Result<impl IntoResponse, ServerError> {
    let page = state.engine.pages().create(&ctx.tenant_id, &body).await?;
    Ok((StatusCode::CREATED, Json(page)))
}

/// `GET /pages?storeId=`
#[utoipa::path(
    get,
    path = "/pages",
    tag = "Pages",
    summary = "List pages",
    security(("bearer" = [])),
    params(
        StoreFilter,
        ("X-Tenant-Id" = String, Header, description = "Tenant to act on")
    ),
    responses(
        (status = 200, description = "The tenant's pages", body = Vec<Page>)
    )
)]
pub async fn list_pages(
    State(state): State<AppState>,
    ctx: TenantContext,
    Query(filter): Query<StoreFilter>,
) -> Result<Json<Vec<Page>>, ServerError> {
    let pages = state
        .engine
        .pages()
        .list(&ctx.tenant_id, filter.store_id.as_ref())
        .await?;
    Ok(Json(pages))
}

/// `GET /pages/{id}`
#[utoipa::path(
    get,
    path = "/pages/{id}",
    tag = "Pages",
    summary = "Get page",
    security(("bearer" = [])),
    params(
        ("id" = String, Path, description = "Page id"),
        ("X-Tenant-Id" = String, Header, description = "Tenant to act on")
    ),
    responses(
        (status = 200, description = "The page", body = Page),
        (status = 404, description = "Page not found", body = ErrorResponse)
    )
)]
pub async fn get_page(
    State(state): State<AppState>,
    ctx: TenantContext,
    Path(id): Path<PageId>,
) -> Result<Json<Page>, ServerError> {
    Ok(Json(state.engine.pages().get(&ctx.tenant_id, &id).await?))
}

/// `PATCH /pages/{id}`
#[utoipa::path(
    patch,
    path = "/pages/{id}",
    tag = "Pages",
    summary = "Update page",
    security(("bearer" = [])),
    params(
        ("id" = String, Path, description = "Page id"),
        ("X-Tenant-Id" = String, Header, description = "Tenant to act on")
    ),
    request_body(content = UpdatePage),
    responses(
        (status = 200, description = "Updated page", body = Page),
        (status = 400, description = "Invalid input", body = ErrorResponse),
        (status = 403, description = "Page belongs to another tenant", body = ErrorResponse),
        (status = 404, description = "Page not found", body = ErrorResponse)
    )
)]
pub async fn update_page(
    State(state): State<AppState>,
    ctx: TenantContext,
    Path(id): Path<PageId>,
    Json(body): Json<UpdatePage>,
) -> Result<Json<Page>, ServerError> {
    Ok(Json(state.engine.pages().update(&ctx.tenant_id, &id, &body).await?))
}

/// `POST /pages/{id}/publish`
#[utoipa::path(
    post,
    path = "/pages/{id}/publish",
    tag = "Pages",
    summary = "Publish page",
    security(("bearer" = [])),
    params(
        ("id" = String, Path, description = "Page id"),
        ("X-Tenant-Id" = String, Header, description = "Tenant to act on")
    ),
    responses(
        (status = 201, description = "Published page", body = Page),
        (status = 404, description = "Page not found", body = ErrorResponse)
    )
)]
pub async fn publish_page(
    State(state): State<AppState>,
    ctx: TenantContext,
    Path(id): Path<PageId>,
) -> Result<impl IntoResponse, ServerError> {
    let page = state.engine.pages().publish(&ctx.tenant_id, &id).await?;
    Ok((StatusCode::CREATED, Json(page)))
}

/// `POST /pages/{id}/unpublish`
#[utoipa::path(
    post,
    path = "/pages/{id}/unpublish",
    tag = "Pages",
    summary = "Unpublish page",
    security(("bearer" = [])),
    params(
        ("id" = String, Path, description = "Page id"),
        ("X-Tenant-Id" = String, Header, description = "Tenant to act on")
    ),
    responses(
        (status = 201, description = "Page moved back to DRAFT", body = Page),
        (status = 404, description = "Page not found", body = ErrorResponse)
    )
)]
pub async fn unpublish_page(
    State(state): State<AppState>,
    ctx: TenantContext,
    Path(id): Path<PageId>,
) -> Result<impl IntoResponse, ServerError> {
    let page = state.engine.pages().unpublish(&ctx.tenant_id, &id).await?;
    Ok((StatusCode::CREATED, Json(page)))
}

/// `GET /public/stores/{slug}/pages/{pageSlug}`
#[utoipa::path(
    get,
    path = "/public/stores/{slug}/pages/{pageSlug}",
    tag = "Public",
    summary = "Public page",
    params(
        ("slug" = String, Path, description = "Store slug"),
        ("pageSlug" = String, Path, description = "Page slug")
    ),
    responses(
        (status = 200, description = "The published page", body = StorePage),
        (status = 404, description = "Store or page not found", body = ErrorResponse)
    )
)]
pub async fn public_page(
    State(state): State<AppState>,
    Path((store_slug, page_slug)): Path<(String, String)>,
) -> Result<Json<StorePage>, ServerError> {
    Ok(Json(
        state.engine.pages().public_get(&store_slug, &page_slug).await?,
    ))
}
