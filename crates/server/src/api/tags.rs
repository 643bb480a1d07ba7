use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use tracing::info;

use hololith_core::{ProductId, StoreId, Tag, TagId};
use hololith_engine::{CreateTag, TagLanding};

use super::extract::Json;
use super::AppState;
use super::schemas::{AssignTagRequest, ErrorResponse, OkResponse};
use super::tenant::TenantContext;
use crate::error::ServerError;

/// `GET /tags` -- every tag, lowest tier first.
#[utoipa::path(
    get,
    path = "/tags",
    tag = "Tags",
    summary = "List tags",
    responses(
        (status = 200, description = "All tags", body = Vec<Tag>)
    )
)]
pub async fn list_tags(State(state): State<AppState>) -> Result<Json<Vec<Tag>>, ServerError> {
    Ok(Json(state.engine.tags().list().await?))
}

/// `GET /tags/{slug}` -- a tag and the published listings carrying it.
#[utoipa::path(
    get,
    path = "/tags/{slug}",
    tag = "Tags",
    summary = "Tag landing",
    params(("slug" = String, Path, description = "Tag slug")),
    responses(
        (status = 200, description = "The tag with published stores and products", body = TagLanding),
        (status = 404, description = "Tag not found", body = ErrorResponse)
    )
)]
pub async fn tag_landing(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<TagLanding>, ServerError> {
    Ok(Json(state.engine.tags().landing(&slug).await?))
}

/// `POST /admin/tags` -- create a tag. Refused in production.
#[utoipa::path(
    post,
    path = "/admin/tags",
    tag = "Tags",
    summary = "Create tag",
    security(("bearer" = [])),
    params(("X-Tenant-Id" = String, Header, description = "Tenant to act on")),
    request_body(content = CreateTag),
    responses(
        (status = 201, description = "Tag created", body = Tag),
        (status = 400, description = "Invalid input or slug taken", body = ErrorResponse),
        (status = 403, description = "Production deployment or caller is not an admin", body = ErrorResponse)
    )
)]
pub async fn create_tag(
    State(state): State<AppState>,
    ctx: TenantContext,
    Json(body): Json<CreateTag>,
) -> Result<impl IntoResponse, ServerError> {
    if state.server.is_production() {
        return Err(ServerError::Forbidden("Not available in production".into()));
    }
    ctx.require_admin()?;
    let tag = state.engine.tags().create_tag(body).await?;
    info!(tag = %tag.slug, user_id = %ctx.user_id, "tag created");
    Ok((StatusCode::CREATED, Json(tag)))
}

/// `POST /stores/{id}/tags` -- attach a tag, gated by the plan's tag tier.
#[utoipa::path(
    post,
    path = "/stores/{id}/tags",
    tag = "Tags",
    summary = "Assign store tag",
    security(("bearer" = [])),
    params(
        ("id" = String, Path, description = "Store id"),
        ("X-Tenant-Id" = String, Header, description = "Tenant to act on")
    ),
    request_body(content = AssignTagRequest),
    responses(
        (status = 201, description = "Tag assigned", body = Tag),
        (status = 403, description = "Tag tier above the plan or store of another tenant", body = ErrorResponse),
        (status = 404, description = "Store or tag not found", body = ErrorResponse)
    )
)]
pub async fn assign_store_tag(
    State(state): State<AppState>,
    ctx: TenantContext,
    Path(store_id): Path<StoreId>,
    Json(body): Json<AssignTagRequest>,
) -> Result<impl IntoResponse, ServerError> {
    let tag = state
        .engine
        .tags()
        .assign_to_store(&ctx.tenant_id, &store_id, &body.tag_id)
        .await?;
    Ok((StatusCode::CREATED, Json(tag)))
}

/// `DELETE /stores/{id}/tags/{tagId}`
#[utoipa::path(
    delete,
    path = "/stores/{id}/tags/{tagId}",
    tag = "Tags",
    summary = "Unassign store tag",
    security(("bearer" = [])),
    params(
        ("id" = String, Path, description = "Store id"),
        ("tagId" = String, Path, description = "Tag id"),
        ("X-Tenant-Id" = String, Header, description = "Tenant to act on")
    ),
    responses(
        (status = 200, description = "Tag removed (or was never assigned)", body = OkResponse),
        (status = 404, description = "Store not found", body = ErrorResponse)
    )
)]
pub async fn unassign_store_tag(
    State(state): State<AppState>,
    ctx: TenantContext,
    Path((store_id, tag_id)): Path<(StoreId, TagId)>,
) -> Result<Json<OkResponse>, ServerError> {
    state
        .engine
        .tags()
        .unassign_from_store(&ctx.tenant_id, &store_id, &tag_id)
        .await?;
    Ok(Json(OkResponse::ok()))
}

/// `GET /stores/{id}/tags`
#[utoipa::path(
    get,
    path = "/stores/{id}/tags",
    tag = "Tags",
    summary = "Store tags",
    security(("bearer" = [])),
    params(
        ("id" = String, Path, description = "Store id"),
        ("X-Tenant-Id" = String, Header, description = "Tenant to act on")
    ),
    responses(
        (status = 200, description = "Tags on the store", body = Vec<Tag>),
        (status = 404, description = "Store not found", body = ErrorResponse)
    )
)]
pub async fn store_tags(
    State(state): State<AppState>,
    ctx: TenantContext,
    Path(store_id): Path<StoreId>,
) -> Result<Json<Vec<Tag>>, ServerError> {
    Ok(Json(
        state.engine.tags().store_tags(&ctx.tenant_id, &store_id).await?,
    ))
}

/// `POST /products/{id}/tags` -- attach a tag, gated by the plan's tag tier.
#[utoipa::path(
    post,
    path = "/products/{id}/tags",
    tag = "Tags",
    summary = "Assign product tag",
    security(("bearer" = [])),
    params(
        ("id" = String, Path, description = "Product id"),
        ("X-Tenant-Id" = String, Header, description = "Tenant to act on")
    ),
    request_body(content = AssignTagRequest),
    responses(
        (status = 201, description = "Tag assigned", body = Tag),
        (status = 403, description = "Tag tier above the plan or product of another tenant", body = ErrorResponse),
        (status = 404, description = "Product or tag not found", body = ErrorResponse)
    )
)]
pub async fn assign_product_tag(
    State(state): State<AppState>,
    ctx: TenantContext,
    Path(product_id): Path<ProductId>,
    Json(body): Json<AssignTagRequest>,
) -> Result<impl IntoResponse, ServerError> {
    let tag = state
        .engine
        .tags()
        .assign_to_product(&ctx.tenant_id, &product_id, &body.tag_id)
        .await?;
    Ok((StatusCode::CREATED, Json(tag)))
}

/// `DELETE /products/{id}/tags/{tagId}`
#[utoipa::path(
    delete,
    path = "/products/{id}/tags/{tagId}",
    tag = "Tags",
    summary = "Unassign product tag",
    security(("bearer" = [])),
    params(
        ("id" = String, Path, description = "Product id"),
        ("tagId" = String, Path, description = "Tag id"),
        ("X-Tenant-Id" = String, Header, description = "Tenant to act on")
    ),
    responses(
        (status = 200, description = "Tag removed (or was never assigned)", body = OkResponse),
        (status = 404, description = "Product not found", body = ErrorResponse)
    )
)]
pub async fn unassign_product_tag(
    State(state): State<AppState>,
    ctx: TenantContext,
    Path((product_id, tag_id)): Path<(ProductId, TagId)>,
) -> Result<Json<OkResponse>, ServerError> {
    state
        .engine
        .tags()
        .unassign_from_product(&ctx.tenant_id, &product_id, &tag_id)
        .await?;
    Ok(Json(OkResponse::ok()))
}

/// `GET /products/{id}/tags`
#[utoipa::path(
    get,
    path = "/products/{id}/tags",
    tag = "Tags",
    summary = "Product tags",
    security(("bearer" = [])),
    params(
        ("id" = String, Path, description = "Product id"),
        ("X-Tenant-Id" = String, Header, description = "Tenant to act on")
    ),
    responses(
        (status = 200, description = "Tags on the product", body = Vec<Tag>),
        (status = 404, description = "Product not found", body = ErrorResponse)
    )
)]
pub async fn product_tags(
    State(state): State<AppState>,
    ctx: TenantContext,
    Path(product_id): Path<ProductId>,
) -> Result<Json<Vec<Tag>>, ServerError> {
    Ok(Json(
        state
            .engine
            .tags()
            .product_tags(&ctx.tenant_id, &product_id)
            .await?,
    ))
}
