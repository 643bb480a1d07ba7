use axum::Extension;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;

use hololith_core::Tenant;
use hololith_engine::{CreateTenant, TenantMembership};

use super::extract::Json;
use super::AppState;
use super::schemas::ErrorResponse;
use crate::auth::identity::AuthUser;
use crate::error::ServerError;

/// `POST /tenants` -- create a tenant owned by the caller.
#[utoipa::path(
    post,
    path = "/tenants",
    tag = "Tenants",
    summary = "Create tenant",
    security(("bearer" = [])),
    request_body(content = CreateTenant),
    responses(
        (status = 201, description = "Tenant created; the caller is its TENANT_ADMIN", body = Tenant),
        (status = 400, description = "Invalid name", body = ErrorResponse)
    )
)]
pub async fn create_tenant(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(body): Json<CreateTenant>,
) -> Result<impl IntoResponse, ServerError> {
    let tenant = state.engine.tenants().create(&user.id, &body).await?;
    Ok((StatusCode::CREATED, Json(tenant)))
}

/// `GET /tenants/mine` -- tenants the caller belongs to.
#[utoipa::path(
    get,
    path = "/tenants/mine",
    tag = "Tenants",
    summary = "My tenants",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Memberships with their tenants", body = Vec<TenantMembership>)
    )
)]
pub async fn my_tenants(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Vec<TenantMembership>>, ServerError> {
    Ok(Json(state.engine.tenants().list_mine(&user.id).await?))
}
