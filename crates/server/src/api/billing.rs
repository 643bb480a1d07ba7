use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;

use hololith_core::{Plan, TenantPlan};
use hololith_engine::BillingSummary;

use super::extract::Json;
use super::AppState;
use super::schemas::{ErrorResponse, UpgradeRequest};
use super::tenant::TenantContext;
use crate::error::ServerError;

/// `GET /plans` -- the plan catalogue, smallest first.
#[utoipa::path(
    get,
    path = "/plans",
    tag = "Billing",
    summary = "List plans",
    responses(
        (status = 200, description = "All plans", body = Vec<Plan>)
    )
)]
pub async fn list_plans(State(state): State<AppState>) -> Result<Json<Vec<Plan>>, ServerError> {
    Ok(Json(state.engine.quota().list_plans().await?))
}

/// `GET /billing/plan` -- current plan, subscription and usage.
#[utoipa::path(
    get,
    path = "/billing/plan",
    tag = "Billing",
    summary = "Current plan",
    security(("bearer" = [])),
    params(("X-Tenant-Id" = String, Header, description = "Tenant to act on")),
    responses(
        (status = 200, description = "Plan with live usage", body = BillingSummary),
        (status = 403, description = "Not a member of the tenant", body = ErrorResponse)
    )
)]
pub async fn current_plan(
    State(state): State<AppState>,
    ctx: TenantContext,
) -> Result<Json<BillingSummary>, ServerError> {
    Ok(Json(state.engine.quota().billing_summary(&ctx.tenant_id).await?))
}

/// `POST /billing/upgrade` -- switch the tenant to another plan. Admins only.
#[utoipa::path(
    post,
    path = "/billing/upgrade",
    tag = "Billing",
    summary = "Change plan",
    security(("bearer" = [])),
    params(("X-Tenant-Id" = String, Header, description = "Tenant to act on")),
    request_body(content = UpgradeRequest),
    responses(
        (status = 201, description = "The new subscription and plan", body = TenantPlan),
        (status = 403, description = "Caller is not a tenant admin", body = ErrorResponse),
        (status = 404, description = "Plan not found", body = ErrorResponse)
    )
)]
pub async fn upgrade(
    State(state): State<AppState>,
    ctx: TenantContext,
    Json(body): Json<UpgradeRequest>,
) -> Result<impl IntoResponse, ServerError> {
    ctx.require_admin()?;
    let tenant_plan = state
        .engine
        .quota()
        .set_tenant_plan(&ctx.tenant_id, body.plan_code.trim())
        .await?;
    Ok((StatusCode::CREATED, Json(tenant_plan)))
}
