use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;

use hololith_core::{TrackOutcome, ViewEventInput, WeekSeries};
use hololith_engine::StoreStats;

use super::extract::{Json, Query};
use super::AppState;
use super::schemas::{BatchRequest, BatchResponse, ErrorResponse, OverviewResponse, StoreStatsParams};
use super::tenant::TenantContext;
use crate::error::ServerError;

/// `POST /analytics/view` -- record one storefront view.
///
/// Views with a `viewerId` are deduplicated per viewer, target and UTC day.
#[utoipa::path(
    post,
    path = "/analytics/view",
    tag = "Analytics",
    summary = "Track view",
    request_body(content = ViewEventInput),
    responses(
        (status = 201, description = "View accepted", body = TrackOutcome),
        (status = 400, description = "Unknown type or missing target id", body = ErrorResponse),
        (status = 404, description = "Target missing or not published", body = ErrorResponse),
        (status = 429, description = "Rate limit exceeded", body = ErrorResponse)
    )
)]
pub async fn track_view(
    State(state): State<AppState>,
    Json(body): Json<ViewEventInput>,
) -> Result<impl IntoResponse, ServerError> {
    let outcome = state.engine.views().track_view(&body).await?;
    Ok((StatusCode::CREATED, Json(outcome)))
}

/// `POST /analytics/batch` -- record up to 50 views; invalid events are skipped.
#[utoipa::path(
    post,
    path = "/analytics/batch",
    tag = "Analytics",
    summary = "Track view batch",
    request_body(content = BatchRequest),
    responses(
        (status = 201, description = "Number of accepted events", body = BatchResponse),
        (status = 400, description = "More than 50 events", body = ErrorResponse),
        (status = 429, description = "Rate limit exceeded", body = ErrorResponse)
    )
)]
pub async fn track_batch(
    State(state): State<AppState>,
    Json(body): Json<BatchRequest>,
) -> Result<impl IntoResponse, ServerError> {
    let count = state.engine.views().track_batch(&body.events).await?;
    Ok((StatusCode::CREATED, Json(BatchResponse { ok: true, count })))
}

/// `GET /dashboard/analytics/overview` -- all-time totals per view type.
#[utoipa::path(
    get,
    path = "/dashboard/analytics/overview",
    tag = "Analytics",
    summary = "Overview",
    security(("bearer" = [])),
    params(("X-Tenant-Id" = String, Header, description = "Tenant to act on")),
    responses(
        (status = 200, description = "View totals", body = OverviewResponse)
    )
)]
pub async fn overview(
    State(state): State<AppState>,
    ctx: TenantContext,
) -> Result<Json<OverviewResponse>, ServerError> {
    let totals = state.engine.views().overview(&ctx.tenant_id).await?;
    Ok(Json(OverviewResponse { totals }))
}

/// `GET /dashboard/analytics/last7days` -- daily counts for the last seven UTC days.
#[utoipa::path(
    get,
    path = "/dashboard/analytics/last7days",
    tag = "Analytics",
    summary = "Last 7 days",
    security(("bearer" = [])),
    params(("X-Tenant-Id" = String, Header, description = "Tenant to act on")),
    responses(
        (status = 200, description = "Seven zero-filled day buckets, oldest first", body = WeekSeries)
    )
)]
pub async fn last_7_days(
    State(state): State<AppState>,
    ctx: TenantContext,
) -> Result<Json<WeekSeries>, ServerError> {
    Ok(Json(state.engine.views().last_7_days(&ctx.tenant_id).await?))
}

/// `GET /dashboard/analytics/store?storeId=`
#[utoipa::path(
    get,
    path = "/dashboard/analytics/store",
    tag = "Analytics",
    summary = "Store stats",
    security(("bearer" = [])),
    params(
        StoreStatsParams,
        ("X-Tenant-Id" = String, Header, description = "Tenant to act on")
    ),
    responses(
        (status = 200, description = "Totals for the store and its products", body = StoreStats),
        (status = 403, description = "Store belongs to another tenant", body = ErrorResponse),
        (status = 404, description = "Store not found", body = ErrorResponse)
    )
)]
pub async fn store_stats(
    State(state): State<AppState>,
    ctx: TenantContext,
    Query(params): Query<StoreStatsParams>,
) -> Result<Json<StoreStats>, ServerError> {
    Ok(Json(
        state
            .engine
            .views()
            .store_stats(&ctx.tenant_id, &params.store_id)
            .await?,
    ))
}
