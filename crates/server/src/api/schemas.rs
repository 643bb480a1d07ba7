use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use hololith_core::{
    ExploreKind, ExploreSort, StoreId, TagId, ViewEventInput, ViewTotals,
};

use crate::auth::identity::UserInfo;

/// Error response body.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    #[schema(example = 404)]
    pub status_code: u16,
    #[schema(example = "Not Found")]
    pub error: String,
    #[schema(example = "Store not found")]
    pub message: String,
    /// RFC 3339 time the error was produced.
    pub timestamp: String,
}

/// Acknowledgement for operations without a payload.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct OkResponse {
    pub ok: bool,
}

impl OkResponse {
    pub fn ok() -> Self {
        Self { ok: true }
    }
}

/// Liveness and readiness response.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct StatusResponse {
    #[schema(example = "ok")]
    pub status: String,
}

/// Database reachability response.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DbHealthResponse {
    #[schema(example = "ok")]
    pub status: String,
    #[schema(example = "up")]
    pub db: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RegisterRequest {
    #[schema(example = "owner@example.com")]
    pub email: String,
    /// At least 8 characters.
    pub password: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MeResponse {
    pub user: UserInfo,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpgradeRequest {
    #[schema(example = "pro")]
    pub plan_code: String,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AssignTagRequest {
    pub tag_id: TagId,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct BatchRequest {
    /// At most 50 events.
    pub events: Vec<ViewEventInput>,
}

/// Accepted batch size.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct BatchResponse {
    pub ok: bool,
    pub count: usize,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct OverviewResponse {
    pub totals: ViewTotals,
}

/// Optional store filter for tenant listings.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct StoreFilter {
    #[param(value_type = Option<String>)]
    pub store_id: Option<StoreId>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct StoreStatsParams {
    #[param(value_type = String)]
    pub store_id: StoreId,
}

/// Raw `/explore` query parameters. Normalized before use.
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct ExploreParams {
    /// Case-insensitive substring.
    pub q: Option<String>,
    /// Comma-separated tag slugs.
    pub tags: Option<String>,
    /// `store`, `product` or `all`.
    #[serde(rename = "type")]
    #[param(value_type = Option<String>)]
    pub kind: Option<ExploreKind>,
    /// `new`, `name` or `price`.
    #[param(value_type = Option<String>)]
    pub sort: Option<ExploreSort>,
    /// Clamped to 1..=50. Defaults to 20.
    pub limit: Option<i64>,
    /// Negative values count as 0.
    pub offset: Option<i64>,
}
