use axum::extract::State;

use hololith_core::ExploreQuery;
use hololith_engine::ExploreResponse;

use super::extract::{Json, Query};
use super::AppState;
use super::schemas::ExploreParams;
use crate::error::ServerError;

impl ExploreParams {
    /// Trim, split and clamp the raw parameters.
    pub fn into_query(self) -> ExploreQuery {
        let non_negative = |v: Option<i64>| v.map(|n| u32::try_from(n.max(0)).unwrap_or(u32::MAX));
        ExploreQuery::normalized(
            self.q.as_deref(),
            self.tags.as_deref(),
            self.kind.unwrap_or_default(),
            self.sort.unwrap_or_default(),
            non_negative(self.limit),
            non_negative(self.offset),
        )
    }
}

/// `GET /explore` -- search published stores and products.
#[utoipa::path(
    get,
    path = "/explore",
    tag = "Discovery",
    summary = "Explore",
    params(ExploreParams),
    responses(
        (status = 200, description = "The normalized query with matching listings", body = ExploreResponse)
    )
)]
pub async fn explore(
    State(state): State<AppState>,
    Query(params): Query<ExploreParams>,
) -> Result<Json<ExploreResponse>, ServerError> {
    Ok(Json(state.engine.discovery().explore(params.into_query()).await?))
}

#[cfg(test)]
mod tests {
    use hololith_core::{ExploreKind, ExploreSort};

    use super::*;

    #[test]
    fn negative_paging_is_floored() {
        let query = ExploreParams {
            limit: Some(-5),
            offset: Some(-3),
            ..ExploreParams::default()
        }
        .into_query();
        assert_eq!(query.limit, 1);
        assert_eq!(query.offset, 0);
    }

    #[test]
    fn oversized_limit_is_clamped() {
        let query = ExploreParams {
            q: Some("  lamp ".into()),
            kind: Some(ExploreKind::Product),
            sort: Some(ExploreSort::Price),
            limit: Some(10_000),
            ..ExploreParams::default()
        }
        .into_query();
        assert_eq!(query.limit, 50);
        assert_eq!(query.q.as_deref(), Some("lamp"));
        assert_eq!(query.kind, ExploreKind::Product);
        assert!(query.tags.is_empty());
    }

    #[test]
    fn defaults_apply() {
        let query = ExploreParams::default().into_query();
        assert_eq!(query.limit, 20);
        assert_eq!(query.kind, ExploreKind::All);
        assert_eq!(query.sort, ExploreSort::New);
    }
}
