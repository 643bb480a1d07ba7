use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use tracing::warn;

use super::extract::Json;
use super::AppState;
use super::schemas::{DbHealthResponse, StatusResponse};

fn ok() -> Json<StatusResponse> {
    Json(StatusResponse {
        status: "ok".into(),
    })
}

/// `GET /health/live` -- the process is up.
#[utoipa::path(
    get,
    path = "/health/live",
    tag = "Health",
    summary = "Liveness probe",
    responses(
        (status = 200, description = "Service is alive", body = StatusResponse)
    )
)]
pub async fn live() -> impl IntoResponse {
    ok()
}

/// `GET /health/ready` -- the process accepts traffic.
#[utoipa::path(
    get,
    path = "/health/ready",
    tag = "Health",
    summary = "Readiness probe",
    responses(
        (status = 200, description = "Service is ready", body = StatusResponse)
    )
)]
pub async fn ready() -> impl IntoResponse {
    ok()
}

/// `GET /health/db` -- pings the repository backend.
#[utoipa::path(
    get,
    path = "/health/db",
    tag = "Health",
    summary = "Database check",
    responses(
        (status = 200, description = "Backend reachable", body = DbHealthResponse),
        (status = 503, description = "Backend unreachable", body = DbHealthResponse)
    )
)]
pub async fn db(State(state): State<AppState>) -> impl IntoResponse {
    match state.engine.ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(DbHealthResponse {
                status: "ok".into(),
                db: "up".into(),
            }),
        ),
        Err(e) => {
            warn!(error = %e, "database health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(DbHealthResponse {
                    status: "error".into(),
                    db: "down".into(),
                }),
            )
        }
    }
}
