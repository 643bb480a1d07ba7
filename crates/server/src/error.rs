use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use hololith_engine::EngineError;
use thiserror::Error;
use tracing::error;

/// Message returned for every 500 response.
pub const INTERNAL_MESSAGE: &str = "Internal server error";

/// Errors that can occur when running the Hololith server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// A configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// An I/O error (e.g. binding the listener).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// An engine-level error surfaced through the API.
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// The request body or query failed validation.
    #[error("{0}")]
    BadRequest(String),

    /// Authentication failed (missing or invalid credentials).
    #[error("{0}")]
    Unauthorized(String),

    /// Caller lacks permission for the requested operation.
    #[error("{0}")]
    Forbidden(String),

    /// Rate limit exceeded.
    #[error("Too many requests")]
    RateLimited {
        /// Seconds until the caller can retry.
        retry_after: u64,
    },

    /// Unexpected failure outside the engine (token signing, hashing).
    #[error("internal error: {0}")]
    Internal(String),
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) | Self::Engine(EngineError::InvalidInput(_)) => {
                StatusCode::BAD_REQUEST
            }
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_)
            | Self::Engine(EngineError::Forbidden(_) | EngineError::QuotaExceeded(_)) => {
                StatusCode::FORBIDDEN
            }
            Self::Engine(EngineError::NotFound(_)) => StatusCode::NOT_FOUND,
            Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::Config(_)
            | Self::Io(_)
            | Self::Internal(_)
            | Self::Engine(EngineError::Internal(_) | EngineError::Store(_)) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

/// The uniform JSON error body.
pub(crate) fn error_body(status: StatusCode, message: &str) -> serde_json::Value {
    serde_json::json!({
        "statusCode": status.as_u16(),
        "error": status.canonical_reason().unwrap_or("Error"),
        "message": message,
        "timestamp": chrono::Utc::now().to_rfc3339(),
    })
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if status.is_server_error() {
            error!(error = %self, "request failed");
            INTERNAL_MESSAGE.to_owned()
        } else {
            self.to_string()
        };

        let mut response = (status, axum::Json(error_body(status, &message))).into_response();

        if let Self::RateLimited { retry_after } = self {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(retry_after));
        }

        response
    }
}

#[cfg(test)]
mod tests {
    use hololith_core::QuotaViolation;
    use hololith_store::StoreError;

    use super::*;

    async fn body_of(err: ServerError) -> (StatusCode, serde_json::Value, Response) {
        let response = err.into_response();
        let status = response.status();
        let (parts, body) = response.into_parts();
        let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
        let json = serde_json::from_slice(&bytes).unwrap();
        (status, json, Response::from_parts(parts, axum::body::Body::empty()))
    }

    #[tokio::test]
    async fn engine_errors_map_to_statuses() {
        let cases = [
            (EngineError::InvalidInput("bad".into()), StatusCode::BAD_REQUEST),
            (EngineError::NotFound("Store not found".into()), StatusCode::NOT_FOUND),
            (EngineError::Forbidden("nope".into()), StatusCode::FORBIDDEN),
            (
                EngineError::QuotaExceeded(QuotaViolation::MaxStores(1)),
                StatusCode::FORBIDDEN,
            ),
        ];
        for (err, expected) in cases {
            let message = err.to_string();
            let (status, json, _) = body_of(ServerError::from(err)).await;
            assert_eq!(status, expected);
            assert_eq!(json["statusCode"], expected.as_u16());
            assert_eq!(json["message"], message);
            assert!(json["timestamp"].is_string());
        }
    }

    #[tokio::test]
    async fn internal_details_are_hidden() {
        let (status, json, _) = body_of(ServerError::Engine(EngineError::Store(
            StoreError::Backend("relation hololith_stores does not exist".into()),
        )))
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json["message"], INTERNAL_MESSAGE);
        assert_eq!(json["error"], "Internal Server Error");

        let (_, json, _) =
            body_of(ServerError::Engine(EngineError::Internal("plan missing".into()))).await;
        assert_eq!(json["message"], INTERNAL_MESSAGE);
    }

    #[tokio::test]
    async fn rate_limited_sets_retry_after() {
        let (status, json, response) = body_of(ServerError::RateLimited { retry_after: 17 }).await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(json["error"], "Too Many Requests");
        assert_eq!(response.headers()[header::RETRY_AFTER], "17");
    }
}
