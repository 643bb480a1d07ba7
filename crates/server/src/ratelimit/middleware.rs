use std::sync::Arc;
use std::task::{Context, Poll};

use axum::body::Body;
use axum::http::{HeaderMap, HeaderValue, Request};
use axum::response::{IntoResponse, Response};
use tower::{Layer, Service};
use tracing::warn;

use super::limiter::{ANONYMOUS_BUCKET, RateLimitResult, RateLimiter, RouteClass};
use crate::error::ServerError;

/// Tower layer that adds rate limiting middleware.
#[derive(Clone)]
pub struct RateLimitLayer {
    limiter: Option<Arc<RateLimiter>>,
}

impl RateLimitLayer {
    pub fn new(limiter: Option<Arc<RateLimiter>>) -> Self {
        Self { limiter }
    }
}

impl<S> Layer<S> for RateLimitLayer {
    type Service = RateLimitMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RateLimitMiddleware {
            inner,
            limiter: self.limiter.clone(),
        }
    }
}

/// Tower service that enforces rate limits on requests.
#[derive(Clone)]
pub struct RateLimitMiddleware<S> {
    inner: S,
    limiter: Option<Arc<RateLimiter>>,
}

impl<S> Service<Request<Body>> for RateLimitMiddleware<S>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = Response;
    type Error = S::Error;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let limiter = self.limiter.clone();
        let mut inner = self.inner.clone();

        Box::pin(async move {
            let Some(limiter) = limiter else {
                // Rate limiting disabled: pass through.
                return inner.call(req).await;
            };

            let class = RouteClass::classify(req.uri().path());
            let client = client_key(req.headers());

            match limiter.check(class, &client) {
                Ok(result) => {
                    let response = inner.call(req).await?;
                    Ok(add_rate_limit_headers(response, &result))
                }
                Err(exceeded) => {
                    warn!(client = %client, ?class, limit = exceeded.limit, "rate limit exceeded");
                    let mut response = ServerError::RateLimited {
                        retry_after: exceeded.retry_after,
                    }
                    .into_response();
                    let headers = response.headers_mut();
                    headers.insert("x-ratelimit-limit", HeaderValue::from(exceeded.limit));
                    headers.insert("x-ratelimit-remaining", HeaderValue::from(0u64));
                    headers.insert("x-ratelimit-reset", HeaderValue::from(exceeded.retry_after));
                    Ok(response)
                }
            }
        })
    }
}

/// The first `x-forwarded-for` address, or the anonymous bucket.
pub(crate) fn client_key(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map_or_else(|| ANONYMOUS_BUCKET.to_owned(), str::to_owned)
}

/// Add rate limit headers to a successful response.
fn add_rate_limit_headers(response: Response, result: &RateLimitResult) -> Response {
    let (mut parts, body) = response.into_parts();

    parts
        .headers
        .insert("x-ratelimit-limit", HeaderValue::from(result.limit));
    parts
        .headers
        .insert("x-ratelimit-remaining", HeaderValue::from(result.remaining));
    parts
        .headers
        .insert("x-ratelimit-reset", HeaderValue::from(result.reset_after));

    Response::from_parts(parts, body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_key_uses_first_forwarded_address() {
        let mut headers = HeaderMap::new();
        assert_eq!(client_key(&headers), "anonymous");

        headers.insert("x-forwarded-for", HeaderValue::from_static(" 203.0.113.7 , 10.0.0.1"));
        assert_eq!(client_key(&headers), "203.0.113.7");

        headers.insert("x-forwarded-for", HeaderValue::from_static(""));
        assert_eq!(client_key(&headers), "anonymous");
    }
}
