pub mod limiter;
pub mod middleware;

pub use limiter::{RateLimitExceeded, RateLimitResult, RateLimiter, RouteClass};
pub use middleware::RateLimitLayer;
