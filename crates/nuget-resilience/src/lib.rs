//! Resilience primitives that guard every remote call the restore engine
//! makes: a per-source token-bucket rate limiter and a per-host circuit
//! breaker, plus the cancellation handle both honor while waiting.

pub mod cancellation;
pub mod circuit_breaker;
pub mod host_breakers;
pub mod source_limiter;
pub mod token_bucket;

pub use cancellation::CancellationToken;
pub use circuit_breaker::{guard_http, CircuitBreaker, CircuitBreakerConfig, HttpOutcome};
pub use host_breakers::HostBreakers;
pub use source_limiter::SourceLimiters;
pub use token_bucket::{TokenBucket, TokenBucketConfig};
