//! # Rate Limiting
//!
//! Per-reporter admission control for the waitgraph HTTP API.
//!
//! Every reporter gets its own token bucket on the `/reporters/{id}/...`
//! routes, so one node resubmitting in a tight loop cannot starve the
//! subgraph updates of the others. Registration, `/status` and `/graph`
//! share a single bucket.
//!
//! `/health` and `/deadlock/{xid}` are never limited. Lock managers call the
//! deadlock check while a backend is blocked on a lock; a 429 there stalls a
//! transaction rather than shedding load.
//!
//! ## Configuration
//!
//! - `WAITGRAPH_RATE_LIMIT`: requests per second per bucket (default: 1000,
//!   0 disables limiting)

use axum::{
    body::Body,
    extract::State,
    http::{Method, Request, StatusCode},
    middleware::Next,
    response::Response,
};
use governor::{DefaultDirectRateLimiter, DefaultKeyedRateLimiter, Quota, RateLimiter};
use std::num::NonZeroU32;
use std::sync::Arc;

/// Default budget per bucket: 1000 requests per second.
const DEFAULT_RPS: NonZeroU32 = match NonZeroU32::new(1000) {
    Some(rps) => rps,
    None => NonZeroU32::MIN,
};

// =============================================================================
// ROUTE CLASSES
// =============================================================================

/// Which bucket a request is charged to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Bucket {
    /// Never limited.
    Exempt,
    /// The bucket of one reporter.
    Reporter(u32),
    /// The bucket shared by the administrative routes.
    Shared,
}

fn bucket_for(path: &str) -> Bucket {
    if path == "/health" || path.starts_with("/deadlock/") {
        return Bucket::Exempt;
    }
    let mut parts = path.trim_start_matches('/').split('/');
    match (parts.next(), parts.next()) {
        (Some("reporters"), Some(id)) => id.parse().map_or(Bucket::Shared, Bucket::Reporter),
        _ => Bucket::Shared,
    }
}

// =============================================================================
// LIMITS
// =============================================================================

/// Token buckets for the API, cheap to clone into the middleware state.
#[derive(Clone)]
pub struct RateLimits {
    per_reporter: Arc<DefaultKeyedRateLimiter<u32>>,
    shared: Arc<DefaultDirectRateLimiter>,
}

impl RateLimits {
    /// Give every bucket `requests_per_second`.
    #[must_use]
    pub fn new(requests_per_second: NonZeroU32) -> Self {
        let quota = Quota::per_second(requests_per_second);
        Self {
            per_reporter: Arc::new(RateLimiter::keyed(quota)),
            shared: Arc::new(RateLimiter::direct(quota)),
        }
    }

    /// Build from `WAITGRAPH_RATE_LIMIT`; `None` when limiting is disabled.
    #[must_use]
    pub fn from_env() -> Option<Self> {
        let rps = std::env::var("WAITGRAPH_RATE_LIMIT")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(DEFAULT_RPS.get());
        NonZeroU32::new(rps).map(Self::new)
    }

    fn admit(&self, bucket: Bucket) -> bool {
        match bucket {
            Bucket::Exempt => true,
            Bucket::Reporter(id) => self.per_reporter.check_key(&id).is_ok(),
            Bucket::Shared => self.shared.check().is_ok(),
        }
    }

    /// Drop the buckets of reporters that have been idle long enough to be
    /// back at full capacity.
    fn forget_idle_reporters(&self) {
        self.per_reporter.retain_recent();
        self.per_reporter.shrink_to_fit();
    }

    /// Number of reporter buckets currently held.
    #[must_use]
    pub fn tracked_reporters(&self) -> usize {
        self.per_reporter.len()
    }
}

/// Rate limiting middleware.
///
/// Charges the request to its bucket and answers 429 Too Many Requests when
/// the bucket is empty. A successful unregister also prunes idle reporter
/// buckets, so departed reporters do not accumulate.
pub async fn rate_limit_middleware(
    State(limits): State<RateLimits>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, (StatusCode, &'static str)> {
    let bucket = bucket_for(request.uri().path());

    if !limits.admit(bucket) {
        match bucket {
            Bucket::Reporter(reporter) => tracing::warn!(
                event = "rate_limited",
                reporter,
                path = %request.uri().path(),
                "Reporter exceeded its request budget"
            ),
            _ => tracing::warn!(
                event = "rate_limited",
                path = %request.uri().path(),
                "Rate limit exceeded"
            ),
        }
        return Err((StatusCode::TOO_MANY_REQUESTS, "Too Many Requests"));
    }

    let unregister = request.method() == Method::DELETE && matches!(bucket, Bucket::Reporter(_));
    let response = next.run(request).await;
    if unregister && response.status().is_success() {
        limits.forget_idle_reporters();
    }
    Ok(response)
}

// =============================================================================
// TESTS
// =============================================================================
