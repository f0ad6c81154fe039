//! # Authentication
//!
//! Shared-secret authentication for the waitgraph HTTP API. Anyone who can
//! reach the daemon can rewrite the wait-for graph, so production deployments
//! should set a key.
//!
//! The key is read once from `WAITGRAPH_API_KEY` when the router is built.
//! Every route except `/health` then requires it:
//!
//! ```text
//! Authorization: Bearer <key>
//! ```
//!
//! Lock managers that cannot add a scheme may send the raw key instead.

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode, header},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use subtle::ConstantTimeEq;

/// Why a request was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Rejection {
    MissingHeader,
    WrongKey,
}

impl Rejection {
    fn reason(self) -> &'static str {
        match self {
            Self::MissingHeader => "missing_authorization_header",
            Self::WrongKey => "invalid_api_key",
        }
    }
}

/// The configured API key.
#[derive(Clone)]
pub struct ApiKey(Arc<[u8]>);

impl ApiKey {
    /// Wrap `key`; an empty key disables authentication.
    #[must_use]
    pub fn new(key: &str) -> Option<Self> {
        (!key.is_empty()).then(|| Self(Arc::from(key.as_bytes())))
    }

    /// Read `WAITGRAPH_API_KEY`; `None` when unset or empty.
    #[must_use]
    pub fn from_env() -> Option<Self> {
        std::env::var("WAITGRAPH_API_KEY")
            .ok()
            .and_then(|key| Self::new(&key))
    }

    fn verify(&self, authorization: Option<&str>) -> Result<(), Rejection> {
        let value = authorization.ok_or(Rejection::MissingHeader)?;
        let provided = value.strip_prefix("Bearer ").unwrap_or(value).as_bytes();

        // Compare at equal length so timing does not reveal the key length.
        let len = provided.len().max(self.0.len());
        let mut lhs = vec![0u8; len];
        let mut rhs = vec![0u8; len];
        lhs[..provided.len()].copy_from_slice(provided);
        rhs[..self.0.len()].copy_from_slice(&self.0);

        let same: bool = lhs.ct_eq(&rhs).into();
        if same && provided.len() == self.0.len() {
            Ok(())
        } else {
            Err(Rejection::WrongKey)
        }
    }
}

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ApiKey(..)")
    }
}

/// Reject requests that do not carry the configured key.
pub async fn require_api_key(
    State(key): State<ApiKey>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, (StatusCode, &'static str)> {
    if request.uri().path() == "/health" {
        return Ok(next.run(request).await);
    }

    let authorization = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    match key.verify(authorization) {
        Ok(()) => Ok(next.run(request).await),
        Err(rejection) => {
            tracing::warn!(
                event = "auth_failure",
                reason = rejection.reason(),
                path = %request.uri().path(),
                "Request refused"
            );
            Err((StatusCode::UNAUTHORIZED, "Unauthorized"))
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_key_disables_auth() {
        assert!(ApiKey::new("").is_none());
        assert!(ApiKey::new("k").is_some());
    }

    #[test]
    fn bearer_and_raw_forms_accepted() {
        let key = ApiKey::new("secret").expect("key");
        assert_eq!(key.verify(Some("Bearer secret")), Ok(()));
        assert_eq!(key.verify(Some("secret")), Ok(()));
    }

    #[test]
    fn wrong_or_missing_key_rejected() {
        let key = ApiKey::new("secret").expect("key");
        assert_eq!(key.verify(None), Err(Rejection::MissingHeader));
        assert_eq!(key.verify(Some("Bearer secreT")), Err(Rejection::WrongKey));
        assert_eq!(key.verify(Some("secret-and-more")), Err(Rejection::WrongKey));
        assert_eq!(key.verify(Some("")), Err(Rejection::WrongKey));
    }

    #[test]
    fn debug_does_not_print_key() {
        let key = ApiKey::new("hunter2").expect("key");
        assert!(!format!("{:?}", key).contains("hunter2"));
    }
}
