// =============================================================================
// Bearer Token Authentication — Axum Extractor
// =============================================================================
//
// Extracts and validates a Bearer token from the `Authorization` header.
// The expected token is read from the `SIGNAL_GATE_ADMIN_TOKEN` environment
// variable on every request. Comparison is performed in constant time.
//
// Usage as an Axum extractor:
//
//   async fn handler(_auth: AuthBearer, ...) { ... }
//
// If the token is missing or invalid, the extractor short-circuits the request
// with a 403 Forbidden response before the handler body executes.
// =============================================================================

use axum::{
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
};
use tracing::warn;

pub const ADMIN_TOKEN_ENV: &str = "SIGNAL_GATE_ADMIN_TOKEN";

// =============================================================================
// Constant-time comparison
// =============================================================================

/// Compare two byte slices in constant time with respect to their content.
/// Only the length mismatch short-circuits.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result: u8 = 0;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}

// =============================================================================
// Extractor
// =============================================================================

/// Validated admin bearer token.
#[derive(Debug)]
pub struct AuthBearer(pub String);

/// Rejection type returned when authentication fails.
#[derive(Debug)]
pub struct AuthRejection {
    status: StatusCode,
    message: &'static str,
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        let body = serde_json::json!({
            "error": self.message,
        });
        (self.status, axum::Json(body)).into_response()
    }
}

/// Validate an `Authorization` header value against `expected`.
fn check_bearer(header: Option<&str>, expected: &str) -> Result<AuthBearer, AuthRejection> {
    if expected.is_empty() {
        warn!("{} is not set — all authenticated requests will be rejected", ADMIN_TOKEN_ENV);
        return Err(AuthRejection {
            status: StatusCode::FORBIDDEN,
            message: "Server authentication not configured",
        });
    }

    let Some(token) = header.and_then(|value| value.strip_prefix("Bearer ")) else {
        warn!("Missing or malformed Authorization header");
        return Err(AuthRejection {
            status: StatusCode::FORBIDDEN,
            message: "Missing or invalid authorization token",
        });
    };

    if !constant_time_eq(token.as_bytes(), expected.as_bytes()) {
        warn!("Invalid admin token presented");
        return Err(AuthRejection {
            status: StatusCode::FORBIDDEN,
            message: "Invalid authorization token",
        });
    }

    Ok(AuthBearer(token.to_string()))
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthBearer
where
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let expected = std::env::var(ADMIN_TOKEN_ENV).unwrap_or_default();
        let header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok());
        check_bearer(header, &expected)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_time_eq_cases() {
        assert!(constant_time_eq(b"hello", b"hello"));
        assert!(!constant_time_eq(b"hello", b"world"));
        assert!(!constant_time_eq(b"short", b"longer_string"));
        assert!(constant_time_eq(b"", b""));
        assert!(!constant_time_eq(b"\x00", b"\x01"));
    }

    #[test]
    fn accepts_matching_bearer() {
        let auth = check_bearer(Some("Bearer s3cret"), "s3cret").unwrap();
        assert_eq!(auth.0, "s3cret");
    }

    #[test]
    fn rejects_wrong_or_missing_token() {
        assert_eq!(check_bearer(Some("Bearer nope"), "s3cret").unwrap_err().status, StatusCode::FORBIDDEN);
        assert!(check_bearer(Some("Basic s3cret"), "s3cret").is_err());
        assert!(check_bearer(None, "s3cret").is_err());
    }

    #[test]
    fn unconfigured_server_rejects_everything() {
        let err = check_bearer(Some("Bearer "), "").unwrap_err();
        assert_eq!(err.message, "Server authentication not configured");
    }
}
