//! CORS preflight handling.
//!
//! Preflights are answered at the server edge for *any* path — they never
//! enter a route pipeline, so they are not authenticated, cached, or
//! preconditioned.

use http::{HeaderMap, StatusCode};

use crate::response::Response;

/// Answers an `OPTIONS` request: wildcard origin, the requested method and
/// headers echoed back, `200` with no body.
pub(crate) fn preflight(headers: &HeaderMap) -> Response {
    let mut builder = Response::builder()
        .status(StatusCode::OK)
        .header("access-control-allow-origin", "*");

    let requested = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());

    if let Some(method) = requested("access-control-request-method") {
        builder = builder.header("access-control-allow-methods", method);
    }
    if let Some(names) = requested("access-control-request-headers") {
        builder = builder.header("access-control-allow-headers", names);
    }

    builder.no_body()
}

// ── Tests ─────────────────────────────────────────────────────────────────────
