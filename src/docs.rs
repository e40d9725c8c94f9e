//! Static passthrough for pre-generated API docs.
//!
//! The docs generator is an external tool; when the swagger toggle is on,
//! whatever it wrote into the docs directory is served under
//! [`MOUNT`] as-is.

use std::path::Path;

use http::StatusCode;

use crate::response::Response;

/// Mount point for the docs passthrough.
pub(crate) const MOUNT: &str = "/api-docs";

pub(crate) async fn serve(dir: &Path, rest: &str) -> Response {
    let rest = rest.trim_start_matches('/');
    let rest = if rest.is_empty() { "index.html" } else { rest };

    // Nothing outside the docs dir is reachable.
    if rest.split('/').any(|seg| seg == ".." || seg.is_empty()) {
        return Response::status(StatusCode::NOT_FOUND);
    }

    match tokio::fs::read(dir.join(rest)).await {
        Ok(bytes) => Response::builder().bytes(content_type(rest), bytes),
        Err(_) => Response::status(StatusCode::NOT_FOUND),
    }
}

fn content_type(path: &str) -> &'static str {
    match path.rsplit('.').next() {
        Some("html")         => "text/html; charset=utf-8",
        Some("json")         => "application/json",
        Some("yaml" | "yml") => "application/yaml",
        Some("js")           => "text/javascript",
        Some("css")          => "text/css",
        Some("png")          => "image/png",
        _                    => "application/octet-stream",
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
