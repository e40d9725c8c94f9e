//! Domain failures, the error-to-status table, and bootstrap errors.

use std::collections::HashMap;
use std::net::AddrParseError;
use std::path::PathBuf;

use http::StatusCode;
use thiserror::Error;

use crate::registry::RegistryError;
use crate::response::Response;

// ── Failure ──────────────────────────────────────────────────────────────────

/// A business-level failure reported by a terminal handler.
///
/// The kind is a domain category ("vehicle-not-found"), distinct from its
/// wire representation. The pipeline passes it through untouched; the
/// dispatcher turns the kind into a status via [`ErrorMap::classify`].
#[derive(Debug, Error)]
#[error("{kind}: {message}")]
pub struct Failure {
    kind: String,
    message: String,
}

impl Failure {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self { kind: kind.into(), message: message.into() }
    }

    pub fn kind(&self) -> &str { &self.kind }
    pub fn message(&self) -> &str { &self.message }
}

// ── ErrorMap ─────────────────────────────────────────────────────────────────

/// Frozen table from domain error kinds to wire status classes.
///
/// Assembled once at bootstrap and read-only afterwards. Lookups are O(1)
/// and total: an unregistered kind classifies as `500 Internal Server
/// Error` rather than erroring.
#[derive(Debug)]
pub struct ErrorMap {
    table: HashMap<String, StatusCode>,
}

impl ErrorMap {
    pub fn builder() -> ErrorMapBuilder {
        ErrorMapBuilder { table: HashMap::new() }
    }

    /// The wire class for a domain error kind.
    pub fn classify(&self, kind: &str) -> StatusCode {
        self.lookup(kind).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    /// `None` for kinds that were never registered — the dispatcher keeps
    /// those opaque on the wire.
    pub(crate) fn lookup(&self, kind: &str) -> Option<StatusCode> {
        self.table.get(kind).copied()
    }
}

/// Registration-time view of [`ErrorMap`]. Chain [`map`](Self::map) calls,
/// then [`build`](Self::build).
pub struct ErrorMapBuilder {
    table: HashMap<String, StatusCode>,
}

impl ErrorMapBuilder {
    pub fn map(mut self, kind: impl Into<String>, status: StatusCode) -> Self {
        self.table.insert(kind.into(), status);
        self
    }

    pub fn build(self) -> ErrorMap {
        ErrorMap { table: self.table }
    }
}

// ── Bootstrap errors ──────────────────────────────────────────────────────────

/// Fatal startup errors. None of these are retried; the caller decides
/// whether to give up or start over.
#[derive(Debug, Error)]
pub enum BootstrapError {
    /// Trust material could not be read; the server must not start.
    #[error("trust key `{path}`: {source}")]
    TrustKey {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("invalid listen address `{addr}`: {source}")]
    InvalidAddress {
        addr: String,
        #[source]
        source: AddrParseError,
    },

    /// The port could not be bound; surfaced to the caller, never retried.
    #[error("bind {addr}: {source}")]
    Bind {
        addr: std::net::SocketAddr,
        #[source]
        source: std::io::Error,
    },
}

// ── Wire error bodies ─────────────────────────────────────────────────────────

/// JSON error body in the `{code, message}` shape clients already parse.
pub(crate) fn error_response(status: StatusCode, message: &str) -> Response {
    let code: String = status
        .canonical_reason()
        .unwrap_or("Error")
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    let message = escape_json(message);
    Response::builder()
        .status(status)
        .json(format!(r#"{{"code":"{code}","message":"{message}"}}"#).into_bytes())
}

fn escape_json(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> ErrorMap {
        ErrorMap::builder()
            .map("entity-not-found", StatusCode::NOT_FOUND)
            .map("service-unavailable", StatusCode::SERVICE_UNAVAILABLE)
            .map("invalid-input", StatusCode::BAD_REQUEST)
            .build()
    }

    #[test]
    fn registered_kinds_classify_to_their_status() {
        let map = table();
        assert_eq!(map.classify("entity-not-found"), StatusCode::NOT_FOUND);
        assert_eq!(map.classify("service-unavailable"), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(map.classify("invalid-input"), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn unregistered_kinds_default_to_internal_error() {
        let map = table();
        for kind in ["anything-unregistered", "", "Entity-Not-Found", "disk-on-fire"] {
            assert_eq!(map.classify(kind), StatusCode::INTERNAL_SERVER_ERROR);
        }
    }

    #[test]
    fn lookup_distinguishes_unregistered_kinds() {
        let map = table();
        assert_eq!(map.lookup("entity-not-found"), Some(StatusCode::NOT_FOUND));
        assert_eq!(map.lookup("anything-unregistered"), None);
    }

    #[test]
    fn error_body_carries_code_and_message() {
        let resp = error_response(StatusCode::NOT_FOUND, "no history for plate");
        assert_eq!(resp.status, StatusCode::NOT_FOUND);
        let body = String::from_utf8(resp.body.to_vec()).unwrap();
        assert_eq!(body, r#"{"code":"NotFound","message":"no history for plate"}"#);
    }

    #[test]
    fn error_body_escapes_quotes() {
        let resp = error_response(StatusCode::BAD_REQUEST, r#"plate "X" rejected"#);
        let body = String::from_utf8(resp.body.to_vec()).unwrap();
        assert!(body.contains(r#"plate \"X\" rejected"#));
    }

    #[test]
    fn failure_displays_kind_and_message() {
        let failure = Failure::new("vehicle-not-found", "no history for DW12345");
        assert_eq!(failure.to_string(), "vehicle-not-found: no history for DW12345");
    }
}
