//! Per-request state threaded through a route pipeline.

use std::collections::HashMap;

use bytes::Bytes;
use http::HeaderMap;

use crate::auth::Principal;
use crate::method::Method;
use crate::negotiate::MediaType;
use crate::response::Response;

/// Everything one request carries through its pipeline run.
///
/// Created by the dispatcher once the route and representation are known,
/// handed to each stage in turn, consumed by the terminal handler, dropped
/// when the response goes out. Stages queue response headers here rather
/// than touching the response directly — the handler builds the response,
/// the pipeline folds the queued directives in afterwards.
pub struct Context {
    method: Method,
    path: String,
    headers: HeaderMap,
    params: HashMap<String, String>,
    body: Bytes,
    media: MediaType,
    principal: Option<Principal>,
    directives: Directives,
}

impl Context {
    pub(crate) fn new(
        method: Method,
        path: String,
        headers: HeaderMap,
        params: HashMap<String, String>,
        body: Bytes,
        media: MediaType,
    ) -> Self {
        Self {
            method,
            path,
            headers,
            params,
            body,
            media,
            principal: None,
            directives: Directives::default(),
        }
    }

    pub fn method(&self) -> Method { self.method }
    pub fn path(&self) -> &str { &self.path }
    pub fn body(&self) -> &[u8] { &self.body }

    /// The representation negotiated for this request.
    pub fn media(&self) -> &MediaType { &self.media }

    /// Case-insensitive header lookup. Non-UTF-8 values read as absent.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Returns a named path parameter.
    ///
    /// For a route `/vehicles/{plate}`, `ctx.param("plate")` on
    /// `/vehicles/DW12345` returns `Some("DW12345")`.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    /// The identity the auth stage established, once it has run.
    pub fn principal(&self) -> Option<&Principal> {
        self.principal.as_ref()
    }

    pub(crate) fn set_principal(&mut self, principal: Principal) {
        self.principal = Some(principal);
    }

    /// Queues a header to be set on the eventual response.
    pub fn set_response_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.directives.headers.push((name.into(), value.into()));
    }

    /// Queues the response character encoding, appended to `content-type`.
    pub fn set_charset(&mut self, charset: &'static str) {
        self.directives.charset = Some(charset);
    }

    pub(crate) fn take_directives(&mut self) -> Directives {
        std::mem::take(&mut self.directives)
    }
}

// ── Directives ────────────────────────────────────────────────────────────────

/// Response directives accumulated by stages before the handler runs.
#[derive(Default)]
pub(crate) struct Directives {
    headers: Vec<(String, String)>,
    charset: Option<&'static str>,
}

impl Directives {
    /// Folds the queued headers and charset into `response`.
    pub(crate) fn apply(self, mut response: Response) -> Response {
        for (name, value) in self.headers {
            response.headers.push((name, value));
        }
        if let Some(charset) = self.charset {
            let content_type = response
                .headers
                .iter_mut()
                .find(|(name, _)| name.eq_ignore_ascii_case("content-type"));
            if let Some((_, value)) = content_type {
                if !value.contains("charset") {
                    value.push_str("; charset=");
                    value.push_str(charset);
                }
            }
        }
        response
    }
}
