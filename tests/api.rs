//! End-to-end tests for the vehicle-history wiring: the real route table,
//! auth stage, cache policy, and error map, driven with synthetic
//! requests through the dispatcher.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use bytes::Bytes;
use http_body_util::{BodyExt, Full};

use vhapi::app::{self, AppOptions};
use vhapi::{
    BootstrapError, Context, Dispatcher, Failure, Method, Principal, Response, Route,
    RoutePipeline, RouteRegistry, TokenValidator, TrustKey, ValidationError, Version,
};

const V1_JSON: &str = "application/vnd.vehicle-history.v1+json";
const V1_XML: &str = "application/vnd.vehicle-history.v1+xml";

// ── Doubles ──────────────────────────────────────────────────────────────────

/// Validator double: either grants the full vehicle-history identity or
/// rejects every token.
struct StubValidator {
    grant: bool,
}

#[async_trait::async_trait]
impl TokenValidator for StubValidator {
    async fn validate(&self, _token: &str) -> Result<Principal, ValidationError> {
        if self.grant {
            Ok(Principal {
                client: "vehiclehistory".to_owned(),
                user: Some("u1".to_owned()),
                scopes: vec!["openid".to_owned()],
            })
        } else {
            Err(ValidationError::Rejected("signature mismatch".to_owned()))
        }
    }
}

async fn canned_lookup(ctx: Context) -> Result<Response, Failure> {
    Ok(Response::media(ctx.media(), br#"{"plate":"DW12345"}"#.to_vec()))
}

fn opts() -> AppOptions {
    AppOptions { swagger_enabled: false, ..AppOptions::default() }
}

/// The production wiring with a counting controller.
fn dispatcher(grant: bool, calls: Arc<AtomicUsize>) -> Dispatcher {
    let validator: Arc<dyn TokenValidator> = Arc::new(StubValidator { grant });
    let config = app::config(TrustKey::from(b"test-key".to_vec()), &opts());
    let controller = move |ctx: Context| {
        let calls = Arc::clone(&calls);
        async move {
            calls.fetch_add(1, Ordering::SeqCst);
            canned_lookup(ctx).await
        }
    };
    let registry = app::routes(controller, validator, &config).expect("route table");
    Dispatcher::new(registry, app::error_map(), config)
}

/// An unauthenticated route whose controller always fails with `kind`,
/// for exercising the error map end to end.
fn failing_dispatcher(kind: &'static str) -> Dispatcher {
    let mut builder = RouteRegistry::builder();
    builder
        .register(
            Route::new(Method::Get, "/api/vehicle-history", Version::new(1, 0, 0)),
            RoutePipeline::builder().handler(move |_ctx: Context| async move {
                Err::<Response, _>(Failure::new(kind, "upstream said no"))
            }),
        )
        .expect("route table");
    let config = app::config(TrustKey::from(b"test-key".to_vec()), &opts());
    Dispatcher::new(builder.build().expect("registry"), app::error_map(), config)
}

fn request(method: &str, path: &str, headers: &[(&str, &str)]) -> http::Request<Full<Bytes>> {
    let mut builder = http::Request::builder().method(method).uri(path);
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    builder.body(Full::new(Bytes::new())).expect("request")
}

fn authorized(path: &str) -> http::Request<Full<Bytes>> {
    request(
        "GET",
        path,
        &[("accept", V1_JSON), ("x-auth-authorization", "Bearer t0ken")],
    )
}

async fn body_text(response: http::Response<Full<Bytes>>) -> String {
    let bytes = response.into_body().collect().await.expect("body").to_bytes();
    String::from_utf8(bytes.to_vec()).expect("utf-8 body")
}

fn header<'a>(response: &'a http::Response<Full<Bytes>>, name: &str) -> Option<&'a str> {
    response.headers().get(name).and_then(|v| v.to_str().ok())
}

// ── Authorization ────────────────────────────────────────────────────────────

#[tokio::test]
async fn rejected_token_never_reaches_the_handler() {
    let calls = Arc::new(AtomicUsize::new(0));
    let dispatcher = dispatcher(false, Arc::clone(&calls));

    let response = dispatcher.handle(authorized("/api/vehicle-history")).await;

    assert_eq!(response.status(), http::StatusCode::UNAUTHORIZED);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    let body = body_text(response).await;
    assert!(body.contains("Unauthorized error: token rejected: signature mismatch"));
}

#[tokio::test]
async fn missing_credentials_are_unauthorized() {
    let calls = Arc::new(AtomicUsize::new(0));
    let dispatcher = dispatcher(true, Arc::clone(&calls));

    let response = dispatcher
        .handle(request("GET", "/api/vehicle-history", &[("accept", V1_JSON)]))
        .await;

    assert_eq!(response.status(), http::StatusCode::UNAUTHORIZED);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert!(body_text(response).await.contains("no authorization header"));
}

// ── Cache policy & negotiation ───────────────────────────────────────────────

#[tokio::test]
async fn authorized_lookup_carries_cache_and_negotiation_headers() {
    let calls = Arc::new(AtomicUsize::new(0));
    let dispatcher = dispatcher(true, Arc::clone(&calls));

    let response = dispatcher.handle(authorized("/api/vehicle-history")).await;

    assert_eq!(response.status(), http::StatusCode::OK);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(header(&response, "cache-control"), Some("public, max-age=600"));
    assert_eq!(
        header(&response, "content-type"),
        Some("application/vnd.vehicle-history.v1+json; charset=utf-8")
    );

    let vary = header(&response, "vary").expect("vary header");
    for dimension in ["Accept-Language", "Accept-Encoding", "Accept", "Content-Type"] {
        assert!(vary.contains(dimension), "missing {dimension} in Vary");
    }
}

#[tokio::test]
async fn xml_accept_selects_the_xml_representation() {
    let dispatcher = dispatcher(true, Arc::new(AtomicUsize::new(0)));

    let response = dispatcher
        .handle(request(
            "GET",
            "/api/vehicle-history",
            &[("accept", V1_XML), ("x-auth-authorization", "Bearer t0ken")],
        ))
        .await;

    assert_eq!(response.status(), http::StatusCode::OK);
    assert_eq!(
        header(&response, "content-type"),
        Some("application/vnd.vehicle-history.v1+xml; charset=utf-8")
    );
}

#[tokio::test]
async fn unlisted_accept_is_not_acceptable() {
    let calls = Arc::new(AtomicUsize::new(0));
    let dispatcher = dispatcher(true, Arc::clone(&calls));

    let response = dispatcher
        .handle(request("GET", "/api/vehicle-history", &[("accept", "text/html")]))
        .await;

    assert_eq!(response.status(), http::StatusCode::NOT_ACCEPTABLE);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

// ── Preflight ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn preflight_answers_any_path_with_echoed_headers() {
    let dispatcher = dispatcher(true, Arc::new(AtomicUsize::new(0)));

    for path in ["/api/vehicle-history", "/nowhere/in/particular"] {
        let response = dispatcher
            .handle(request(
                "OPTIONS",
                path,
                &[
                    ("access-control-request-method", "GET"),
                    ("access-control-request-headers", "x-auth-authorization"),
                ],
            ))
            .await;

        assert_eq!(response.status(), http::StatusCode::OK);
        assert_eq!(header(&response, "access-control-allow-origin"), Some("*"));
        assert_eq!(header(&response, "access-control-allow-methods"), Some("GET"));
        assert_eq!(
            header(&response, "access-control-allow-headers"),
            Some("x-auth-authorization")
        );
        assert!(body_text(response).await.is_empty());
    }
}

// ── Routing edges ────────────────────────────────────────────────────────────

#[tokio::test]
async fn unknown_path_is_not_found() {
    let dispatcher = dispatcher(true, Arc::new(AtomicUsize::new(0)));
    let response = dispatcher.handle(authorized("/api/owners")).await;
    assert_eq!(response.status(), http::StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn unregistered_method_is_not_allowed() {
    let dispatcher = dispatcher(true, Arc::new(AtomicUsize::new(0)));
    let response = dispatcher
        .handle(request("PATCH", "/api/vehicle-history", &[("accept", V1_JSON)]))
        .await;
    assert_eq!(response.status(), http::StatusCode::METHOD_NOT_ALLOWED);
}

// ── Error map ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn domain_kinds_map_to_their_wire_classes() {
    let cases = [
        (app::kind::VEHICLE_NOT_FOUND, http::StatusCode::NOT_FOUND),
        (app::kind::SERVICE_UNAVAILABLE, http::StatusCode::SERVICE_UNAVAILABLE),
        (app::kind::INVALID_VEHICLE_PLATE, http::StatusCode::BAD_REQUEST),
    ];

    for (kind, status) in cases {
        let dispatcher = failing_dispatcher(kind);
        let response = dispatcher
            .handle(request("GET", "/api/vehicle-history", &[("accept", V1_JSON)]))
            .await;

        assert_eq!(response.status(), status, "kind {kind}");
        assert!(body_text(response).await.contains("upstream said no"));
    }
}

#[tokio::test]
async fn unregistered_kind_is_an_opaque_internal_error() {
    let dispatcher = failing_dispatcher("backend-caught-fire");
    let response = dispatcher
        .handle(request("GET", "/api/vehicle-history", &[("accept", V1_JSON)]))
        .await;

    assert_eq!(response.status(), http::StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_text(response).await;
    assert!(body.contains("unexpected error"));
    assert!(!body.contains("backend-caught-fire"));
    assert!(!body.contains("upstream said no"));
}

// ── Bootstrap ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn trust_key_failure_aborts_bootstrap() {
    let bad = AppOptions {
        addr: "127.0.0.1:0".to_owned(),
        trust_key_path: "config/definitely-missing.key".into(),
        ..opts()
    };

    let err = app::start(bad, canned_lookup, |_auth| {
        Arc::new(StubValidator { grant: true }) as Arc<dyn TokenValidator>
    })
    .await
    .err()
    .expect("bootstrap must fail");

    assert!(matches!(err, BootstrapError::TrustKey { .. }));
}

#[tokio::test]
async fn bootstrap_binds_an_ephemeral_port_and_hands_the_key_over() {
    let dir = tempfile::tempdir().expect("tempdir");
    let key_path = dir.path().join("public.key");
    std::fs::write(&key_path, b"-----BEGIN PUBLIC KEY-----").expect("key fixture");

    let good = AppOptions {
        addr: "127.0.0.1:0".to_owned(),
        trust_key_path: key_path,
        ..opts()
    };

    let running = app::start(good, canned_lookup, |auth| {
        assert_eq!(auth.key.as_bytes(), b"-----BEGIN PUBLIC KEY-----");
        assert_eq!(auth.header_prefix, "x-auth-");
        Arc::new(StubValidator { grant: true }) as Arc<dyn TokenValidator>
    })
    .await
    .expect("bootstrap");

    assert_ne!(running.port(), 0);
}
