//! Vehicle-history API demo — stub validator and controller.
//!
//! Run with:
//!   RUST_LOG=info cargo run --example vehicle_history
//!
//! Try:
//!   curl -i http://localhost:3000/api/vehicle-history \
//!        -H 'accept: application/vnd.vehicle-history.v1+json' \
//!        -H 'x-auth-authorization: demo-token'
//!
//!   curl -i -X OPTIONS http://localhost:3000/anywhere \
//!        -H 'access-control-request-method: GET'

use std::sync::Arc;

use vhapi::app::{self, AppOptions};
use vhapi::{
    Context, Failure, Principal, Repr, Response, TokenValidator, ValidationError,
};

/// Accepts any non-empty token. A real deployment verifies the token
/// signature against the trust key instead.
struct DemoValidator;

#[async_trait::async_trait]
impl TokenValidator for DemoValidator {
    async fn validate(&self, token: &str) -> Result<Principal, ValidationError> {
        if token.is_empty() {
            return Err(ValidationError::Rejected("empty token".to_owned()));
        }
        Ok(Principal {
            client: "vehiclehistory".to_owned(),
            user: Some("demo".to_owned()),
            scopes: vec!["openid".to_owned()],
        })
    }
}

// GET /api/vehicle-history — canned lookup result in whichever
// representation the client negotiated.
async fn check_vehicle_history(ctx: Context) -> Result<Response, Failure> {
    let body = match ctx.media().repr() {
        Repr::Json => r#"{"plate":"DW12345","stolen":false,"inspections":2}"#,
        Repr::Xml => "<vehicleHistory plate=\"DW12345\" stolen=\"false\" inspections=\"2\"/>",
    };
    Ok(Response::media(ctx.media(), body.as_bytes().to_vec()))
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let opts = AppOptions {
        trust_key_path: "demos/public.key".into(),
        swagger_enabled: false,
        ..AppOptions::default()
    };

    let running = app::start(opts, check_vehicle_history, |_auth| {
        Arc::new(DemoValidator) as Arc<dyn TokenValidator>
    })
    .await
    .expect("bootstrap failed");

    println!("vehicle-history API on port {}", running.port());
    running.serve().await;
}
