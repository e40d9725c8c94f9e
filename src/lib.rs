//! # vhapi
//!
//! Versioned vehicle-history lookup API over hyper.
//!
//! ## The contract
//!
//! hyper owns the connections; the OAuth validator owns the tokens; the
//! controller owns the lookup. What lives here is the wiring between
//! them: which scope a caller must present, which media types a response
//! may take, how long a shared cache may hold it, and which HTTP class
//! each domain failure maps to.
//!
//! Every request runs one route pipeline — auth, cache-policy,
//! precondition, then the terminal handler — and an abort at any stage
//! stops the chain before the handler ever sees the request. CORS
//! preflights bypass the pipeline entirely and answer for any path.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use vhapi::app::{self, AppOptions};
//! use vhapi::{Context, Failure, Principal, Response, TokenValidator, ValidationError};
//!
//! struct Validator;
//!
//! #[async_trait::async_trait]
//! impl TokenValidator for Validator {
//!     async fn validate(&self, token: &str) -> Result<Principal, ValidationError> {
//!         // Real deployments verify `token` against the trust key here.
//!         Err(ValidationError::Rejected(format!("unknown token `{token}`")))
//!     }
//! }
//!
//! async fn check_vehicle_history(ctx: Context) -> Result<Response, Failure> {
//!     Ok(Response::media(ctx.media(), br#"{"plate":"DW12345"}"#.to_vec()))
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let running = app::start(
//!         AppOptions::default(),
//!         check_vehicle_history,
//!         |_auth| Arc::new(Validator) as Arc<dyn TokenValidator>,
//!     )
//!     .await
//!     .expect("bootstrap failed");
//!
//!     running.serve().await;
//! }
//! ```

mod auth;
mod config;
mod cors;
mod docs;
mod error;
mod handler;
mod method;
mod negotiate;
mod pipeline;
mod registry;
mod request;
mod response;
mod server;

pub mod app;

pub use auth::{Principal, ScopeAuth, TokenValidator, ValidationError};
pub use config::{AuthConfig, Config, SwaggerConfig, TrustKey};
pub use error::{BootstrapError, ErrorMap, ErrorMapBuilder, Failure};
pub use handler::{Handler, IntoOutcome};
pub use method::Method;
pub use negotiate::{MediaType, MediaTypeError, NotAcceptable, Repr, negotiate};
pub use pipeline::{
    Abort, CachePolicy, NoPrecondition, PipelineBuilder, PipelineError, RoutePipeline, Stage,
    StageOutcome, StageRole,
};
pub use registry::{RegistryBuilder, RegistryError, Route, RouteRegistry, Version, VersionError};
pub use request::Context;
pub use response::{IntoResponse, Response, ResponseBuilder};
pub use server::{Dispatcher, Running, Server};
