//! The vehicle-history service wiring.
//!
//! Everything the deployment fixes lives here: the accepted media types,
//! the credential header prefix, the domain-error table, and the one
//! versioned route. The lookup logic itself is the caller's controller,
//! and token validation is the caller's collaborator — this module only
//! composes them into a bootable service.

use std::path::PathBuf;
use std::sync::Arc;

use http::StatusCode;
use tracing::info;

use crate::auth::{ScopeAuth, TokenValidator};
use crate::config::{AuthConfig, Config, SwaggerConfig, TrustKey};
use crate::error::{BootstrapError, ErrorMap};
use crate::handler::Handler;
use crate::method::Method;
use crate::negotiate::MediaType;
use crate::pipeline::{CachePolicy, NoPrecondition, RoutePipeline};
use crate::registry::{Route, RouteRegistry, Version};
use crate::server::{Dispatcher, Running, Server};

/// Domain error kinds the controller reports; [`error_map`] fixes their
/// wire classes. Anything else classifies as an opaque 500.
pub mod kind {
    pub const VEHICLE_NOT_FOUND: &str = "vehicle-not-found";
    pub const SERVICE_UNAVAILABLE: &str = "service-unavailable";
    pub const INVALID_VEHICLE_PLATE: &str = "invalid-vehicle-plate";
}

/// OAuth scope every caller must present.
pub const REQUIRED_SCOPE: &str = "openid";
/// Client identity the tokens must carry.
pub const REQUIRED_CLIENT: &str = "vehiclehistory";

/// How long shared caches may hold a lookup response, in seconds.
const PUBLIC_MAX_AGE: u32 = 600;

// ── Options ──────────────────────────────────────────────────────────────────

/// Deployment knobs, with the production defaults baked in.
#[derive(Clone, Debug)]
pub struct AppOptions {
    pub addr: String,
    pub trust_key_path: PathBuf,
    pub swagger_enabled: bool,
    pub swagger_docs_dir: PathBuf,
}

impl Default for AppOptions {
    fn default() -> Self {
        Self {
            addr: "0.0.0.0:3000".to_owned(),
            trust_key_path: PathBuf::from("config/public.key"),
            swagger_enabled: true,
            swagger_docs_dir: PathBuf::from("public"),
        }
    }
}

// ── Wiring ───────────────────────────────────────────────────────────────────

/// The domain-error table: what each controller-reported kind means on
/// the wire.
pub fn error_map() -> ErrorMap {
    ErrorMap::builder()
        .map(kind::VEHICLE_NOT_FOUND, StatusCode::NOT_FOUND)
        .map(kind::SERVICE_UNAVAILABLE, StatusCode::SERVICE_UNAVAILABLE)
        .map(kind::INVALID_VEHICLE_PLATE, StatusCode::BAD_REQUEST)
        .build()
}

fn acceptable() -> Vec<MediaType> {
    [
        "application/vnd.vehicle-history.v1+json",
        "application/vnd.vehicle-history.v1+xml",
    ]
    .into_iter()
    .map(|m| m.parse().expect("accepted media types are well-formed"))
    .collect()
}

/// Builds the immutable service [`Config`] around the loaded trust key.
pub fn config(key: TrustKey, opts: &AppOptions) -> Config {
    Config {
        app_name: "API".to_owned(),
        authorization: AuthConfig {
            header_prefix: "x-auth-".to_owned(),
            key,
            verify: true,
        },
        acceptable: acceptable(),
        swagger: SwaggerConfig {
            enabled: opts.swagger_enabled,
            docs_dir: opts.swagger_docs_dir.clone(),
        },
    }
}

/// Registers the route table: one versioned GET endpoint, authenticated,
/// publicly cacheable, precondition slot reserved.
pub fn routes(
    controller: impl Handler,
    validator: Arc<dyn TokenValidator>,
    config: &Config,
) -> Result<RouteRegistry, BootstrapError> {
    let mut registry = RouteRegistry::builder();

    registry.register(
        Route::new(Method::Get, "/api/vehicle-history", Version::new(1, 0, 0)),
        RoutePipeline::builder()
            .auth(ScopeAuth::new(
                validator,
                &config.authorization.header_prefix,
                REQUIRED_SCOPE,
                REQUIRED_CLIENT,
            ))
            .cache(CachePolicy::Public { max_age: PUBLIC_MAX_AGE })
            .precondition(NoPrecondition)
            .handler(controller),
    )?;

    Ok(registry.build()?)
}

/// Boots the service: trust key, config, routes, bound port — in that
/// order, stopping at the first failure. Nothing here retries; a bind
/// failure is the caller's to handle.
pub async fn start<F>(
    opts: AppOptions,
    controller: impl Handler,
    make_validator: F,
) -> Result<Running, BootstrapError>
where
    F: FnOnce(&AuthConfig) -> Arc<dyn TokenValidator>,
{
    let key = TrustKey::load(&opts.trust_key_path).await?;
    let config = self::config(key, &opts);
    info!(app = %config.app_name, "bootstrapping");

    let validator = make_validator(&config.authorization);
    let registry = routes(controller, validator, &config)?;
    let dispatcher = Dispatcher::new(registry, error_map(), config);

    let running = Server::bind(&opts.addr)?.start(dispatcher).await?;
    info!(port = running.port(), "vehicle-history API bootstrapped");
    Ok(running)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_map_covers_the_controller_kinds() {
        let map = error_map();
        assert_eq!(map.classify(kind::VEHICLE_NOT_FOUND), StatusCode::NOT_FOUND);
        assert_eq!(map.classify(kind::SERVICE_UNAVAILABLE), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(map.classify(kind::INVALID_VEHICLE_PLATE), StatusCode::BAD_REQUEST);
        assert_eq!(map.classify("anything-else"), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn config_fixes_the_negotiation_whitelist() {
        let cfg = config(TrustKey::from(b"key".to_vec()), &AppOptions::default());
        assert_eq!(cfg.acceptable.len(), 2);
        assert_eq!(cfg.acceptable[0].essence(), "application/vnd.vehicle-history.v1+json");
        assert_eq!(cfg.acceptable[1].essence(), "application/vnd.vehicle-history.v1+xml");
        assert_eq!(cfg.authorization.header_prefix, "x-auth-");
        assert!(cfg.authorization.verify);
    }
}
