//! Immutable service configuration.
//!
//! Built once at bootstrap and passed by reference into the registry and
//! the dispatcher — there is no process-wide mutable options object.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::BootstrapError;
use crate::negotiate::MediaType;

/// Everything the dispatcher and bootstrap need to know.
#[derive(Debug)]
pub struct Config {
    pub app_name: String,
    pub authorization: AuthConfig,
    /// Content-negotiation whitelist; the first entry is the default
    /// representation.
    pub acceptable: Vec<MediaType>,
    pub swagger: SwaggerConfig,
}

/// Authorization wiring handed to the token-validation collaborator.
#[derive(Debug)]
pub struct AuthConfig {
    /// Prefix of the credential header: `x-auth-` → `x-auth-authorization`.
    pub header_prefix: String,
    pub key: TrustKey,
    /// `false` disables signature verification — local development only.
    pub verify: bool,
}

/// Passthrough of pre-generated API docs.
#[derive(Debug)]
pub struct SwaggerConfig {
    pub enabled: bool,
    pub docs_dir: PathBuf,
}

// ── TrustKey ─────────────────────────────────────────────────────────────────

/// Trust material for validating incoming tokens.
#[derive(Clone)]
pub struct TrustKey(Vec<u8>);

impl TrustKey {
    /// Reads the key file once at bootstrap. Failure is fatal — the server
    /// must not start without its trust material.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, BootstrapError> {
        let path = path.as_ref();
        match tokio::fs::read(path).await {
            Ok(bytes) => Ok(Self(bytes)),
            Err(source) => {
                tracing::debug!(path = %path.display(), "trust key read error: {source}");
                Err(BootstrapError::TrustKey { path: path.to_owned(), source })
            }
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl From<Vec<u8>> for TrustKey {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

/// Key material never lands in logs; only the length does.
impl fmt::Debug for TrustKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TrustKey({} bytes)", self.0.len())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
