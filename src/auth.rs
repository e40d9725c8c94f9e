//! Authorization stage and the token-validation boundary.
//!
//! Token *validation* — signature checks against the trust key, expiry,
//! whatever the token format requires — belongs to an external
//! collaborator behind [`TokenValidator`]. What lives here is the policy
//! around it: which header carries the credential, which scope and client
//! identity a caller must present, and the guarantee that a request
//! failing any of it never reaches the terminal handler.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::pipeline::{Abort, Stage, StageOutcome, StageRole};
use crate::request::Context;

// ── Principal ────────────────────────────────────────────────────────────────

/// The identity a validated token resolves to.
#[derive(Clone, Debug)]
pub struct Principal {
    /// The OAuth client the token was issued to.
    pub client: String,
    /// The end user behind the token, when one exists.
    pub user: Option<String>,
    /// Granted scopes.
    pub scopes: Vec<String>,
}

impl Principal {
    pub fn has_scope(&self, scope: &str) -> bool {
        self.scopes.iter().any(|s| s == scope)
    }
}

// ── Validation boundary ──────────────────────────────────────────────────────

/// Why the external validator rejected a credential.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("no authorization header")]
    MissingCredentials,

    #[error("token rejected: {0}")]
    Rejected(String),
}

/// External token-validation collaborator.
///
/// Implementations hold the trust key and do the cryptographic work; the
/// auth stage only consumes the resulting [`Principal`].
#[async_trait]
pub trait TokenValidator: Send + Sync + 'static {
    async fn validate(&self, token: &str) -> Result<Principal, ValidationError>;
}

// ── Auth stage ───────────────────────────────────────────────────────────────

/// The auth stage: a required scope plus a required client identity,
/// checked against what the validator returns.
///
/// Aborts with `Unauthorized` — wrapping the underlying cause text — on
/// any failure, so an unauthenticated request can never reach the handler.
pub struct ScopeAuth {
    validator: Arc<dyn TokenValidator>,
    /// Full credential header name, `{prefix}authorization`.
    header: String,
    scope: String,
    client: String,
}

impl ScopeAuth {
    pub fn new(
        validator: Arc<dyn TokenValidator>,
        header_prefix: &str,
        scope: impl Into<String>,
        client: impl Into<String>,
    ) -> Self {
        Self {
            validator,
            header: format!("{header_prefix}authorization"),
            scope: scope.into(),
            client: client.into(),
        }
    }

    async fn check(&self, ctx: &Context) -> Result<Principal, String> {
        let token = ctx
            .header(&self.header)
            .ok_or_else(|| ValidationError::MissingCredentials.to_string())?;

        let principal = self
            .validator
            .validate(token)
            .await
            .map_err(|e| e.to_string())?;

        if !principal.has_scope(&self.scope) {
            return Err(format!("scope `{}` not granted", self.scope));
        }
        if principal.client != self.client {
            return Err(format!("client `{}` not allowed", principal.client));
        }
        if principal.user.is_none() {
            return Err("no user identity".to_owned());
        }
        Ok(principal)
    }
}

#[async_trait]
impl Stage for ScopeAuth {
    fn role(&self) -> StageRole {
        StageRole::Auth
    }

    async fn apply(&self, ctx: &mut Context) -> StageOutcome {
        match self.check(ctx).await {
            Ok(principal) => {
                ctx.set_principal(principal);
                StageOutcome::Continue
            }
            Err(cause) => {
                StageOutcome::Abort(Abort::Unauthorized(format!("Unauthorized error: {cause}")))
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
