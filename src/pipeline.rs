//! The per-route middleware chain.
//!
//! A pipeline runs its stages in a fixed order — auth, cache-policy,
//! precondition — then hands the context to the terminal handler. A stage
//! either continues the chain or aborts it; an abort stops everything
//! downstream, the handler included. The chain is strictly sequential and
//! never re-entered for the same request.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Failure;
use crate::handler::{BoxedHandler, Handler};
use crate::request::Context;
use crate::response::Response;

// ── Stage contract ────────────────────────────────────────────────────────────

/// What a stage decides about the request.
#[derive(Debug)]
pub enum StageOutcome {
    Continue,
    Abort(Abort),
}

/// Why a stage stopped the chain.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Abort {
    /// The caller is not allowed in; carries the wrapped validation cause.
    Unauthorized(String),
    /// A conditional-request check failed.
    PreconditionFailed(String),
}

/// The pipeline role a stage fills. Execution order is fixed by the
/// builder, not by registration order.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum StageRole {
    Auth,
    CachePolicy,
    Precondition,
}

/// One step of a route pipeline.
///
/// Stages are stateless across invocations and shared between concurrent
/// requests; `apply` mutates only the per-request [`Context`].
#[async_trait]
pub trait Stage: Send + Sync + 'static {
    fn role(&self) -> StageRole;

    async fn apply(&self, ctx: &mut Context) -> StageOutcome;
}

// ── Cache-policy stage ────────────────────────────────────────────────────────

/// The four negotiation dimensions shared caches must key on.
const VARY: &str = "Accept-Language, Accept-Encoding, Accept, Content-Type";

/// Response cache policy attached by the cache-policy stage. Never aborts.
pub enum CachePolicy {
    /// Shared/proxy cacheable for `max_age` seconds.
    Public { max_age: u32 },
    /// No shared caching.
    Private,
}

#[async_trait]
impl Stage for CachePolicy {
    fn role(&self) -> StageRole {
        StageRole::CachePolicy
    }

    async fn apply(&self, ctx: &mut Context) -> StageOutcome {
        match self {
            Self::Public { max_age } => {
                ctx.set_response_header("cache-control", format!("public, max-age={max_age}"));
                ctx.set_response_header("vary", VARY);
            }
            Self::Private => {
                ctx.set_response_header("cache-control", "private");
            }
        }
        ctx.set_charset("utf-8");
        StageOutcome::Continue
    }
}

// ── Precondition stage ────────────────────────────────────────────────────────

/// The reserved conditional-request slot. Passes everything through; a
/// real implementation (ETag / If-Match) aborts with
/// [`Abort::PreconditionFailed`] instead.
pub struct NoPrecondition;

#[async_trait]
impl Stage for NoPrecondition {
    fn role(&self) -> StageRole {
        StageRole::Precondition
    }

    async fn apply(&self, _ctx: &mut Context) -> StageOutcome {
        StageOutcome::Continue
    }
}

// ── RoutePipeline ────────────────────────────────────────────────────────────

/// An ordered stage chain plus one terminal handler, bound to a route.
///
/// Built at bootstrap, immutable afterwards, `Arc`-shared across
/// concurrent requests.
pub struct RoutePipeline {
    stages: Vec<Arc<dyn Stage>>,
    handler: BoxedHandler,
}

/// Why a pipeline run produced no response.
#[derive(Debug)]
pub enum PipelineError {
    /// A stage stopped the chain; the handler never ran.
    Aborted(Abort),
    /// The terminal handler failed. Classified by the error map, not here.
    Handler(Failure),
}

impl RoutePipeline {
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::default()
    }

    /// Runs the chain to completion or first abort, then folds the stages'
    /// response directives into the handler's response.
    pub(crate) async fn execute(&self, mut ctx: Context) -> Result<Response, PipelineError> {
        for stage in &self.stages {
            match stage.apply(&mut ctx).await {
                StageOutcome::Continue => {}
                StageOutcome::Abort(abort) => {
                    tracing::debug!(stage = ?stage.role(), "pipeline aborted");
                    return Err(PipelineError::Aborted(abort));
                }
            }
        }

        let directives = ctx.take_directives();
        let response = self
            .handler
            .call(ctx)
            .await
            .map_err(PipelineError::Handler)?;
        Ok(directives.apply(response))
    }
}

// ── PipelineBuilder ───────────────────────────────────────────────────────────

/// Builds a [`RoutePipeline`] with one slot per role.
///
/// Slot order in source has no effect — execution order is always auth,
/// cache-policy, precondition. Unset slots default to [`CachePolicy::Private`]
/// and [`NoPrecondition`]; a pipeline without an auth slot runs no
/// authorization check at all.
#[derive(Default)]
pub struct PipelineBuilder {
    auth: Option<Arc<dyn Stage>>,
    cache: Option<Arc<dyn Stage>>,
    precondition: Option<Arc<dyn Stage>>,
}

impl PipelineBuilder {
    pub fn auth(mut self, stage: impl Stage) -> Self {
        self.auth = Some(Arc::new(stage));
        self
    }

    pub fn cache(mut self, policy: CachePolicy) -> Self {
        self.cache = Some(Arc::new(policy));
        self
    }

    pub fn precondition(mut self, stage: impl Stage) -> Self {
        self.precondition = Some(Arc::new(stage));
        self
    }

    /// Terminates the builder with the business-logic delegate.
    pub fn handler(self, handler: impl Handler) -> RoutePipeline {
        let mut stages = Vec::with_capacity(3);
        if let Some(auth) = self.auth {
            stages.push(auth);
        }
        stages.push(self.cache.unwrap_or_else(|| Arc::new(CachePolicy::Private)));
        stages.push(self.precondition.unwrap_or_else(|| Arc::new(NoPrecondition)));
        RoutePipeline { stages, handler: handler.into_boxed_handler() }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::method::Method;

    struct DenyAll;

    #[async_trait]
    impl Stage for DenyAll {
        fn role(&self) -> StageRole {
            StageRole::Auth
        }

        async fn apply(&self, _ctx: &mut Context) -> StageOutcome {
            StageOutcome::Abort(Abort::Unauthorized(
                "Unauthorized error: token rejected".to_owned(),
            ))
        }
    }

    fn ctx() -> Context {
        Context::new(
            Method::Get,
            "/api/vehicle-history".to_owned(),
            http::HeaderMap::new(),
            std::collections::HashMap::new(),
            bytes::Bytes::new(),
            "application/vnd.vehicle-history.v1+json".parse().unwrap(),
        )
    }

    fn counting_handler(calls: Arc<AtomicUsize>) -> impl Handler {
        move |ctx: Context| {
            let calls = Arc::clone(&calls);
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, Failure>(Response::media(ctx.media(), b"{}".to_vec()))
            }
        }
    }

    fn header<'a>(response: &'a Response, name: &str) -> Option<&'a str> {
        response
            .headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    #[tokio::test]
    async fn abort_stops_the_chain_before_the_handler() {
        let calls = Arc::new(AtomicUsize::new(0));
        let pipeline = RoutePipeline::builder()
            .auth(DenyAll)
            .cache(CachePolicy::Public { max_age: 600 })
            .handler(counting_handler(Arc::clone(&calls)));

        let err = pipeline.execute(ctx()).await.err().unwrap();
        let PipelineError::Aborted(Abort::Unauthorized(message)) = err else {
            panic!("expected an unauthorized abort");
        };
        assert!(message.contains("token rejected"));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn public_policy_sets_cache_vary_and_charset() {
        let calls = Arc::new(AtomicUsize::new(0));
        let pipeline = RoutePipeline::builder()
            .cache(CachePolicy::Public { max_age: 600 })
            .precondition(NoPrecondition)
            .handler(counting_handler(Arc::clone(&calls)));

        let response = pipeline.execute(ctx()).await.ok().unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(header(&response, "cache-control"), Some("public, max-age=600"));

        let vary = header(&response, "vary").unwrap();
        for dimension in ["Accept-Language", "Accept-Encoding", "Accept", "Content-Type"] {
            assert!(vary.contains(dimension), "missing {dimension} in Vary");
        }

        let content_type = header(&response, "content-type").unwrap();
        assert_eq!(
            content_type,
            "application/vnd.vehicle-history.v1+json; charset=utf-8"
        );
    }

    #[tokio::test]
    async fn private_policy_disallows_shared_caching() {
        let pipeline = RoutePipeline::builder()
            .cache(CachePolicy::Private)
            .handler(|_ctx: Context| async { Ok::<_, Failure>(Response::text("ok")) });

        let response = pipeline.execute(ctx()).await.ok().unwrap();
        assert_eq!(header(&response, "cache-control"), Some("private"));
        assert_eq!(header(&response, "vary"), None);
    }

    #[tokio::test]
    async fn handler_failure_passes_through_unclassified() {
        let pipeline = RoutePipeline::builder().handler(|_ctx: Context| async {
            Err::<Response, _>(Failure::new("vehicle-not-found", "no history"))
        });

        let err = pipeline.execute(ctx()).await.err().unwrap();
        let PipelineError::Handler(failure) = err else {
            panic!("expected a handler failure");
        };
        assert_eq!(failure.kind(), "vehicle-not-found");
    }
}
