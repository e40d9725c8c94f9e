//! Terminal-handler trait and type erasure.
//!
//! # How async handlers are stored
//!
//! A route pipeline ends in exactly one handler, and the registry needs to
//! hold handlers of *different* concrete types uniformly. Rust collections
//! can only hold one concrete type, so we use **trait objects**
//! (`dyn ErasedHandler`) to hide the concrete handler type behind a common
//! interface.
//!
//! The chain from user code to vtable call is:
//!
//! ```text
//! async fn check(ctx: Context) -> Result<Response, Failure> { … }
//!        ↓ PipelineBuilder::handler(check)
//! check.into_boxed_handler()                       ← Handler blanket impl
//!        ↓
//! Arc::new(FnHandler(check))                       ← heap-allocated wrapper
//!        ↓  stored as BoxedHandler = Arc<dyn ErasedHandler>
//! handler.call(ctx)  at request time               ← one vtable dispatch
//! ```
//!
//! The only runtime cost per request is one Arc clone (atomic inc) plus
//! one virtual call — negligible compared to network I/O.
//!
//! The pipeline does not interpret the handler's error: a [`Failure`] flows
//! out unchanged and the dispatcher classifies it through the error map.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::error::Failure;
use crate::request::Context;
use crate::response::{IntoResponse, Response};

// ── Internal types ────────────────────────────────────────────────────────────

/// A heap-allocated, type-erased future resolving to the handler outcome.
///
/// `Pin<Box<…>>` is required because the async runtime must be able to poll
/// the future in-place; `Send + 'static` let tokio move it across threads.
pub(crate) type BoxFuture =
    Pin<Box<dyn Future<Output = Result<Response, Failure>> + Send + 'static>>;

/// Internal dispatch interface.
///
/// `#[doc(hidden)] pub` rather than `pub(crate)` because it appears in the
/// return type of the public `Handler` trait's `into_boxed_handler` method.
#[doc(hidden)]
pub trait ErasedHandler {
    fn call(&self, ctx: Context) -> BoxFuture;
}

/// A heap-allocated, type-erased handler shared across concurrent requests.
#[doc(hidden)]
pub type BoxedHandler = Arc<dyn ErasedHandler + Send + Sync + 'static>;

// ── Public Handler trait ──────────────────────────────────────────────────────

/// Implemented for every valid terminal handler.
///
/// You never implement this yourself. It is automatically satisfied for any
/// `async fn` with the signature:
///
/// ```text
/// async fn name(ctx: Context) -> Result<impl IntoResponse, Failure>
/// ```
///
/// (a plain `Response` return also works — see [`IntoOutcome`]).
///
/// The trait is **sealed** (via the private `Sealed` supertrait): only the
/// blanket impl below can satisfy it.
pub trait Handler: private::Sealed + Send + Sync + 'static {
    #[doc(hidden)]
    fn into_boxed_handler(self) -> BoxedHandler;
}

/// The sealing module. Because `Sealed` is private, external crates cannot
/// name it and therefore cannot implement `Handler` on their own types.
mod private {
    pub trait Sealed {}
}

// ── Handler outcome conversion ────────────────────────────────────────────────

/// Conversion of a handler's return value into the pipeline outcome.
pub trait IntoOutcome {
    fn into_outcome(self) -> Result<Response, Failure>;
}

/// Infallible handlers return the response directly.
impl IntoOutcome for Response {
    fn into_outcome(self) -> Result<Response, Failure> {
        Ok(self)
    }
}

/// Fallible handlers return `Result<_, Failure>`; the error is classified
/// by the error map, never by the pipeline.
impl<R: IntoResponse> IntoOutcome for Result<R, Failure> {
    fn into_outcome(self) -> Result<Response, Failure> {
        self.map(IntoResponse::into_response)
    }
}

// ── Blanket implementations ───────────────────────────────────────────────────

impl<F, Fut, R> private::Sealed for F
where
    F: Fn(Context) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoOutcome + Send + 'static,
{
}

impl<F, Fut, R> Handler for F
where
    F: Fn(Context) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoOutcome + Send + 'static,
{
    fn into_boxed_handler(self) -> BoxedHandler {
        Arc::new(FnHandler(self))
    }
}

// ── Concrete wrapper ──────────────────────────────────────────────────────────

/// Newtype wrapper that holds a concrete handler `F` and implements
/// [`ErasedHandler`], bridging the typed world to the trait-object world.
struct FnHandler<F>(F);

impl<F, Fut, R> ErasedHandler for FnHandler<F>
where
    F: Fn(Context) -> Fut + Send + Sync,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoOutcome + Send + 'static,
{
    fn call(&self, ctx: Context) -> BoxFuture {
        let fut = (self.0)(ctx);
        Box::pin(async move { fut.await.into_outcome() })
    }
}
