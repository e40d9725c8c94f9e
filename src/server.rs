//! HTTP serving: request dispatch, the accept loop, graceful shutdown.
//!
//! # Graceful shutdown
//!
//! On **SIGTERM** or **Ctrl-C** the server:
//! 1. Immediately stops `listener.accept()` — no new connections are made.
//! 2. Lets every in-flight connection task run to completion.
//! 3. Returns from [`Running::serve`], which lets `main` exit cleanly.
//!
//! Per-request failures stay inside their own dispatch — a pipeline abort
//! or handler failure becomes that request's error response and touches
//! nothing else in flight.

use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use http::StatusCode;
use http_body_util::{BodyExt, Full};
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use tokio::net::TcpListener;
use tracing::{debug, error, info};

use crate::config::Config;
use crate::cors;
use crate::docs;
use crate::error::{BootstrapError, ErrorMap, error_response};
use crate::method::Method;
use crate::negotiate::negotiate;
use crate::pipeline::{Abort, PipelineError};
use crate::registry::{Lookup, RouteRegistry};
use crate::request::Context;
use crate::response::Response;

// ── Dispatcher ────────────────────────────────────────────────────────────────

/// Routes one request end to end: preflight and docs at the edge,
/// everything else through negotiation, registry lookup, and the matched
/// route pipeline, with domain failures classified by the error map.
pub struct Dispatcher {
    registry: RouteRegistry,
    errors: ErrorMap,
    config: Config,
}

impl Dispatcher {
    pub fn new(registry: RouteRegistry, errors: ErrorMap, config: Config) -> Self {
        Self { registry, errors, config }
    }

    /// Handles one request. Generic over the body so tests can drive it
    /// with `Full<Bytes>` while the connection feeds it `Incoming`.
    pub async fn handle<B>(&self, req: http::Request<B>) -> http::Response<Full<Bytes>>
    where
        B: hyper::body::Body<Data = Bytes> + Send,
        B::Error: std::fmt::Display,
    {
        self.route(req).await.into_inner()
    }

    async fn route<B>(&self, req: http::Request<B>) -> Response
    where
        B: hyper::body::Body<Data = Bytes> + Send,
        B::Error: std::fmt::Display,
    {
        // Preflights answer for any path, pipeline-free.
        if req.method() == http::Method::OPTIONS {
            return cors::preflight(req.headers());
        }

        let path = req.uri().path().to_owned();

        if self.config.swagger.enabled && req.method() == http::Method::GET {
            if let Some(rest) = path.strip_prefix(docs::MOUNT) {
                if rest.is_empty() || rest.starts_with('/') {
                    return docs::serve(&self.config.swagger.docs_dir, rest).await;
                }
            }
        }

        let Ok(method) = Method::try_from(req.method()) else {
            return error_response(StatusCode::METHOD_NOT_ALLOWED, "method not allowed");
        };

        let accept = req
            .headers()
            .get(http::header::ACCEPT)
            .and_then(|v| v.to_str().ok());
        let media = match negotiate(accept, &self.config.acceptable) {
            Ok(media) => media.clone(),
            Err(e) => {
                debug!(%method, %path, "not acceptable");
                return error_response(StatusCode::NOT_ACCEPTABLE, &e.to_string());
            }
        };

        let (pipeline, params) = match self.registry.lookup(method, &path, media.major()) {
            Lookup::Matched(pipeline, params) => (pipeline, params),
            Lookup::VersionMismatch => {
                return error_response(
                    StatusCode::NOT_ACCEPTABLE,
                    &format!("version {} is not served", media.major()),
                );
            }
            Lookup::NotFound => return error_response(StatusCode::NOT_FOUND, "no such resource"),
        };

        let (parts, body) = req.into_parts();
        let body = match body.collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(e) => return error_response(StatusCode::BAD_REQUEST, &format!("unreadable body: {e}")),
        };

        let ctx = Context::new(method, path.clone(), parts.headers, params, body, media);

        match pipeline.execute(ctx).await {
            Ok(response) => response,
            Err(PipelineError::Aborted(Abort::Unauthorized(message))) => {
                debug!(%method, %path, "unauthorized");
                error_response(StatusCode::UNAUTHORIZED, &message)
            }
            Err(PipelineError::Aborted(Abort::PreconditionFailed(message))) => {
                error_response(StatusCode::PRECONDITION_FAILED, &message)
            }
            Err(PipelineError::Handler(failure)) => {
                debug!(%method, %path, kind = failure.kind(), "handler failure");
                match self.errors.lookup(failure.kind()) {
                    Some(status) => error_response(status, failure.message()),
                    // Unregistered kinds stay opaque on the wire.
                    None => error_response(StatusCode::INTERNAL_SERVER_ERROR, "unexpected error"),
                }
            }
        }
    }
}

// ── Server ───────────────────────────────────────────────────────────────────

/// The HTTP server, configured but not yet bound.
pub struct Server {
    addr: SocketAddr,
}

impl Server {
    /// Parses `addr` without binding; binding happens in [`Server::start`].
    pub fn bind(addr: &str) -> Result<Self, BootstrapError> {
        let parsed = addr
            .parse()
            .map_err(|source| BootstrapError::InvalidAddress { addr: addr.to_owned(), source })?;
        Ok(Self { addr: parsed })
    }

    /// Binds the port. On success the caller learns the bound port from
    /// [`Running::port`]; on failure the error surfaces here, and nothing
    /// retries it.
    pub async fn start(self, dispatcher: Dispatcher) -> Result<Running, BootstrapError> {
        let listener = TcpListener::bind(self.addr)
            .await
            .map_err(|source| BootstrapError::Bind { addr: self.addr, source })?;
        let port = listener
            .local_addr()
            .map_err(|source| BootstrapError::Bind { addr: self.addr, source })?
            .port();
        Ok(Running { listener, port, dispatcher: Arc::new(dispatcher) })
    }
}

/// A bound server, accepting nothing yet. Drop it to release the port, or
/// call [`serve`](Running::serve) to run until shutdown.
pub struct Running {
    listener: TcpListener,
    port: u16,
    dispatcher: Arc<Dispatcher>,
}

impl Running {
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Starts accepting connections and dispatching them.
    ///
    /// Returns only after a full graceful shutdown (SIGTERM or Ctrl-C,
    /// followed by all in-flight requests completing).
    pub async fn serve(self) {
        let Self { listener, port, dispatcher } = self;

        info!(port, "listening");

        // JoinSet tracks every spawned connection task so we can wait for
        // them all to finish during graceful shutdown.
        let mut tasks = tokio::task::JoinSet::new();

        let shutdown = shutdown_signal();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                // `biased` makes select! check arms top-to-bottom instead of
                // randomly. We check shutdown first so a SIGTERM immediately
                // stops accepting new connections, even if more are queued.
                biased;

                () = &mut shutdown => {
                    info!(in_flight = tasks.len(), "shutdown signal received, draining connections");
                    break;
                }

                res = listener.accept() => {
                    let (stream, remote_addr) = match res {
                        Ok(v) => v,
                        Err(e) => {
                            error!("accept error: {e}");
                            continue;
                        }
                    };

                    let dispatcher = Arc::clone(&dispatcher);
                    // TokioIo adapts tokio's AsyncRead/AsyncWrite to the hyper
                    // IO traits.
                    let io = TokioIo::new(stream);

                    tasks.spawn(async move {
                        // `service_fn` turns a plain async function into a
                        // hyper `Service`. The closure is called once per
                        // request on the connection, not once per connection.
                        let svc = service_fn(move |req| {
                            let dispatcher = Arc::clone(&dispatcher);
                            async move {
                                Ok::<_, std::convert::Infallible>(dispatcher.handle(req).await)
                            }
                        });

                        // `auto::Builder` transparently handles both HTTP/1.1
                        // and HTTP/2 — whatever the client negotiates.
                        if let Err(e) = ConnBuilder::new(TokioExecutor::new())
                            .serve_connection(io, svc)
                            .await
                        {
                            error!(peer = %remote_addr, "connection error: {e}");
                        }
                    });
                }

                // Reap finished connection tasks so the JoinSet does not grow
                // without bound on long-running servers.
                Some(_) = tasks.join_next(), if !tasks.is_empty() => {}
            }
        }

        // Drain: wait for every in-flight connection to finish.
        while tasks.join_next().await.is_some() {}

        info!("stopped");
    }
}

// ── Shutdown signal ───────────────────────────────────────────────────────────

/// Resolves on the first shutdown signal the process receives.
///
/// On Unix this listens for both **SIGTERM** (sent by orchestrators) and
/// **SIGINT** (Ctrl-C, for local dev). On Windows only Ctrl-C is available.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let sigterm = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    // `pending()` is a future that never resolves — on non-Unix platforms
    // the SIGTERM arm is effectively disabled.
    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c   => {}
        () = sigterm  => {}
    }
}
