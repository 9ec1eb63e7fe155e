//! Mock server facade.
//!
//! # Responsibilities
//! - Bind the listener and spawn the accept loop
//! - Serve HTTP/1.1, and HTTP/2 when enabled, over plain TCP or TLS
//! - Dispatch every request through the route registry
//! - Count and snapshot routed requests before their handler runs
//! - Expose registration and inspection to tests
//! - Close gracefully, draining in-flight requests up to a deadline

use std::net::SocketAddr;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use axum::{
    extract::{Request as HttpRequest, State},
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
    Router,
};
use hyper_util::{
    rt::{TokioExecutor, TokioIo},
    server::conn::auto,
    service::TowerToHyperService,
};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::task::JoinHandle;
use tokio_rustls::TlsAcceptor;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::config::{validation::validate_config, ConfigError, ServerConfig};
use crate::http::handler::Handler;
use crate::http::request::Request;
use crate::http::response::ResponseWriter;
use crate::lifecycle::{Shutdown, ShutdownSignal};
use crate::net::{load_tls_acceptor, ConnectionTracker, Listener, ListenerError, TlsError};
use crate::observability::metrics;
use crate::recording::{snapshot, CallLedger, CallRecord};
use crate::routing::{RouteKey, RouteRegistry, TemplateError};

/// Errors surfaced while starting or closing a server.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Listener(#[from] ListenerError),

    #[error(transparent)]
    Tls(#[from] TlsError),
}

/// State shared by every connection.
pub(crate) struct ServerState {
    registry: RouteRegistry,
    max_body_bytes: usize,
}

impl ServerState {
    pub(crate) fn new(max_body_bytes: usize) -> Self {
        Self {
            registry: RouteRegistry::new(CallLedger::new()),
            max_body_bytes,
        }
    }
}

#[derive(Clone)]
struct ConnectionOptions {
    http2: bool,
    tls: Option<TlsAcceptor>,
}

/// A programmable HTTP server for tests.
///
/// ```no_run
/// use mock_upstream::{Method, MockServer, ServerConfig, StatusCode};
///
/// # async fn run() -> Result<(), Box<dyn std::error::Error>> {
/// let server = MockServer::start("127.0.0.1:0", ServerConfig::default()).await?;
/// server.register_handler(Method::POST, "/hooks/{id}", |w, r| {
///     assert_eq!(r.params().by_name("id"), "42");
///     w.set_status_code(StatusCode::ACCEPTED);
/// })?;
///
/// reqwest::Client::new().post(server.url("/hooks/42")).send().await?;
/// assert_eq!(server.call_count(Method::POST, "/hooks/{id}"), 1);
/// server.close().await?;
/// # Ok(())
/// # }
/// ```
pub struct MockServer {
    state: Arc<ServerState>,
    local_addr: SocketAddr,
    scheme: &'static str,
    shutdown: Shutdown,
    shutdown_timeout: Duration,
    tracker: ConnectionTracker,
    accept_task: Mutex<Option<JoinHandle<()>>>,
}

impl MockServer {
    /// Bind `address` and start serving.
    ///
    /// The listener is bound before this returns, so an address that is in
    /// use or invalid fails here rather than on the first request.
    pub async fn start(address: &str, config: ServerConfig) -> Result<Self, ServerError> {
        validate_config(&config).map_err(ConfigError::Validation)?;

        let listener = Listener::bind(address, config.max_connections).await?;
        let local_addr = listener.local_addr();

        let tls = match &config.tls {
            Some(tls) => Some(load_tls_acceptor(tls, config.http2).await?),
            None => None,
        };

        let state = Arc::new(ServerState::new(config.max_body_bytes));
        let router = build_router(Arc::clone(&state));
        let shutdown = Shutdown::new();
        let tracker = ConnectionTracker::new();
        let options = ConnectionOptions {
            http2: config.http2,
            tls,
        };

        let accept_task = tokio::spawn(accept_loop(
            listener,
            router,
            options,
            shutdown.subscribe(),
            tracker.clone(),
        ));

        tracing::info!(
            address = %local_addr,
            http2 = config.http2,
            tls = config.tls.is_some(),
            "Mock server started"
        );

        Ok(Self {
            state,
            local_addr,
            scheme: config.scheme(),
            shutdown,
            shutdown_timeout: config.shutdown_timeout(),
            tracker,
            accept_task: Mutex::new(Some(accept_task)),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// `scheme://host:port` of the bound listener.
    pub fn base_url(&self) -> String {
        format!("{}://{}", self.scheme, self.local_addr)
    }

    /// Absolute URL for `path` on this server.
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url(), path)
    }

    /// Register `handler` for `(method, template)`.
    ///
    /// Registering the same pair again replaces the previous handler. Other
    /// routes keep serving throughout.
    pub fn register_handler<F>(&self, method: Method, template: &str, handler: F) -> Result<(), TemplateError>
    where
        F: Fn(&mut ResponseWriter, &Request) + Send + Sync + 'static,
    {
        self.register(method, template, handler)
    }

    /// Register any [`Handler`] implementor, e.g. a stateful struct.
    pub fn register<H: Handler>(&self, method: Method, template: &str, handler: H) -> Result<(), TemplateError> {
        self.state.registry.register(method, template, Arc::new(handler))
    }

    /// Remove one route. Its recorded calls stay available.
    pub fn unregister_handler(&self, method: Method, template: &str) -> bool {
        self.state.registry.unregister(&method, template)
    }

    /// Calls routed to `(method, template)` since the last reset.
    pub fn call_count(&self, method: Method, template: &str) -> usize {
        self.state.registry.ledger().count(&RouteKey::new(method, template))
    }

    /// Recorded calls for `(method, template)`, oldest first.
    pub fn call_records(&self, method: Method, template: &str) -> Vec<CallRecord> {
        self.state.registry.ledger().records(&RouteKey::new(method, template))
    }

    /// Calls routed to any registered route since the last reset.
    pub fn total_calls(&self) -> usize {
        self.state.registry.ledger().total_calls()
    }

    /// Registered routes in registration order.
    pub fn routes(&self) -> Vec<RouteKey> {
        self.state.registry.routes()
    }

    /// Zero every counter, keeping records and handlers.
    pub fn reset_counts(&self) {
        self.state.registry.ledger().reset_counts();
    }

    /// Zero counters and drop records, keeping handlers.
    pub fn reset_counts_and_records(&self) {
        self.state.registry.ledger().reset_counts_and_records();
    }

    /// Drop handlers, counters and records.
    pub fn reset_all(&self) {
        self.state.registry.reset_all();
    }

    /// Stop accepting and wait for in-flight requests.
    ///
    /// Requests still running after `shutdown_timeout_ms` are abandoned.
    /// Calling this again is a no-op.
    pub async fn close(&self) -> Result<(), ServerError> {
        if !self.shutdown.trigger() {
            tracing::debug!(address = %self.local_addr, "Mock server already closed");
            return Ok(());
        }

        let accept_task = self
            .accept_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(task) = accept_task {
            if let Err(e) = task.await {
                tracing::error!(error = %e, "Accept loop ended abnormally");
            }
        }

        if tokio::time::timeout(self.shutdown_timeout, self.tracker.wait_idle())
            .await
            .is_err()
        {
            tracing::warn!(
                active_connections = self.tracker.active_count(),
                "Shutdown timeout elapsed; abandoning connections"
            );
        }

        tracing::info!(address = %self.local_addr, "Mock server closed");
        Ok(())
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

impl std::fmt::Debug for MockServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockServer")
            .field("local_addr", &self.local_addr)
            .field("scheme", &self.scheme)
            .field("routes", &self.routes())
            .finish_non_exhaustive()
    }
}

/// Build the Axum router. Every request lands in the fallback dispatcher.
pub(crate) fn build_router(state: Arc<ServerState>) -> Router {
    Router::new()
        .fallback(dispatch)
        .with_state(state)
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
}

async fn accept_loop(
    listener: Listener,
    router: Router,
    options: ConnectionOptions,
    mut shutdown: ShutdownSignal,
    tracker: ConnectionTracker,
) {
    loop {
        let accepted = tokio::select! {
            _ = shutdown.recv() => break,
            accepted = listener.accept() => accepted,
        };

        let (stream, peer_addr, permit) = match accepted {
            Ok(conn) => conn,
            Err(e) => {
                tracing::warn!(error = %e, "Accept failed");
                tokio::time::sleep(Duration::from_millis(10)).await;
                continue;
            }
        };

        let guard = tracker.track(peer_addr);
        let router = router.clone();
        let options = options.clone();
        let shutdown = shutdown.clone();

        tokio::spawn(async move {
            let _permit = permit;
            match options.tls {
                Some(acceptor) => match acceptor.accept(stream).await {
                    Ok(stream) => serve_connection(stream, router, options.http2, shutdown).await,
                    Err(e) => {
                        tracing::debug!(
                            connection_id = %guard.id(),
                            peer_addr = %guard.peer_addr(),
                            error = %e,
                            "TLS handshake failed"
                        );
                    }
                },
                None => serve_connection(stream, router, options.http2, shutdown).await,
            }
            drop(guard);
        });
    }

    tracing::debug!(address = %listener.local_addr(), "Accept loop stopped");
}

async fn serve_connection<I>(io: I, router: Router, http2: bool, mut shutdown: ShutdownSignal)
where
    I: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let mut builder = auto::Builder::new(TokioExecutor::new());
    if !http2 {
        builder = builder.http1_only();
    }

    let service = TowerToHyperService::new(router);
    let conn = builder.serve_connection(TokioIo::new(io), service);
    tokio::pin!(conn);

    let mut draining = false;
    loop {
        tokio::select! {
            result = conn.as_mut() => {
                if let Err(e) = result {
                    tracing::debug!(error = %e, "Connection ended with error");
                }
                break;
            }
            _ = shutdown.recv(), if !draining => {
                conn.as_mut().graceful_shutdown();
                draining = true;
            }
        }
    }
}

/// Route a request, record it, then run its handler.
async fn dispatch(State(state): State<Arc<ServerState>>, request: HttpRequest) -> Response {
    let start_time = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    let Some(route) = state.registry.resolve(&method, &path) else {
        tracing::warn!(method = %method, path = %path, "No route matched");
        metrics::record_unmatched(&method);
        return (StatusCode::NOT_FOUND, "404 page not found").into_response();
    };

    let (parts, body) = request.into_parts();
    let body = match axum::body::to_bytes(body, state.max_body_bytes).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(route = %route.key, error = %e, "Failed to read request body");
            return (StatusCode::PAYLOAD_TOO_LARGE, "failed to read request body").into_response();
        }
    };

    let record = snapshot::capture(&parts, &body, &route.params);
    if !state.registry.record(&route, record) {
        // Routes were reset while the body was in flight.
        tracing::warn!(route = %route.key, "Route reset before the request was recorded");
        metrics::record_unmatched(&method);
        return (StatusCode::NOT_FOUND, "404 page not found").into_response();
    }

    tracing::debug!(
        route = %route.key,
        path = %path,
        params = ?route.params,
        "Dispatching request"
    );

    let request = Request::from_parts(parts, body, route.params);
    let handler = route.handler;
    let outcome = tokio::task::spawn_blocking(move || {
        let mut writer = ResponseWriter::new();
        handler.handle(&mut writer, &request);
        writer
    })
    .await;

    let writer = match outcome {
        Ok(writer) => writer,
        Err(e) => {
            tracing::error!(route = %route.key, error = %e, "Handler panicked");
            metrics::record_handler_panic(&route.key);
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    if let Some(delay) = writer.delay() {
        tokio::time::sleep(delay).await;
    }

    let response = writer.into_response();
    metrics::record_request(&route.key, response.status(), start_time);
    response
}
