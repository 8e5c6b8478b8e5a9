//! Runtime server setup.
//!
//! # Responsibilities
//! - Create the Axum router dispatching into the handler chain
//! - Upgrade WebSocket handshakes before the chain runs
//! - Wire up middleware (request id, trace, timeout, body limit)
//! - Bind HTTP and optional HTTPS (rustls) listeners
//! - Convert per-request failures into a fixed-body 500
//!
//! # Data Flow
//! ```text
//! request → middleware stack → entry_handler
//!     ├─ websocket handshake → upgrade → websocket::drive_socket
//!     └─ otherwise → HandlerChain::dispatch → response
//! ```

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::body::Body;
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{ConnectInfo, FromRequestParts, State};
use axum::http::{header, HeaderMap, Request, Response, StatusCode};
use axum::response::IntoResponse;
use axum::routing::any;
use axum::Router;
use axum_server::tls_rustls::RustlsConfig;
use tokio::net::TcpListener;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::config::RuntimeOptions;
use crate::observability::metrics;
use crate::websocket::{drive_socket, ConnectionMeta, ListenerRegistry, WsCallbacks};

use super::chain::HandlerChain;
use super::request::{propagate_request_id_layer, set_request_id_layer};

/// Request timeout; the original adapter had none anywhere, which was an
/// accident of the source rather than a decision.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub chain: Arc<HandlerChain>,
    pub ws: Arc<dyn WsCallbacks>,
    pub registry: ListenerRegistry,
}

/// The standalone server for a packaged build.
pub struct AdapterServer {
    router: Router,
    options: RuntimeOptions,
}

impl AdapterServer {
    /// Create a server over an assembled handler chain.
    pub fn new(options: RuntimeOptions, chain: HandlerChain, ws: Arc<dyn WsCallbacks>) -> Self {
        let state = AppState {
            chain: Arc::new(chain),
            ws,
            registry: ListenerRegistry::default(),
        };
        let router = Self::build_router(&options, state);
        Self { router, options }
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(options: &RuntimeOptions, state: AppState) -> Router {
        Router::new()
            .route("/{*path}", any(entry_handler))
            .route("/", any(entry_handler))
            .with_state(state)
            .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
            .layer(RequestBodyLimitLayer::new(options.max_request_size))
            // Propagate must sit inside set: layer() wraps outward, and the
            // id has to exist on the request before it can be propagated.
            .layer(propagate_request_id_layer())
            .layer(set_request_id_layer())
            .layer(TraceLayer::new_for_http())
    }

    /// Get a reference to the runtime options.
    pub fn options(&self) -> &RuntimeOptions {
        &self.options
    }

    /// The router, for driving the server in tests without a socket.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run on the given listener until shutdown is signalled.
    pub async fn run(self, listener: TcpListener) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "standalone server listening");

        let app = self
            .router
            .into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("standalone server stopped");
        Ok(())
    }

    /// Run a TLS listener with the given rustls config.
    pub async fn run_tls(self, addr: SocketAddr, tls: RustlsConfig) -> Result<(), std::io::Error> {
        tracing::info!(address = %addr, "standalone server listening (tls)");
        let app = self
            .router
            .into_make_service_with_connect_info::<SocketAddr>();
        axum_server::bind_rustls(addr, tls).serve(app).await
    }
}

/// True when the request headers form a WebSocket handshake.
pub fn is_websocket_upgrade(headers: &HeaderMap) -> bool {
    let connection_upgrade = headers
        .get(header::CONNECTION)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_ascii_lowercase().contains("upgrade"))
        .unwrap_or(false);
    let upgrade_websocket = headers
        .get(header::UPGRADE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.eq_ignore_ascii_case("websocket"))
        .unwrap_or(false);
    connection_upgrade && upgrade_websocket
}

/// Entry handler: upgrade WebSocket handshakes, otherwise dispatch into
/// the handler chain.
async fn entry_handler(
    State(state): State<AppState>,
    ConnectInfo(remote): ConnectInfo<SocketAddr>,
    request: Request<Body>,
) -> Response<Body> {
    let start = Instant::now();
    let method = request.method().to_string();

    let request = if is_websocket_upgrade(request.headers()) {
        let (mut parts, body) = request.into_parts();
        match WebSocketUpgrade::from_request_parts(&mut parts, &()).await {
            Ok(upgrade) => {
                let meta = ConnectionMeta::new(
                    parts.uri.to_string(),
                    parts
                        .headers
                        .get(header::ORIGIN)
                        .and_then(|v| v.to_str().ok())
                        .map(String::from),
                    Some(remote),
                    state.registry.clone(),
                );
                let callbacks = state.ws.clone();
                metrics::record_request(&method, StatusCode::SWITCHING_PROTOCOLS.as_u16(), start);
                return upgrade
                    .on_upgrade(move |socket| drive_socket(socket, callbacks, meta))
                    .into_response();
            }
            Err(rejection) => {
                // Malformed handshake; let the chain answer it.
                tracing::debug!(error = %rejection, "websocket handshake rejected");
                Request::from_parts(parts, body)
            }
        }
    } else {
        request
    };

    let response = state.chain.dispatch(request).await;
    metrics::record_request(&method, response.status().as_u16(), start);
    response
}

/// Wait for shutdown signal (Ctrl+C).
async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to install Ctrl+C handler");
        return;
    }
    tracing::info!("shutdown signal received");
}
