//! Development-mode WebSocket bridge.
//!
//! # Responsibilities
//! - Run a second listener dedicated to WebSocket upgrades during
//!   development (the primary dev server's upgrade path is not reusable)
//! - Answer non-upgrade requests with 404
//! - Stop the bridge and signal a full reload to the primary dev server
//!   when build configuration files change
//!
//! # Design Decisions
//! - The running instance is an explicit handle (`start`/`stop`/
//!   `restart`), not a process-global; restart replaces the instance
//!   rather than reconfiguring it in place
//! - The full-reload signal is best effort: failures are logged, never
//!   propagated

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use arc_swap::ArcSwapOption;
use axum::body::Body;
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{ConnectInfo, FromRequestParts, State};
use axum::http::{header, Request, Response, StatusCode};
use axum::response::IntoResponse;
use axum::routing::any;
use axum::Router;
use futures_util::SinkExt;
use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message as TungsteniteMessage;

use crate::http::is_websocket_upgrade;
use crate::lifecycle::Shutdown;
use crate::websocket::{drive_socket, ConnectionMeta, ListenerRegistry, WsCallbacks};

/// Bridge configuration.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Bind host for the bridge listener.
    pub host: String,
    /// Bind port (0 picks an ephemeral port, useful in tests).
    pub port: u16,
    /// Build-configuration files whose changes stop the bridge.
    pub watch_paths: Vec<PathBuf>,
    /// Client channel of the primary dev server, for full-reload signals.
    pub dev_server_url: Option<String>,
}

/// Default bridge port, matching the port the dev client connects to.
pub const DEFAULT_BRIDGE_PORT: u16 = 10234;

/// File names that trigger a bridge stop + full reload when changed.
pub const DEFAULT_WATCH_FILES: &[&str] = &[
    "vite.config.js",
    "vite.config.ts",
    "svelte.config.js",
    "svelte.config.ts",
    "src/hooks.server.ts",
];

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: DEFAULT_BRIDGE_PORT,
            watch_paths: DEFAULT_WATCH_FILES.iter().map(PathBuf::from).collect(),
            dev_server_url: None,
        }
    }
}

/// Errors from bridge lifecycle operations.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("failed to bind bridge listener: {0}")]
    Bind(#[from] std::io::Error),

    #[error("failed to watch {path}: {source}")]
    Watch {
        path: String,
        #[source]
        source: notify::Error,
    },
}

/// A running bridge listener.
struct BridgeInstance {
    addr: SocketAddr,
    shutdown: Shutdown,
}

#[derive(Clone)]
struct BridgeState {
    callbacks: Arc<dyn WsCallbacks>,
    registry: ListenerRegistry,
}

/// Dev-mode WebSocket bridge with an explicit instance handle.
pub struct DevBridge {
    callbacks: Arc<dyn WsCallbacks>,
    registry: ListenerRegistry,
    instance: ArcSwapOption<BridgeInstance>,
}

impl DevBridge {
    /// Create a bridge that drives the given callback set.
    pub fn new(callbacks: Arc<dyn WsCallbacks>) -> Self {
        Self {
            callbacks,
            registry: ListenerRegistry::default(),
            instance: ArcSwapOption::from(None),
        }
    }

    /// The shared connection registry.
    pub fn registry(&self) -> &ListenerRegistry {
        &self.registry
    }

    /// Address of the running instance, if any.
    pub fn addr(&self) -> Option<SocketAddr> {
        self.instance.load().as_ref().map(|inst| inst.addr)
    }

    /// Start a listener. A running instance is stopped first: the bridge
    /// never reconfigures in place.
    pub async fn start(&self, config: &BridgeConfig) -> Result<SocketAddr, BridgeError> {
        self.stop();

        let listener = TcpListener::bind((config.host.as_str(), config.port)).await?;
        let addr = listener.local_addr()?;
        let shutdown = Shutdown::new();

        let state = BridgeState {
            callbacks: self.callbacks.clone(),
            registry: self.registry.clone(),
        };
        let app = Router::new()
            .route("/{*path}", any(bridge_handler))
            .route("/", any(bridge_handler))
            .with_state(state)
            .into_make_service_with_connect_info::<SocketAddr>();

        let signal = shutdown.clone();
        tokio::spawn(async move {
            if let Err(err) = axum::serve(listener, app)
                .with_graceful_shutdown(async move { signal.triggered().await })
                .await
            {
                tracing::error!(error = %err, "bridge listener failed");
            }
        });

        tracing::info!(address = %addr, "websocket bridge listening");
        self.instance
            .store(Some(Arc::new(BridgeInstance { addr, shutdown })));
        Ok(addr)
    }

    /// Stop the running instance, if any.
    pub fn stop(&self) {
        if let Some(instance) = self.instance.swap(None) {
            tracing::info!(address = %instance.addr, "stopping websocket bridge");
            instance.shutdown.trigger();
        }
    }

    /// Stop any running instance and start a fresh one with the given
    /// configuration.
    pub async fn restart(&self, config: &BridgeConfig) -> Result<SocketAddr, BridgeError> {
        self.start(config).await
    }

    /// Watch the configured build files; on change, stop the bridge and
    /// send a full-reload signal to the primary dev server.
    ///
    /// The returned watcher must be kept alive for the watch to persist.
    pub fn watch(
        self: &Arc<Self>,
        config: &BridgeConfig,
    ) -> Result<RecommendedWatcher, BridgeError> {
        let bridge = Arc::clone(self);
        let dev_server_url = config.dev_server_url.clone();
        let handle = tokio::runtime::Handle::current();

        let mut watcher = RecommendedWatcher::new(
            move |result: notify::Result<Event>| match result {
                Ok(event) => {
                    if event.kind.is_modify() || event.kind.is_create() {
                        tracing::info!(paths = ?event.paths, "build configuration changed, stopping bridge");
                        bridge.stop();
                        if let Some(url) = dev_server_url.clone() {
                            handle.spawn(send_full_reload(url));
                        }
                    }
                }
                Err(err) => tracing::error!(error = ?err, "bridge watch error"),
            },
            Config::default(),
        )
        .map_err(|source| BridgeError::Watch {
            path: "<watcher>".to_string(),
            source,
        })?;

        for path in &config.watch_paths {
            if !path.exists() {
                continue;
            }
            watcher
                .watch(path, RecursiveMode::NonRecursive)
                .map_err(|source| BridgeError::Watch {
                    path: path.display().to_string(),
                    source,
                })?;
        }
        Ok(watcher)
    }
}

/// Send a `full-reload` message to the dev server's client channel.
/// Best effort: failures are logged and swallowed.
pub async fn send_full_reload(url: String) {
    match tokio_tungstenite::connect_async(url.as_str()).await {
        Ok((mut socket, _)) => {
            let payload = serde_json::json!({ "type": "full-reload", "path": "*" }).to_string();
            if let Err(err) = socket.send(TungsteniteMessage::Text(payload.into())).await {
                tracing::warn!(error = %err, %url, "failed to send full-reload");
            }
            let _ = socket.close(None).await;
        }
        Err(err) => tracing::warn!(error = %err, %url, "failed to reach dev server for full-reload"),
    }
}

/// Upgrade WebSocket handshakes; anything else is 404.
async fn bridge_handler(
    State(state): State<BridgeState>,
    ConnectInfo(remote): ConnectInfo<SocketAddr>,
    request: Request<Body>,
) -> Response<Body> {
    if is_websocket_upgrade(request.headers()) {
        let (mut parts, _body) = request.into_parts();
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
                let callbacks = state.callbacks.clone();
                return upgrade
                    .on_upgrade(move |socket| drive_socket(socket, callbacks, meta))
                    .into_response();
            }
            Err(rejection) => {
                tracing::debug!(error = %rejection, "bridge handshake rejected");
            }
        }
    }
    (StatusCode::NOT_FOUND, "Not Found").into_response()
}
