//! WebSocket callback set and connection driving.
//!
//! # Responsibilities
//! - Define the normalized callback shape (`open`, `message`, `close`,
//!   `drain`) the resolver produces
//! - Drive an upgraded socket against a callback set
//! - Track live connections in a shared registry
//!
//! # Design Decisions
//! - Callbacks are synchronous and receive a cloneable send handle; slow
//!   work belongs in a spawned task holding a handle clone
//! - The registry is a concurrent map, so connection add/remove needs no
//!   external locking discipline
//! - `drain` is part of the callback shape but is never invoked by this
//!   driver; it is reserved for embedders whose transport reports
//!   writable-again events

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use dashmap::DashMap;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use uuid::Uuid;

/// An inbound message, normalized from the transport frame.
#[derive(Debug, Clone)]
pub enum WsMessage {
    Text(String),
    Binary(Vec<u8>),
}

/// Cloneable handle for sending frames to one connection.
///
/// Sends are queued; a writer task flushes them to the socket. Sending on
/// a closed connection reports `false` and is otherwise harmless.
#[derive(Clone)]
pub struct WsSink {
    tx: mpsc::UnboundedSender<Message>,
}

impl WsSink {
    pub fn send_text(&self, text: impl Into<String>) -> bool {
        let text: String = text.into();
        self.tx.send(Message::Text(text.into())).is_ok()
    }

    pub fn send_binary(&self, bytes: Vec<u8>) -> bool {
        self.tx.send(Message::Binary(bytes.into())).is_ok()
    }
}

/// Shared registry of live connections.
#[derive(Clone, Default)]
pub struct ListenerRegistry {
    inner: Arc<DashMap<Uuid, WsSink>>,
}

impl ListenerRegistry {
    /// Number of live connections.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Send a text frame to every live connection; returns how many
    /// accepted it.
    pub fn broadcast_text(&self, text: &str) -> usize {
        self.inner
            .iter()
            .filter(|entry| entry.value().send_text(text))
            .count()
    }

    fn register(&self, id: Uuid, sink: WsSink) {
        self.inner.insert(id, sink);
    }

    fn remove(&self, id: &Uuid) {
        self.inner.remove(id);
    }
}

/// Per-connection metadata handed to callbacks.
#[derive(Clone)]
pub struct ConnectionMeta {
    /// Connection id (also the registry key).
    pub id: Uuid,
    /// Request URL of the upgrade.
    pub url: String,
    /// `Origin` header of the upgrade, when present.
    pub origin: Option<String>,
    /// Peer address, when known.
    pub remote: Option<SocketAddr>,
    /// Registry shared across all connections on the listener.
    pub registry: ListenerRegistry,
}

impl ConnectionMeta {
    pub fn new(
        url: String,
        origin: Option<String>,
        remote: Option<SocketAddr>,
        registry: ListenerRegistry,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            url,
            origin,
            remote,
            registry,
        }
    }
}

/// The normalized WebSocket callback set.
///
/// Every method has a default no-op; implementors override what they
/// need.
#[allow(unused_variables)]
pub trait WsCallbacks: Send + Sync {
    /// A connection finished its handshake.
    fn open(&self, socket: &WsSink, meta: &ConnectionMeta) {}

    /// A text or binary frame arrived.
    fn message(&self, socket: &WsSink, meta: &ConnectionMeta, message: WsMessage) {}

    /// The connection closed (either side).
    fn close(&self, meta: &ConnectionMeta) {}

    /// The outbound channel is writable again.
    fn drain(&self, socket: &WsSink, meta: &ConnectionMeta) {}
}

/// Delay before the fallback handler sends its demonstration message.
const FALLBACK_DEMO_DELAY: Duration = Duration::from_millis(1500);

/// Built-in handler used when no project handler is found: logs events
/// and sends one demonstration message shortly after open.
#[derive(Debug, Default)]
pub struct FallbackHandler;

impl WsCallbacks for FallbackHandler {
    fn open(&self, socket: &WsSink, meta: &ConnectionMeta) {
        tracing::info!(id = %meta.id, url = %meta.url, "using default websocket handler");
        let socket = socket.clone();
        tokio::spawn(async move {
            tokio::time::sleep(FALLBACK_DEMO_DELAY).await;
            socket.send_text(
                serde_json::json!({ "message": "Sending from server" }).to_string(),
            );
        });
    }

    fn message(&self, _socket: &WsSink, meta: &ConnectionMeta, message: WsMessage) {
        match message {
            WsMessage::Text(text) => tracing::info!(id = %meta.id, %text, "websocket message"),
            WsMessage::Binary(bytes) => {
                tracing::info!(id = %meta.id, len = bytes.len(), "websocket binary message")
            }
        }
    }

    fn close(&self, meta: &ConnectionMeta) {
        tracing::info!(id = %meta.id, "websocket closed");
    }
}

/// Drive an upgraded socket against a callback set until it closes.
///
/// Registers the connection, runs `open`, pumps inbound frames into
/// `message`, and finishes with `close` + deregistration. Outbound frames
/// queue through the [`WsSink`] and are flushed by a writer task.
pub async fn drive_socket(socket: WebSocket, callbacks: Arc<dyn WsCallbacks>, meta: ConnectionMeta) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();
    let sink = WsSink { tx };

    meta.registry.register(meta.id, sink.clone());

    // Writer: ends when every sink clone is gone or the peer goes away.
    tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            if ws_tx.send(message).await.is_err() {
                break;
            }
        }
    });

    callbacks.open(&sink, &meta);

    while let Some(Ok(message)) = ws_rx.next().await {
        match message {
            Message::Text(text) => {
                callbacks.message(&sink, &meta, WsMessage::Text(text.to_string()))
            }
            Message::Binary(bytes) => {
                callbacks.message(&sink, &meta, WsMessage::Binary(bytes.to_vec()))
            }
            Message::Close(_) => break,
            // Ping/pong are handled by the transport.
            _ => {}
        }
    }

    callbacks.close(&meta);
    meta.registry.remove(&meta.id);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_register_and_remove() {
        let registry = ListenerRegistry::default();
        let (tx, _rx) = mpsc::unbounded_channel();
        let id = Uuid::new_v4();
        registry.register(id, WsSink { tx });
        assert_eq!(registry.len(), 1);
        registry.remove(&id);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_broadcast_counts_live_sinks() {
        let registry = ListenerRegistry::default();
        let (tx_live, mut rx_live) = mpsc::unbounded_channel();
        let (tx_dead, rx_dead) = mpsc::unbounded_channel();
        drop(rx_dead);
        registry.register(Uuid::new_v4(), WsSink { tx: tx_live });
        registry.register(Uuid::new_v4(), WsSink { tx: tx_dead });

        assert_eq!(registry.broadcast_text("hello"), 1);
        assert!(matches!(rx_live.try_recv(), Ok(Message::Text(_))));
    }

    #[test]
    fn test_sink_send_after_close() {
        let (tx, rx) = mpsc::unbounded_channel();
        let sink = WsSink { tx };
        drop(rx);
        assert!(!sink.send_text("late"));
    }
}
