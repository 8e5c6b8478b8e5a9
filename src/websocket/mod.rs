//! WebSocket subsystem.
//!
//! # Data Flow
//! ```text
//! build time:
//!     resolver.rs probes config + project files
//!         → ResolvedWs (native callbacks, or module to emit)
//!
//! run time:
//!     upgrade request → handler.rs drive_socket
//!         → WsCallbacks (open/message/close), ListenerRegistry
//!
//! development:
//!     bridge.rs second listener (upgrade-or-404)
//!         → config-file watch → stop + full-reload signal
//! ```

pub mod bridge;
pub mod handler;
pub mod resolver;

pub use bridge::{BridgeConfig, BridgeError, DevBridge, DEFAULT_BRIDGE_PORT};
pub use handler::{
    drive_socket, ConnectionMeta, FallbackHandler, ListenerRegistry, WsCallbacks, WsMessage, WsSink,
};
pub use resolver::{
    resolve_ws_handler, ModuleSource, ResolvedWs, WsExport, WsResolveOptions,
};
