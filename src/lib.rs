//! Standalone deployment adapter for a server-side-rendering web
//! framework's build output.
//!
//! Two halves:
//! - **build time**: [`build::Orchestrator`] packages the framework's
//!   build output (client assets, prerendered pages, compiled server)
//!   into a self-contained deployable directory: copied trees, optional
//!   `.gz`/`.br` precompression, a site manifest, a merged package
//!   descriptor, an emitted WebSocket handler module, and the baked
//!   runtime options.
//! - **run time**: [`http::AdapterServer`] serves that directory. Static
//!   assets and prerendered pages are tried first, then the SSR
//!   fallthrough to the framework server; WebSocket upgrades are driven
//!   against a resolved callback set. [`websocket::DevBridge`] covers
//!   development, where upgrades need their own listener.

// Core subsystems
pub mod assets;
pub mod build;
pub mod config;
pub mod http;
pub mod websocket;

// Cross-cutting concerns
pub mod lifecycle;
pub mod net;
pub mod observability;

pub use build::Orchestrator;
pub use config::{AdapterConfig, RuntimeOptions};
pub use http::{AdapterServer, HandlerChain};
pub use lifecycle::Shutdown;
pub use websocket::{DevBridge, WsCallbacks};
