//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection
//!     → server.rs (Axum setup, websocket upgrade sniff, middleware)
//!     → chain.rs (assets → prerendered → SSR, first match wins)
//!     → ssr.rs (origin rewrite, client address, upstream forward)
//!     → response to client
//! ```

pub mod chain;
pub mod request;
pub mod server;
pub mod ssr;

pub use chain::HandlerChain;
pub use server::{is_websocket_upgrade, AdapterServer};
pub use ssr::{derive_client_address, SsrConfig, SsrError, SsrUpstream};
