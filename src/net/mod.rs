//! Network helpers for the runtime server.

pub mod tls;

pub use tls::load_tls;
