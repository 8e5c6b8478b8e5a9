//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Shutdown (shutdown.rs):
//!     trigger() → broadcast → every subscribed task winds down
//!
//! Sources: Ctrl+C (runtime server), bridge stop/restart (dev bridge)
//! ```

pub mod shutdown;

pub use shutdown::Shutdown;
