//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured tracing events)
//!     → metrics.rs (counters, histograms)
//!
//! Consumers:
//!     → stdout (structured log lines)
//!     → Prometheus scrape endpoint (optional)
//! ```
//!
//! # Design Decisions
//! - Log filtering is environment-driven (`RUST_LOG`) with a sensible
//!   per-binary default
//! - Metric updates are cheap enough for the request hot path

pub mod logging;
pub mod metrics;
