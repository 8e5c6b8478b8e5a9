//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! build time:
//!     adapter config file (TOML) or CLI flags
//!         → loader.rs (parse & deserialize)
//!         → validation.rs (semantic checks)
//!         → AdapterConfig (validated, immutable)
//!         → orchestrator emits <out>/server.toml (RuntimeOptions)
//!
//! run time:
//!     <out>/server.toml
//!         → RuntimeOptions (baked constants)
//!         → env.rs overrides (prefix-aware, recognized set enforced)
//!         → shared read-only with all subsystems
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a rebuild
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - Unknown prefixed environment variables are a fatal startup error

pub mod env;
pub mod loader;
pub mod schema;
pub mod validation;

pub use env::{EnvSource, EXPECTED_VARS};
pub use schema::{AdapterConfig, CompressOptions, Precompress, RuntimeOptions, TlsConfig, WsOption};
