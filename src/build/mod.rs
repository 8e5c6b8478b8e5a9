//! Build-time packaging subsystem.
//!
//! # Data Flow
//! ```text
//! framework build output (client/, prerendered/, server/)
//!     → orchestrator.rs
//!         ├─ copy trees into <out>/
//!         ├─ compress.rs (.gz/.br siblings, bounded fan-out)
//!         ├─ manifest.rs (<out>/manifest.json)
//!         ├─ websocket resolver → <out>/server/websockets.js
//!         ├─ package.rs (<out>/package.json)
//!         └─ RuntimeOptions → <out>/server.toml
//! ```
//!
//! # Design Decisions
//! - Build-time only: nothing in this module runs per request
//! - Sibling artifacts fail independently; only output-dir setup aborts

pub mod compress;
pub mod manifest;
pub mod orchestrator;
pub mod package;

pub use compress::{compress_dir, CompressReport};
pub use manifest::SiteManifest;
pub use orchestrator::{BuildError, BuildInputs, BuildReport, Orchestrator};
