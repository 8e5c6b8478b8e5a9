//! Build orchestration.
//!
//! # Responsibilities
//! - Sequence the adapter build: clean output, copy asset trees,
//!   precompress, copy the framework server, generate the manifest,
//!   emit the WebSocket handler module, write the package descriptor
//!   and the runtime options
//!
//! # Error Handling
//! - Only output-directory setup is fatal; every other artifact catches
//!   its own I/O failure, logs it with context, and lets siblings
//!   continue. The report lists what was built and what failed.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::build::compress::compress_dir;
use crate::build::manifest::{SiteManifest, DEFAULT_APP_DIR};
use crate::build::package::write_package_descriptor;
use crate::config::{AdapterConfig, RuntimeOptions, WsOption};
use crate::websocket::resolver::{
    detect_project_root, resolve_ws_handler, ModuleSource, ResolvedWs, WsResolveOptions,
};
use crate::websocket::WsCallbacks;

/// Name of the emitted WebSocket handler module.
const WS_MODULE_NAME: &str = "websockets.js";

/// Locations of the framework build output the adapter packages.
#[derive(Debug, Clone)]
pub struct BuildInputs {
    /// Client asset tree.
    pub client: PathBuf,
    /// Prerendered page tree.
    pub prerendered: PathBuf,
    /// Compiled framework server.
    pub server: PathBuf,
}

impl BuildInputs {
    /// Conventional layout: `<root>/{client,prerendered,server}`.
    pub fn from_output_root(root: &Path) -> Self {
        Self {
            client: root.join("client"),
            prerendered: root.join("prerendered"),
            server: root.join("server"),
        }
    }
}

/// Fatal build failures.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl BuildError {
    fn io(context: impl Into<String>) -> impl FnOnce(std::io::Error) -> Self {
        let context = context.into();
        move |source| BuildError::Io { context, source }
    }
}

/// What a build produced and what it had to abandon.
#[derive(Debug, Default)]
pub struct BuildReport {
    /// Artifacts written, in order.
    pub artifacts: Vec<String>,
    /// Artifacts abandoned after an I/O failure.
    pub failures: Vec<String>,
    /// Compression jobs that failed (when precompression ran).
    pub compress_failures: usize,
}

impl BuildReport {
    fn built(&mut self, name: &str) {
        self.artifacts.push(name.to_string());
    }

    fn failed(&mut self, name: &str) {
        self.failures.push(name.to_string());
    }
}

/// Sequences one adapter build.
pub struct Orchestrator {
    config: AdapterConfig,
    inputs: BuildInputs,
    ws_callbacks: Option<Arc<dyn WsCallbacks>>,
}

impl Orchestrator {
    pub fn new(config: AdapterConfig, inputs: BuildInputs) -> Self {
        Self {
            config,
            inputs,
            ws_callbacks: None,
        }
    }

    /// Attach native WebSocket callbacks (highest resolution precedence).
    pub fn with_ws_callbacks(mut self, callbacks: Arc<dyn WsCallbacks>) -> Self {
        self.ws_callbacks = Some(callbacks);
        self
    }

    /// Run the build.
    pub async fn adapt(&self) -> Result<BuildReport, BuildError> {
        let out = PathBuf::from(&self.config.out);
        let project_root = detect_project_root(self.config.project_root.as_deref());
        let mut report = BuildReport::default();

        // Output setup is the one fatal step.
        if out.exists() {
            std::fs::remove_dir_all(&out)
                .map_err(BuildError::io(format!("failed to clean {}", out.display())))?;
        }
        std::fs::create_dir_all(&out)
            .map_err(BuildError::io(format!("failed to create {}", out.display())))?;

        tracing::info!(out = %out.display(), "copying assets");
        if self.config.assets {
            self.copy_step(&self.inputs.client, &out.join("client"), "client", &mut report);
            self.copy_step(
                &self.inputs.prerendered,
                &out.join("prerendered"),
                "prerendered",
                &mut report,
            );
        }

        if let Some(options) = self.config.precompress.options() {
            tracing::info!("compressing assets");
            let client = compress_dir(&out.join("client"), &options).await;
            let prerendered = compress_dir(&out.join("prerendered"), &options).await;
            report.compress_failures = client.failed + prerendered.failed;
        }

        tracing::info!("building server");
        self.copy_step(&self.inputs.server, &out.join("server"), "server", &mut report);

        let manifest = SiteManifest::generate(
            &out.join("client"),
            &out.join("prerendered"),
            DEFAULT_APP_DIR,
        );
        match manifest.write(&out.join("manifest.json")) {
            Ok(()) => report.built("manifest.json"),
            Err(err) => {
                tracing::error!(error = %err, "failed to write manifest");
                report.failed("manifest.json");
            }
        }

        self.emit_ws_module(&out, &project_root, &mut report).await;

        match write_package_descriptor(&out, &project_root) {
            Ok(()) => report.built("package.json"),
            Err(err) => {
                tracing::error!(error = %err, "failed to write package descriptor");
                report.failed("package.json");
            }
        }

        let options = RuntimeOptions::from_adapter(&self.config);
        match toml::to_string_pretty(&options) {
            Ok(text) => match std::fs::write(out.join("server.toml"), text) {
                Ok(()) => report.built("server.toml"),
                Err(err) => {
                    tracing::error!(error = %err, "failed to write server.toml");
                    report.failed("server.toml");
                }
            },
            Err(err) => {
                tracing::error!(error = %err, "failed to serialize runtime options");
                report.failed("server.toml");
            }
        }

        tracing::info!(
            artifacts = report.artifacts.len(),
            failures = report.failures.len(),
            "build finished, start with: standalone-adapter {}",
            out.display()
        );
        Ok(report)
    }

    fn copy_step(&self, src: &Path, dst: &Path, name: &str, report: &mut BuildReport) {
        if !src.is_dir() {
            tracing::warn!(src = %src.display(), "{name} tree missing, skipped");
            report.failed(name);
            return;
        }
        match copy_tree(src, dst) {
            Ok(count) => {
                tracing::debug!(files = count, "{name} tree copied");
                report.built(name);
            }
            Err(err) => {
                tracing::error!(src = %src.display(), error = %err, "failed to copy {name} tree");
                report.failed(name);
            }
        }
    }

    /// Resolve the WebSocket handler and, for module sources, emit the
    /// module into `<out>/server/`.
    async fn emit_ws_module(&self, out: &Path, project_root: &Path, report: &mut BuildReport) {
        let resolve_options = WsResolveOptions {
            callbacks: self.ws_callbacks.clone(),
            specifier: match &self.config.ws {
                Some(WsOption::Specifier(spec)) => Some(spec.clone()),
                _ => None,
            },
            project_root: Some(project_root.to_path_buf()),
            candidate_file: None,
        };
        if matches!(self.config.ws, Some(WsOption::Enabled(false))) {
            tracing::debug!("websocket support disabled");
            return;
        }

        let resolved = resolve_ws_handler(&resolve_options);
        let target = out.join("server").join(WS_MODULE_NAME);
        match resolved {
            ResolvedWs::Runtime(_) => {
                // Native callbacks attach at runtime; nothing to emit.
                tracing::debug!("websocket handler is native, no module emitted");
            }
            ResolvedWs::Module { source, export: _ } => {
                if let Some(parent) = target.parent() {
                    if let Err(err) = std::fs::create_dir_all(parent) {
                        tracing::error!(error = %err, "failed to create server directory");
                        report.failed(WS_MODULE_NAME);
                        return;
                    }
                }
                let result = match source {
                    ModuleSource::File(path) => std::fs::copy(&path, &target).map(|_| ()),
                    ModuleSource::Remote(url) => match fetch_remote_module(&url).await {
                        Ok(contents) => std::fs::write(&target, contents),
                        Err(reason) => Err(std::io::Error::other(reason)),
                    },
                };
                match result {
                    Ok(()) => report.built(WS_MODULE_NAME),
                    Err(err) => {
                        tracing::error!(error = %err, "failed to emit websocket module");
                        report.failed(WS_MODULE_NAME);
                    }
                }
            }
        }
    }
}

/// Fetch a remote handler module at build time.
async fn fetch_remote_module(url: &url::Url) -> Result<String, String> {
    let response = reqwest::get(url.clone()).await.map_err(|e| e.to_string())?;
    if !response.status().is_success() {
        return Err(format!("{} responded {}", url, response.status()));
    }
    response.text().await.map_err(|e| e.to_string())
}

/// Recursively copy `src` into `dst`, returning the file count.
fn copy_tree(src: &Path, dst: &Path) -> std::io::Result<usize> {
    let mut copied = 0;
    for entry in walkdir::WalkDir::new(src) {
        let entry = entry.map_err(std::io::Error::other)?;
        let rel = entry
            .path()
            .strip_prefix(src)
            .map_err(std::io::Error::other)?;
        let target = dst.join(rel);
        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&target)?;
        } else if entry.file_type().is_file() {
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::copy(entry.path(), &target)?;
            copied += 1;
        }
    }
    Ok(copied)
}
