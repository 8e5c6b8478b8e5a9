//! WebSocket handler resolution.
//!
//! # Responsibilities
//! - Locate a user-supplied WebSocket handler from a fixed set of
//!   candidate sources and normalize it into one shape
//! - Detect the project root when the caller does not supply one
//!
//! # Resolution order (first success wins; failures are logged and fall
//! through):
//! 1. explicit native callback set from configuration
//! 2. explicit module specifier (absolute path, `file://` URL, remote
//!    URL, `./`-relative path, or bare name resolved from the project
//!    root), checked by reading the module in the same attempt
//! 3. `src/hooks.server.ts` / `.js` exporting a named `handleWebsocket`
//! 4. the configured candidate file (default `src/websockets.ts`) with a
//!    default export
//! 5. built-in fallback handler
//!
//! # Design Decisions
//! - Check-and-load is a single read attempt; there is no
//!   exists-then-import race
//! - Root detection walks up from the working directory looking for a
//!   project config file; stack inspection is deliberately not used

use std::path::{Path, PathBuf};
use std::sync::Arc;

use url::Url;

use super::handler::{FallbackHandler, WsCallbacks};

/// Which export of a module carries the handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WsExport {
    Default,
    Named(String),
}

/// Where a discovered handler module lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModuleSource {
    /// A file in the project.
    File(PathBuf),
    /// A remote module fetched at build time.
    Remote(Url),
}

/// The resolver's normalized output.
pub enum ResolvedWs {
    /// Native callbacks attached to the running process.
    Runtime(Arc<dyn WsCallbacks>),
    /// A handler module emitted into the build output.
    Module {
        source: ModuleSource,
        export: WsExport,
    },
}

impl std::fmt::Debug for ResolvedWs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResolvedWs::Runtime(_) => f.write_str("Runtime(..)"),
            ResolvedWs::Module { source, export } => f
                .debug_struct("Module")
                .field("source", source)
                .field("export", export)
                .finish(),
        }
    }
}

/// Inputs to resolution.
#[derive(Clone, Default)]
pub struct WsResolveOptions {
    /// Explicit native callback set (highest precedence).
    pub callbacks: Option<Arc<dyn WsCallbacks>>,
    /// Explicit module specifier.
    pub specifier: Option<String>,
    /// Project root; detected when omitted.
    pub project_root: Option<PathBuf>,
    /// Candidate file probed after the hooks file.
    pub candidate_file: Option<String>,
}

/// Default candidate file name (step 4).
pub const DEFAULT_CANDIDATE_FILE: &str = "src/websockets.ts";

/// Names of project config files that mark the project root.
const ROOT_MARKERS: &[&str] = &["svelte.config.js", "svelte.config.ts"];

/// Detect the project root: an explicit root wins; otherwise walk upward
/// from the working directory looking for a project config file; fall
/// back to the working directory itself.
pub fn detect_project_root(explicit: Option<&Path>) -> PathBuf {
    if let Some(root) = explicit {
        return root.to_path_buf();
    }
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let mut dir = cwd.clone();
    loop {
        if ROOT_MARKERS.iter().any(|marker| dir.join(marker).is_file()) {
            return dir;
        }
        if !dir.pop() {
            return cwd;
        }
    }
}

/// Exports found by scanning a module's source text.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ModuleExports {
    pub has_default: bool,
    pub named: Vec<String>,
}

impl ModuleExports {
    pub fn has_named(&self, name: &str) -> bool {
        self.named.iter().any(|n| n == name)
    }
}

/// Scan module source text for its exports.
///
/// Text-level detection is deliberate: the adapter never executes user
/// modules, it only decides which one to emit into the build output.
pub fn scan_module_exports(source: &str) -> ModuleExports {
    let mut exports = ModuleExports::default();
    for line in source.lines() {
        let line = line.trim_start();
        if !line.starts_with("export") {
            continue;
        }
        let rest = line["export".len()..].trim_start();
        if rest.starts_with("default") {
            exports.has_default = true;
        } else if let Some(body) = rest.strip_prefix('{') {
            let body = body.split('}').next().unwrap_or("");
            for item in body.split(',') {
                // `a as b` exports `b`.
                let name = item
                    .rsplit(" as ")
                    .next()
                    .unwrap_or(item)
                    .trim()
                    .trim_matches(|c: char| !c.is_alphanumeric() && c != '_' && c != '$');
                if !name.is_empty() && name != "default" {
                    exports.named.push(name.to_string());
                }
            }
        } else {
            for keyword in ["async function", "function", "const", "let", "var", "class"] {
                if let Some(decl) = rest.strip_prefix(keyword) {
                    let name: String = decl
                        .trim_start()
                        .chars()
                        .take_while(|c| c.is_alphanumeric() || *c == '_' || *c == '$')
                        .collect();
                    if !name.is_empty() {
                        exports.named.push(name);
                    }
                    break;
                }
            }
        }
    }
    exports
}

/// Resolve a module specifier against the project root.
///
/// Supported shapes: absolute path, `file://` URL, remote `http(s)://`
/// URL, `./`-relative path, and bare names resolved from the root.
fn resolve_specifier(spec: &str, root: &Path) -> Result<ModuleSource, String> {
    if let Ok(url) = Url::parse(spec) {
        match url.scheme() {
            "file" => {
                return url
                    .to_file_path()
                    .map(ModuleSource::File)
                    .map_err(|_| format!("invalid file URL: {spec}"));
            }
            "http" | "https" => return Ok(ModuleSource::Remote(url)),
            _ => {}
        }
    }
    let path = Path::new(spec);
    let resolved = if path.is_absolute() {
        path.to_path_buf()
    } else {
        // `./relative` and bare names both resolve from the root.
        root.join(path)
    };
    Ok(ModuleSource::File(resolved))
}

/// Read a local module and scan its exports in one attempt.
fn read_and_scan(path: &Path) -> Result<ModuleExports, std::io::Error> {
    std::fs::read_to_string(path).map(|source| scan_module_exports(&source))
}

/// Resolve the WebSocket handler per the documented precedence.
///
/// Never fails: exhausting every source yields the built-in fallback.
pub fn resolve_ws_handler(options: &WsResolveOptions) -> ResolvedWs {
    // 1. Explicit native callbacks.
    if let Some(callbacks) = &options.callbacks {
        tracing::debug!("websocket handler: explicit callbacks");
        return ResolvedWs::Runtime(callbacks.clone());
    }

    let root = detect_project_root(options.project_root.as_deref());

    // 2. Explicit specifier, checked by loading in the same attempt.
    if let Some(spec) = &options.specifier {
        match resolve_specifier(spec, &root) {
            Ok(ModuleSource::Remote(url)) => {
                tracing::debug!(%url, "websocket handler: remote module");
                return ResolvedWs::Module {
                    source: ModuleSource::Remote(url),
                    export: WsExport::Default,
                };
            }
            Ok(ModuleSource::File(path)) => match read_and_scan(&path) {
                Ok(_) => {
                    tracing::debug!(path = %path.display(), "websocket handler: configured module");
                    return ResolvedWs::Module {
                        source: ModuleSource::File(path),
                        export: WsExport::Default,
                    };
                }
                Err(err) => {
                    tracing::warn!(path = %path.display(), error = %err, "configured websocket module unreadable");
                }
            },
            Err(reason) => tracing::warn!(%spec, %reason, "bad websocket specifier"),
        }
    }

    // 3. Hooks file with a named `handleWebsocket` export.
    for name in ["src/hooks.server.ts", "src/hooks.server.js"] {
        let path = root.join(name);
        match read_and_scan(&path) {
            Ok(exports) if exports.has_named("handleWebsocket") => {
                tracing::debug!(path = %path.display(), "websocket handler: hooks file");
                return ResolvedWs::Module {
                    source: ModuleSource::File(path),
                    export: WsExport::Named("handleWebsocket".to_string()),
                };
            }
            Ok(_) => {}
            Err(err) if err.kind() != std::io::ErrorKind::NotFound => {
                tracing::warn!(path = %path.display(), error = %err, "error reading hooks file");
            }
            Err(_) => {}
        }
    }

    // 4. Project websockets file with a default export.
    let candidate = options
        .candidate_file
        .clone()
        .unwrap_or_else(|| DEFAULT_CANDIDATE_FILE.to_string());
    let path = root.join(&candidate);
    match read_and_scan(&path) {
        Ok(exports) if exports.has_default => {
            tracing::debug!(path = %path.display(), "websocket handler: project file");
            return ResolvedWs::Module {
                source: ModuleSource::File(path),
                export: WsExport::Default,
            };
        }
        Ok(_) => tracing::warn!(path = %path.display(), "websocket file has no default export"),
        Err(err) if err.kind() != std::io::ErrorKind::NotFound => {
            tracing::warn!(path = %path.display(), error = %err, "error reading websocket file");
        }
        Err(_) => {}
    }

    // 5. Fallback.
    tracing::info!("no custom websocket handler found, using fallback");
    ResolvedWs::Runtime(Arc::new(FallbackHandler))
}
