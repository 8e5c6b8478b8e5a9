//! Configuration schema definitions.
//!
//! This module defines the adapter's build options and the runtime options
//! the build step emits for the standalone server. All types derive Serde
//! traits for deserialization from config files.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Build-time options for the adapter.
///
/// Constructed by merging user input over defaults (serde defaults cover
/// omitted keys); treated as read-only afterward.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdapterConfig {
    /// Output directory for the deployable build.
    pub out: String,

    /// Precompress static trees (`true`, or per-format options).
    pub precompress: Precompress,

    /// Environment variable prefix for the generated server.
    pub env_prefix: String,

    /// Development mode: the runtime probes the filesystem per request.
    pub development: bool,

    /// Derive the request origin from proxy headers instead of a fixed one.
    pub dynamic_origin: bool,

    /// Hops from the end of `x-forwarded-for` to the client address.
    pub xff_depth: u32,

    /// Serve static assets from the runtime server.
    pub assets: bool,

    /// WebSocket handler source (module path, or on/off).
    pub ws: Option<WsOption>,

    /// TLS key material for the HTTPS listener.
    pub tls: Option<TlsConfig>,

    /// Alias for `tls` kept for compatibility with older configs.
    pub ssl: Option<TlsConfig>,

    /// Maximum request body size in bytes.
    pub max_request_size: usize,

    /// HTTP listener port.
    pub port: u16,

    /// HTTPS listener port (used when TLS is configured).
    pub https_port: u16,

    /// Project root for handler discovery; detected when omitted.
    pub project_root: Option<PathBuf>,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            out: "build".to_string(),
            precompress: Precompress::Enabled(false),
            env_prefix: String::new(),
            development: false,
            dynamic_origin: false,
            xff_depth: 1,
            assets: true,
            ws: None,
            tls: None,
            ssl: None,
            max_request_size: 10 * 1024 * 1024,
            port: 80,
            https_port: 443,
            project_root: None,
        }
    }
}

impl AdapterConfig {
    /// The effective TLS configuration (`tls` wins over the `ssl` alias).
    pub fn tls(&self) -> Option<&TlsConfig> {
        self.tls.as_ref().or(self.ssl.as_ref())
    }
}

/// Precompression switch: a plain boolean or per-format options.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum Precompress {
    Enabled(bool),
    Options(CompressOptions),
}

impl Precompress {
    /// Expand to concrete options; `false` yields `None`.
    pub fn options(&self) -> Option<CompressOptions> {
        match self {
            Precompress::Enabled(false) => None,
            Precompress::Enabled(true) => Some(CompressOptions::default()),
            Precompress::Options(opts) => Some(opts.clone()),
        }
    }
}

/// Options for the precompression pass.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CompressOptions {
    /// File extensions to compress.
    pub files: Vec<String>,
    /// Write `.gz` siblings.
    pub gzip: bool,
    /// Write `.br` siblings.
    pub brotli: bool,
}

impl Default for CompressOptions {
    fn default() -> Self {
        Self {
            files: ["html", "js", "json", "css", "svg", "xml", "wasm"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            gzip: true,
            brotli: true,
        }
    }
}

/// WebSocket handler source in config files.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum WsOption {
    /// Discover a handler in the project (or disable entirely).
    Enabled(bool),
    /// Explicit module specifier (path, `file://` URL, or bare name).
    Specifier(String),
}

/// TLS configuration for the HTTPS listener.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct TlsConfig {
    /// Path to certificate file (PEM).
    pub cert: PathBuf,

    /// Path to private key file (PEM).
    pub key: PathBuf,

    /// Optional CA bundle (PEM).
    #[serde(default)]
    pub ca: Option<PathBuf>,
}

/// Options the build step bakes into the output (`server.toml`) for the
/// runtime server. Environment variables override these at startup.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RuntimeOptions {
    /// Environment variable prefix.
    pub env_prefix: String,

    /// Development mode.
    pub development: bool,

    /// Derive origin from proxy headers.
    pub dynamic_origin: bool,

    /// Hops from the end of `x-forwarded-for`.
    pub xff_depth: u32,

    /// Serve static assets.
    pub assets: bool,

    /// Maximum request body size in bytes.
    pub max_request_size: usize,

    /// HTTP listener port.
    pub port: u16,

    /// HTTPS listener port.
    pub https_port: u16,

    /// Address of the framework's SSR server.
    pub ssr_address: String,

    /// Bind address for the Prometheus exporter, when metrics are wanted.
    pub metrics_address: Option<String>,

    /// TLS key material, when the build configured it.
    ///
    /// Last field: TOML requires tables after scalar keys.
    pub tls: Option<TlsConfig>,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        Self {
            env_prefix: String::new(),
            development: false,
            dynamic_origin: false,
            xff_depth: 1,
            assets: true,
            max_request_size: 10 * 1024 * 1024,
            port: 80,
            https_port: 443,
            ssr_address: "127.0.0.1:3000".to_string(),
            metrics_address: None,
            tls: None,
        }
    }
}

impl RuntimeOptions {
    /// Derive the emitted runtime options from the build configuration.
    pub fn from_adapter(config: &AdapterConfig) -> Self {
        Self {
            env_prefix: config.env_prefix.clone(),
            development: config.development,
            dynamic_origin: config.dynamic_origin,
            xff_depth: config.xff_depth,
            assets: config.assets,
            max_request_size: config.max_request_size,
            port: config.port,
            https_port: config.https_port,
            tls: config.tls().cloned(),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AdapterConfig::default();
        assert_eq!(config.out, "build");
        assert_eq!(config.xff_depth, 1);
        assert!(config.assets);
        assert!(config.precompress.options().is_none());
    }

    #[test]
    fn test_precompress_bool_and_options() {
        let config: AdapterConfig = toml::from_str("precompress = true").unwrap();
        let opts = config.precompress.options().unwrap();
        assert!(opts.gzip && opts.brotli);
        assert!(opts.files.contains(&"wasm".to_string()));

        let config: AdapterConfig = toml::from_str(
            r#"
            [precompress]
            gzip = true
            brotli = false
            files = ["html"]
            "#,
        )
        .unwrap();
        let opts = config.precompress.options().unwrap();
        assert!(opts.gzip);
        assert!(!opts.brotli);
        assert_eq!(opts.files, vec!["html".to_string()]);
    }

    #[test]
    fn test_ssl_alias() {
        let config: AdapterConfig = toml::from_str(
            r#"
            [ssl]
            cert = "cert.pem"
            key = "key.pem"
            "#,
        )
        .unwrap();
        assert_eq!(config.tls().unwrap().cert, PathBuf::from("cert.pem"));
    }

    #[test]
    fn test_ws_specifier_forms() {
        let config: AdapterConfig = toml::from_str(r#"ws = "./src/socket.ts""#).unwrap();
        match config.ws {
            Some(WsOption::Specifier(path)) => assert_eq!(path, "./src/socket.ts"),
            other => panic!("unexpected ws option: {other:?}"),
        }

        let config: AdapterConfig = toml::from_str("ws = true").unwrap();
        assert!(matches!(config.ws, Some(WsOption::Enabled(true))));
    }

    #[test]
    fn test_runtime_options_roundtrip() {
        let options = RuntimeOptions {
            env_prefix: "MYAPP_".into(),
            xff_depth: 2,
            ..RuntimeOptions::default()
        };
        let text = toml::to_string(&options).unwrap();
        let parsed: RuntimeOptions = toml::from_str(&text).unwrap();
        assert_eq!(parsed, options);
    }
}
