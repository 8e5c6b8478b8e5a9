//! Standalone server entry point.
//!
//! Serves a packaged build directory: baked options from
//! `<build>/server.toml`, environment overrides through the configured
//! prefix, then the handler chain (client assets → prerendered pages →
//! SSR fallthrough) on the resolved listener.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::net::TcpListener;

use standalone_adapter::build::SiteManifest;
use standalone_adapter::config::{loader, EnvSource};
use standalone_adapter::http::{HandlerChain, SsrConfig};
use standalone_adapter::websocket::{FallbackHandler, WsCallbacks};
use standalone_adapter::{net, observability, AdapterServer};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    observability::logging::init("standalone_adapter=debug,tower_http=debug");

    let build_dir = PathBuf::from(
        std::env::args()
            .nth(1)
            .unwrap_or_else(|| "build".to_string()),
    );
    let mut options = loader::load_runtime_options(&build_dir.join("server.toml"))?;

    // Environment overrides, read through the baked prefix. An unknown
    // prefixed variable is a fatal misconfiguration.
    let env = EnvSource::from_env(options.env_prefix.clone());
    env.check_unexpected()?;

    let host = env.get_or("HOST", "0.0.0.0").to_string();
    if let Some(port) = env.get("PORT") {
        options.port = port.parse()?;
    }
    if let Some(depth) = env.get("XFF_DEPTH") {
        options.xff_depth = depth.parse()?;
    }
    if let Some(dev) = env.get("SERVERDEV") {
        options.development = matches!(dev.to_ascii_lowercase().as_str(), "1" | "true");
    }
    if let Some(limit) = env.get("BODY_SIZE_LIMIT") {
        options.max_request_size = limit.parse()?;
    }
    if let Some(port) = env.get("HTTPS_PORT") {
        options.https_port = port.parse()?;
    }

    tracing::info!(
        build_dir = %build_dir.display(),
        port = options.port,
        development = options.development,
        assets = options.assets,
        "configuration loaded"
    );

    if let Some(addr) = &options.metrics_address {
        match addr.parse() {
            Ok(addr) => observability::metrics::init_metrics(addr),
            Err(_) => tracing::error!(metrics_address = %addr, "failed to parse metrics address"),
        }
    }

    let manifest = SiteManifest::load(&build_dir.join("manifest.json"));

    let ssr = SsrConfig {
        address: options.ssr_address.clone(),
        origin: env.get("ORIGIN").map(String::from),
        address_header: env
            .get("ADDRESS_HEADER")
            .map(|s| s.to_ascii_lowercase())
            .filter(|s| !s.is_empty()),
        protocol_header: env
            .get("PROTOCOL_HEADER")
            .map(|s| s.to_ascii_lowercase())
            .filter(|s| !s.is_empty()),
        host_header: env.get_or("HOST_HEADER", "host").to_ascii_lowercase(),
        xff_depth: options.xff_depth,
    };

    let chain = HandlerChain::for_build_dir(&build_dir, &options, &manifest.app_dir, ssr);
    let ws: Arc<dyn WsCallbacks> = Arc::new(FallbackHandler);

    let tls = options.tls.clone();
    let port = options.port;
    let https_port = options.https_port;
    let server = AdapterServer::new(options, chain, ws);

    match tls {
        Some(tls_config) => {
            let rustls = net::load_tls(&tls_config).await?;
            let addr: SocketAddr = format!("{host}:{https_port}").parse()?;
            tracing::info!("Listening on {host}:{https_port}");
            server.run_tls(addr, rustls).await?;
        }
        None => {
            let listener = TcpListener::bind(format!("{host}:{port}")).await?;
            tracing::info!("Listening on {host}:{port}");
            server.run(listener).await?;
        }
    }

    tracing::info!("shutdown complete");
    Ok(())
}
