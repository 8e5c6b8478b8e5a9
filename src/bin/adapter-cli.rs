use std::path::PathBuf;
use std::sync::Arc;

use clap::{ArgAction, Parser, Subcommand};

use standalone_adapter::build::{compress_dir, BuildInputs, Orchestrator};
use standalone_adapter::config::{loader, AdapterConfig, CompressOptions, Precompress, WsOption};
use standalone_adapter::observability;
use standalone_adapter::websocket::bridge::DEFAULT_WATCH_FILES;
use standalone_adapter::websocket::resolver::detect_project_root;
use standalone_adapter::websocket::{
    resolve_ws_handler, BridgeConfig, DevBridge, FallbackHandler, WsCallbacks, WsResolveOptions,
};

#[derive(Parser)]
#[command(name = "adapter-cli")]
#[command(about = "Build tooling for the standalone adapter", long_about = None)]
struct Cli {
    /// Adapter configuration file (TOML); defaults apply when absent.
    #[arg(short, long, default_value = "adapter.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Package the framework build output into a deployable directory
    Build {
        /// Directory containing client/, prerendered/ and server/
        #[arg(short, long, default_value = "output")]
        input: PathBuf,

        /// Override the configured output directory
        #[arg(short, long)]
        out: Option<String>,

        /// Force precompression on
        #[arg(long)]
        precompress: bool,
    },
    /// Precompress a directory in place (writes .gz/.br siblings)
    Compress {
        dir: PathBuf,

        #[arg(long, default_value_t = true, action = ArgAction::Set)]
        gzip: bool,

        #[arg(long, default_value_t = true, action = ArgAction::Set)]
        brotli: bool,
    },
    /// Show which WebSocket handler the build would resolve
    ResolveWs {
        /// Project root to probe (detected when omitted)
        #[arg(long)]
        project_root: Option<PathBuf>,
    },
    /// Run the development WebSocket bridge until interrupted
    DevBridge {
        /// Bridge port (the port the dev client connects to)
        #[arg(long, default_value_t = standalone_adapter::websocket::DEFAULT_BRIDGE_PORT)]
        port: u16,

        /// Client channel of the primary dev server, for full-reload signals
        #[arg(long)]
        dev_server_url: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    observability::logging::init("standalone_adapter=info");
    let cli = Cli::parse();

    let config = if cli.config.exists() {
        loader::load_config(&cli.config)?
    } else {
        AdapterConfig::default()
    };

    match cli.command {
        Commands::Build {
            input,
            out,
            precompress,
        } => {
            let mut config = config;
            if let Some(out) = out {
                config.out = out;
            }
            if precompress {
                config.precompress = Precompress::Enabled(true);
            }

            let inputs = BuildInputs::from_output_root(&input);
            let report = Orchestrator::new(config, inputs).adapt().await?;

            for artifact in &report.artifacts {
                println!("built: {artifact}");
            }
            if !report.failures.is_empty() || report.compress_failures > 0 {
                for failure in &report.failures {
                    eprintln!("failed: {failure}");
                }
                if report.compress_failures > 0 {
                    eprintln!("failed: {} compression jobs", report.compress_failures);
                }
                std::process::exit(1);
            }
        }
        Commands::Compress { dir, gzip, brotli } => {
            let options = CompressOptions {
                gzip,
                brotli,
                ..CompressOptions::default()
            };
            let report = compress_dir(&dir, &options).await;
            println!("{} siblings written, {} failed", report.written, report.failed);
            if report.failed > 0 {
                std::process::exit(1);
            }
        }
        Commands::ResolveWs { project_root } => {
            let resolved = resolve_ws_handler(&WsResolveOptions {
                specifier: match &config.ws {
                    Some(WsOption::Specifier(spec)) => Some(spec.clone()),
                    _ => None,
                },
                project_root: project_root.or(config.project_root.clone()),
                ..WsResolveOptions::default()
            });
            println!("{resolved:?}");
        }
        Commands::DevBridge {
            port,
            dev_server_url,
        } => {
            let root = detect_project_root(config.project_root.as_deref());
            let bridge_config = BridgeConfig {
                port,
                watch_paths: DEFAULT_WATCH_FILES.iter().map(|f| root.join(f)).collect(),
                dev_server_url,
                ..BridgeConfig::default()
            };

            let callbacks: Arc<dyn WsCallbacks> = Arc::new(FallbackHandler);
            let bridge = Arc::new(DevBridge::new(callbacks));
            bridge.start(&bridge_config).await?;
            let _watcher = bridge.watch(&bridge_config)?;

            tokio::signal::ctrl_c().await?;
            bridge.stop();
        }
    }

    Ok(())
}
