//! Tally daemon — entry point for running a tally node.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tally_node::{init_logging, LogFormat, NodeConfig, TallyNode};

#[derive(Parser)]
#[command(name = "tally-daemon", about = "Real-time vote tally and leaderboard node")]
struct Cli {
    /// Path to a TOML configuration file. If provided, file settings
    /// are used as the base; CLI flags and env vars override them.
    #[arg(long, env = "TALLY_CONFIG")]
    config: Option<PathBuf>,

    /// Directory for per-event tally files. Persistence is off when unset.
    #[arg(long, env = "TALLY_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Leaderboard publish interval in milliseconds.
    #[arg(long, env = "TALLY_UPDATE_INTERVAL_MS")]
    update_interval_ms: Option<u64>,

    /// Disable the HTTP API.
    #[arg(long, env = "TALLY_DISABLE_RPC")]
    no_rpc: bool,

    /// HTTP API port.
    #[arg(long, env = "TALLY_RPC_PORT")]
    rpc_port: Option<u16>,

    /// Enable the WebSocket push server.
    #[arg(long, env = "TALLY_ENABLE_WEBSOCKET")]
    websocket: bool,

    /// WebSocket server port.
    #[arg(long, env = "TALLY_WS_PORT")]
    websocket_port: Option<u16>,

    /// Enable the Prometheus metrics endpoint.
    #[arg(long, env = "TALLY_ENABLE_METRICS")]
    metrics: bool,

    /// Log format: "human" or "json".
    #[arg(long, env = "TALLY_LOG_FORMAT")]
    log_format: Option<String>,

    /// Log level: "trace", "debug", "info", "warn", "error".
    #[arg(long, env = "TALLY_LOG_LEVEL")]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand)]
enum Command {
    /// Start the node.
    #[command(name = "node")]
    Node {
        #[command(subcommand)]
        action: NodeAction,
    },
    /// Print the effective configuration as TOML and exit.
    #[command(name = "config")]
    Config,
}

#[derive(clap::Subcommand)]
enum NodeAction {
    /// Run the node until SIGINT/SIGTERM.
    Run,
}

impl Cli {
    fn node_config(&self) -> anyhow::Result<NodeConfig> {
        let mut config = match &self.config {
            Some(path) => NodeConfig::from_toml_file(path)
                .with_context(|| format!("loading config from {}", path.display()))?,
            None => NodeConfig::default(),
        };

        if let Some(dir) = &self.data_dir {
            config.data_dir = Some(dir.clone());
        }
        if let Some(ms) = self.update_interval_ms {
            config.update_interval_ms = ms;
        }
        if self.no_rpc {
            config.enable_rpc = false;
        }
        if let Some(port) = self.rpc_port {
            config.rpc_port = port;
        }
        config.enable_websocket |= self.websocket;
        if let Some(port) = self.websocket_port {
            config.websocket_port = port;
        }
        config.enable_metrics |= self.metrics;
        if let Some(format) = &self.log_format {
            config.log_format = format.clone();
        }
        if let Some(level) = &self.log_level {
            config.log_level = level.clone();
        }

        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = cli.node_config()?;

    match cli.command {
        Command::Config => {
            print!("{}", config.to_toml_string()?);
        }
        Command::Node { action } => match action {
            NodeAction::Run => {
                let format: LogFormat = config.log_format.parse()?;
                init_logging(format, &config.log_level)?;

                tracing::info!(
                    "Starting tally node ({} events, RPC:{}, WS:{})",
                    config.events.len(),
                    if config.enable_rpc {
                        config.rpc_port.to_string()
                    } else {
                        "off".into()
                    },
                    if config.enable_websocket {
                        config.websocket_port.to_string()
                    } else {
                        "off".into()
                    },
                );

                let mut node = TallyNode::new(config)?;
                node.start()?;
                node.wait_for_shutdown().await;

                tracing::info!("Shutdown signal received — stopping node");
                node.stop().await?;

                tracing::info!("tally daemon exited cleanly");
            }
        },
    }

    Ok(())
}
