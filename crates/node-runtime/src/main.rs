//! # PoP Keyserver
//!
//! ```text
//! keyserver start --config keyserver.toml --peer http://10.0.0.2:8080
//! keyserver generate-config --path keyserver.toml
//! ```
//!
//! Logging is configured from the environment (`KS_LOG_LEVEL`,
//! `KS_LOG_FORMAT`); see `ks-telemetry`.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use ks_telemetry::{init_telemetry, TelemetryConfig};
use node_runtime::{KeyserverNode, NodeConfig, NodeRuntime, OracleMode};
use tokio::signal;
use tracing::info;

#[derive(Parser)]
#[command(author, version, about = "Proof-of-payment metadata keyserver")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a keyserver node
    Start(StartArgs),
    /// Write a configuration file with every default filled in
    GenerateConfig {
        #[arg(short, long, default_value = "keyserver.toml")]
        path: PathBuf,
    },
}

#[derive(Args)]
struct StartArgs {
    /// TOML configuration file; defaults are used when absent
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// HTTP listen address
    #[arg(long)]
    listen: Option<SocketAddr>,

    /// Static peer base URL (repeatable)
    #[arg(long = "peer")]
    peers: Vec<String>,

    /// Use a JSON-RPC ledger node at this URL instead of the devnet chain
    #[arg(long, value_name = "URL")]
    json_rpc: Option<String>,

    /// Store records in RocksDB under this directory
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Confirmations before a record is pushed to peers
    #[arg(long)]
    confirmations: Option<u64>,
}

impl StartArgs {
    fn load_config(&self) -> Result<NodeConfig> {
        let mut config = match &self.config {
            Some(path) => NodeConfig::load(path)?,
            None => NodeConfig::default(),
        };

        if let Some(listen) = self.listen {
            config.server.listen = listen;
        }
        if !self.peers.is_empty() {
            config.gossip.peers = self.peers.clone();
        }
        if let Some(url) = &self.json_rpc {
            config.oracle.mode = OracleMode::JsonRpc;
            config.oracle.url = url.clone();
        }
        if let Some(dir) = &self.data_dir {
            config.store.data_dir = Some(dir.clone());
        }
        if let Some(depth) = self.confirmations {
            config.ledger.confirmation_depth = depth;
        }

        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Start(args) => start(args).await,
        Commands::GenerateConfig { path } => {
            NodeConfig::default().save(&path)?;
            println!("Wrote default configuration to {}", path.display());
            Ok(())
        }
    }
}

async fn start(args: StartArgs) -> Result<()> {
    init_telemetry(&TelemetryConfig::from_env()).context("telemetry initialization failed")?;

    let config = args.load_config()?;
    let node = KeyserverNode::new(config).context("failed to build node")?;
    let mut runtime = NodeRuntime::new(node);
    runtime.start().await?;

    signal::ctrl_c().await.context("failed to listen for Ctrl-C")?;
    info!("Ctrl-C received");
    runtime.shutdown().await;
    Ok(())
}
