//! HTTP and WebSocket bridge in front of a spawned MCP server subprocess.
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use arca_gateway::{run_bridge_server, BridgeServerState};
use arca_rpc::{McpBridge, RpcBridgeConfig};

#[derive(Debug, Parser)]
#[command(
    name = "arca-bridge",
    about = "HTTP and WebSocket bridge in front of the Arca Storage MCP server",
    version
)]
struct Cli {
    #[arg(
        long,
        env = "ARCA_BRIDGE_BIND",
        default_value = "127.0.0.1:8081",
        help = "Address the bridge server listens on"
    )]
    bind: String,

    #[arg(
        long,
        env = "ARCA_MCP_SERVER_COMMAND",
        default_value = "arca-mcp-server",
        help = "Command line used to spawn the MCP server subprocess"
    )]
    server_command: String,

    #[arg(
        long,
        env = "ARCA_RPC_TIMEOUT_MS",
        default_value_t = 30_000,
        help = "Timeout for forwarded MCP requests in milliseconds"
    )]
    request_timeout_ms: u64,
}

fn init_tracing() {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::WARN.into())
        .from_env_lossy();
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    run(cli).await
}

async fn run(cli: Cli) -> Result<()> {
    let config = bridge_config(&cli)?;
    let bridge = McpBridge::start(config)
        .await
        .context("failed to start the MCP server subprocess")?;
    if let Some(pid) = bridge.subprocess_pid() {
        println!("arca-mcp-server running (pid {pid})");
    }

    let state = Arc::new(BridgeServerState { bridge });
    run_bridge_server(&cli.bind, state).await
}

fn bridge_config(cli: &Cli) -> Result<RpcBridgeConfig> {
    let words = shell_words::split(&cli.server_command)
        .context("failed to parse the MCP server command line")?;
    let Some((program, args)) = words.split_first() else {
        bail!("MCP server command must not be empty");
    };
    let mut config = RpcBridgeConfig::new(program.clone());
    config.args = args.to_vec();
    config.request_timeout_ms = cli.request_timeout_ms;
    Ok(config)
}
