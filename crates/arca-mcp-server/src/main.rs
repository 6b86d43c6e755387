//! Stdio MCP server exposing the Arca Storage tools.
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::BufReader;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use arca_mcp::{serve_ndjson, McpDispatcher};
use arca_storage::{ArcaStorageClient, ArcaStorageConfig};

const SERVER_NAME: &str = "arca-storage";

#[derive(Debug, Parser)]
#[command(
    name = "arca-mcp-server",
    about = "MCP server exposing Arca Storage file and directory tools over stdio",
    version
)]
struct Cli {
    #[arg(
        long,
        env = "ARCA_API_BASE_URL",
        default_value = "https://staging.arca.cloud",
        help = "Base URL of the Arca Storage REST API"
    )]
    api_base_url: String,

    #[arg(
        long,
        env = "ARCA_API_CLIENT_ID",
        hide_env_values = true,
        help = "Client identifier sent with every storage request"
    )]
    client_id: Option<String>,

    #[arg(
        long,
        env = "ARCA_API_CLIENT_SECRET",
        hide_env_values = true,
        help = "Client secret sent with every storage request"
    )]
    client_secret: Option<String>,

    #[arg(
        long,
        env = "ARCA_DIRECTORY_ID",
        help = "Directory applied when a backup does not name one"
    )]
    directory_id: Option<String>,

    #[arg(
        long,
        env = "ARCA_STORAGE_TIMEOUT_MS",
        default_value_t = 30_000,
        help = "Timeout for storage API requests in milliseconds"
    )]
    storage_timeout_ms: u64,
}

// stdout carries the protocol frames, so tracing has to stay on stderr.
fn init_tracing() {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::WARN.into())
        .from_env_lossy();
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
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
    let config = ArcaStorageConfig {
        api_base: cli.api_base_url,
        client_id: cli.client_id.unwrap_or_default(),
        client_secret: cli.client_secret.unwrap_or_default(),
        default_directory_id: cli.directory_id,
        request_timeout_ms: cli.storage_timeout_ms,
    };
    let storage = ArcaStorageClient::new(config).context(
        "failed to construct the storage client; set ARCA_API_CLIENT_ID and ARCA_API_CLIENT_SECRET",
    )?;
    let dispatcher = McpDispatcher::new(SERVER_NAME, env!("CARGO_PKG_VERSION"), Arc::new(storage));

    let stdin = BufReader::new(tokio::io::stdin());
    let stdout = tokio::io::stdout();
    let report = serve_ndjson(&dispatcher, stdin, stdout).await?;
    tracing::info!(
        "served {} frame(s) with {} error(s)",
        report.processed_frames,
        report.error_count
    );
    Ok(())
}
