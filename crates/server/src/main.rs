use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

mod api;
mod config;

use config::{AppState, ServerConfig};

#[derive(Parser, Debug)]
#[command(name = "verify-gateway")]
#[command(about = "MCP gateway for the IBM Security Verify REST API", long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "verify-gateway.toml")]
    config: PathBuf,

    /// Port to listen on [default: 8004]
    #[arg(short, long, env = "MCP_PORT")]
    port: Option<u16>,

    /// Host to bind to [default: 0.0.0.0]
    #[arg(long)]
    host: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long, env = "LOG_JSON")]
    log_json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());
    if args.log_json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    }

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Starting Verify MCP gateway");

    let config = ServerConfig::load(&args.config)?;
    let addr = config.listen_addr(args.host, args.port);
    let state = AppState::new(&config)?;

    api::serve(&addr, state).await?;

    Ok(())
}
