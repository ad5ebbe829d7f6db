// Standalone MCP server binary (stdio transport)

use anyhow::{Context, Result};
use verify_client::VerifyConfig;
use verify_mcp::{Gateway, SERVER_VERSION};

#[tokio::main]
async fn main() -> Result<()> {
    // stdout carries the protocol, so logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    tracing::info!(version = SERVER_VERSION, "Verify MCP server starting");

    let config = VerifyConfig::from_env().context("Failed to load Verify configuration")?;
    tracing::info!(tenant = %config.tenant_host(), "Loaded Verify configuration");

    let gateway = Gateway::new(config)?;
    gateway.server().clone().serve_stdio().await?;

    tracing::info!("stdin closed, shutting down");
    Ok(())
}
