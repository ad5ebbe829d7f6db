use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use verify_client::{VerifyConfig, VerifyOverrides};
use verify_mcp::Gateway;

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8004;

/// Contents of the optional TOML config file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub server: ListenConfig,

    /// Verify settings; anything unset falls back to the environment
    #[serde(default)]
    pub verify: VerifyOverrides,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListenConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
}

impl ServerConfig {
    pub fn load(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            tracing::info!(path = %config_path.display(), "Configuration file not found, using environment");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read configuration file {}", config_path.display()))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse configuration file")
    }

    /// Listen address with CLI values taking precedence over the file.
    pub fn listen_addr(&self, host: Option<String>, port: Option<u16>) -> String {
        let host = host
            .or_else(|| self.server.host.clone())
            .unwrap_or_else(|| DEFAULT_HOST.to_string());
        let port = port.or(self.server.port).unwrap_or(DEFAULT_PORT);
        format!("{}:{}", host, port)
    }

    pub fn verify_config(&self) -> Result<VerifyConfig> {
        VerifyConfig::from_env_with(&self.verify).context("Failed to load Verify configuration")
    }
}

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub gateway: Gateway,
}

impl AppState {
    pub fn new(config: &ServerConfig) -> Result<Self> {
        let verify = config.verify_config()?;
        tracing::info!(tenant = %verify.tenant_host(), "Loaded Verify configuration");
        Ok(Self {
            gateway: Gateway::new(verify)?,
        })
    }
}
