//! Configuration types for the Verify client.

use crate::error::{ClientError, ClientResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use url::Url;

/// Path of the tenant's OAuth2 token endpoint.
pub const DEFAULT_TOKEN_PATH: &str = "/v1.0/endpoint/default/token";

/// Connection settings for one Verify tenant.
#[derive(Clone)]
pub struct VerifyConfig {
    /// Tenant root, e.g. `https://acme.verify.ibm.com`.
    pub tenant_url: Url,
    /// API client id used for the client-credentials grant.
    pub client_id: String,
    /// API client secret. Never logged.
    pub client_secret: String,
    /// OAuth2 token endpoint.
    pub token_url: Url,
    /// Validate TLS certificates.
    pub verify_ssl: bool,
    /// Timeout for proxied API calls.
    pub timeout: Duration,
    /// Timeout for the token exchange.
    pub token_timeout: Duration,
    /// Safety buffer subtracted from the reported token lifetime.
    pub expiry_margin: Duration,
}

impl fmt::Debug for VerifyConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VerifyConfig")
            .field("tenant_url", &self.tenant_url.as_str())
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("token_url", &self.token_url.as_str())
            .field("verify_ssl", &self.verify_ssl)
            .field("timeout", &self.timeout)
            .field("token_timeout", &self.token_timeout)
            .field("expiry_margin", &self.expiry_margin)
            .finish()
    }
}

/// Optional settings read from a config file; unset fields fall back to the
/// environment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VerifyOverrides {
    pub tenant: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub token_url: Option<String>,
    pub verify_ssl: Option<bool>,
    pub timeout_secs: Option<u64>,
    pub token_timeout_secs: Option<u64>,
    pub expiry_margin_secs: Option<u64>,
}

impl VerifyConfig {
    /// Create a configuration with defaults for everything but the credentials.
    pub fn new(
        tenant_url: &str,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> ClientResult<Self> {
        let tenant_url = parse_tenant(tenant_url)?;
        let token_url = default_token_url(&tenant_url)?;
        Ok(Self {
            tenant_url,
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            token_url,
            verify_ssl: true,
            timeout: Duration::from_secs(120),
            token_timeout: Duration::from_secs(30),
            expiry_margin: Duration::from_secs(30),
        })
    }

    /// Load from `VERIFY_TENANT`, `API_CLIENT_ID`, `API_CLIENT_SECRET` and
    /// the optional tuning variables.
    pub fn from_env() -> ClientResult<Self> {
        Self::from_sources(&VerifyOverrides::default(), |key| std::env::var(key).ok())
    }

    /// Load with file overrides taking precedence over the environment.
    pub fn from_env_with(overrides: &VerifyOverrides) -> ClientResult<Self> {
        Self::from_sources(overrides, |key| std::env::var(key).ok())
    }

    /// Load from overrides and an arbitrary variable lookup.
    pub fn from_sources<F>(overrides: &VerifyOverrides, lookup: F) -> ClientResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let tenant = overrides
            .tenant
            .clone()
            .or_else(|| var("VERIFY_TENANT"))
            .ok_or_else(|| ClientError::Config("VERIFY_TENANT is not set".to_string()))?;
        let client_id = overrides
            .client_id
            .clone()
            .or_else(|| var("API_CLIENT_ID"))
            .ok_or_else(|| ClientError::Config("API_CLIENT_ID is not set".to_string()))?;
        let client_secret = overrides
            .client_secret
            .clone()
            .or_else(|| var("API_CLIENT_SECRET"))
            .ok_or_else(|| ClientError::Config("API_CLIENT_SECRET is not set".to_string()))?;

        let mut config = Self::new(&tenant, client_id, client_secret)?;

        if let Some(token_url) = overrides.token_url.clone().or_else(|| var("VERIFY_TOKEN_URL")) {
            config.token_url = Url::parse(token_url.trim())?;
        }

        config.verify_ssl = match overrides.verify_ssl {
            Some(flag) => flag,
            None => var("VERIFY_SSL")
                .map(|v| parse_bool("VERIFY_SSL", &v))
                .transpose()?
                .unwrap_or(true),
        };

        if let Some(secs) = secs_setting(overrides.timeout_secs, var("VERIFY_TIMEOUT_SECS"), "VERIFY_TIMEOUT_SECS")? {
            config.timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = secs_setting(
            overrides.token_timeout_secs,
            var("VERIFY_TOKEN_TIMEOUT_SECS"),
            "VERIFY_TOKEN_TIMEOUT_SECS",
        )? {
            config.token_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = secs_setting(
            overrides.expiry_margin_secs,
            var("VERIFY_TOKEN_EXPIRY_MARGIN_SECS"),
            "VERIFY_TOKEN_EXPIRY_MARGIN_SECS",
        )? {
            config.expiry_margin = Duration::from_secs(secs);
        }

        Ok(config)
    }

    /// Absolute URL for an API path under the tenant root.
    pub fn api_url(&self, path: &str) -> ClientResult<Url> {
        let base = self.tenant_url.as_str().trim_end_matches('/');
        let path = path.trim_start_matches('/');
        Ok(Url::parse(&format!("{}/{}", base, path))?)
    }

    /// Tenant host, for log lines.
    pub fn tenant_host(&self) -> &str {
        self.tenant_url.host_str().unwrap_or("unknown")
    }
}

fn parse_tenant(raw: &str) -> ClientResult<Url> {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Err(ClientError::Config("tenant URL is empty".to_string()));
    }
    let url = Url::parse(trimmed)?;
    if url.scheme() != "https" && url.scheme() != "http" {
        return Err(ClientError::Config(format!(
            "tenant URL must be http(s), got {}",
            url.scheme()
        )));
    }
    Ok(url)
}

fn default_token_url(tenant: &Url) -> ClientResult<Url> {
    let base = tenant.as_str().trim_end_matches('/');
    Ok(Url::parse(&format!("{}{}", base, DEFAULT_TOKEN_PATH))?)
}

fn parse_bool(key: &str, value: &str) -> ClientResult<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        other => Err(ClientError::Config(format!("{} must be a boolean, got {}", key, other))),
    }
}

fn secs_setting(file: Option<u64>, env: Option<String>, key: &str) -> ClientResult<Option<u64>> {
    if file.is_some() {
        return Ok(file);
    }
    env.map(|v| {
        v.trim()
            .parse::<u64>()
            .map_err(|_| ClientError::Config(format!("{} must be a number of seconds, got {}", key, v)))
    })
    .transpose()
}
