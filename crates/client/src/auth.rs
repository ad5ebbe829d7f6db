//! Client-credentials token cache with single-flight refresh.
//!
//! The cached token moves through `empty -> valid -> expiring -> valid`.
//! A refresh runs in its own task, so a caller that gives up while waiting
//! never cancels it; every waiter joins the same shared future.

use crate::config::VerifyConfig;
use crate::error::{ClientError, ClientResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};
use url::Url;

const DEFAULT_EXPIRES_IN: i64 = 3600;
/// Longer advertised lifetimes are cached for one day at most.
const MAX_EXPIRES_IN: i64 = 86_400;

/// Token as reported by the token endpoint.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub access_token: String,
    /// Lifetime in seconds.
    pub expires_in: i64,
}

/// Performs one credential exchange.
#[async_trait]
pub trait TokenSource: Send + Sync + 'static {
    async fn fetch(&self) -> ClientResult<IssuedToken>;
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: i64,
    #[serde(default)]
    token_type: Option<String>,
}

fn default_expires_in() -> i64 {
    DEFAULT_EXPIRES_IN
}

/// OAuth2 client-credentials exchange against the tenant token endpoint.
pub struct ClientCredentialsSource {
    http: reqwest::Client,
    token_url: Url,
    client_id: String,
    client_secret: String,
}

impl ClientCredentialsSource {
    pub fn new(config: &VerifyConfig) -> ClientResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.token_timeout)
            .danger_accept_invalid_certs(!config.verify_ssl)
            .build()?;

        Ok(Self {
            http,
            token_url: config.token_url.clone(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
        })
    }
}

#[async_trait]
impl TokenSource for ClientCredentialsSource {
    async fn fetch(&self) -> ClientResult<IssuedToken> {
        info!(token_url = %self.token_url, "Requesting OAuth2 token");

        let response = self
            .http
            .post(self.token_url.clone())
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("scope", "openid"),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let excerpt: String = body.chars().take(200).collect();
            return Err(ClientError::Authentication(format!(
                "token endpoint returned {}: {}",
                status.as_u16(),
                excerpt
            )));
        }

        let parsed: TokenResponse = response.json().await.map_err(|e| {
            ClientError::Authentication(format!("invalid token response: {}", e))
        })?;

        if let Some(token_type) = &parsed.token_type {
            if !token_type.eq_ignore_ascii_case("bearer") {
                debug!(token_type = %token_type, "Unexpected token type");
            }
        }

        Ok(IssuedToken {
            access_token: parsed.access_token,
            expires_in: parsed.expires_in,
        })
    }
}

/// A token handed to a caller.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken {
    pub value: String,
    pub expires_at: Instant,
    /// Set when a refresh failed and the previous, still valid token is
    /// served instead.
    pub degraded: Option<String>,
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessToken")
            .field("value", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .field("degraded", &self.degraded)
            .finish()
    }
}

/// Cache state as reported on the health surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenState {
    Empty,
    Valid,
    Expiring,
    Refreshing,
}

#[derive(Debug, Clone, Serialize)]
pub struct TokenStatus {
    pub state: TokenState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_in_secs: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    pub refresh_count: u64,
    pub failure_count: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

struct CachedToken {
    value: String,
    issued_at: Instant,
    expires_at: Instant,
    refresh_at: Instant,
}

impl CachedToken {
    fn hand_out(&self, degraded: Option<String>) -> AccessToken {
        AccessToken {
            value: self.value.clone(),
            expires_at: self.expires_at,
            degraded,
        }
    }
}

// Errors are carried as strings so the shared output stays `Clone`.
type RefreshFuture = Shared<BoxFuture<'static, Result<AccessToken, String>>>;

#[derive(Default)]
struct TokenCache {
    token: Option<CachedToken>,
    in_flight: Option<RefreshFuture>,
    refresh_count: u64,
    failure_count: u64,
    last_error: Option<String>,
}

struct Inner {
    source: Arc<dyn TokenSource>,
    margin: Duration,
    cache: Mutex<TokenCache>,
}

/// Shared, cloneable handle to the token cache.
#[derive(Clone)]
pub struct TokenManager {
    inner: Arc<Inner>,
}

impl TokenManager {
    pub fn new(source: Arc<dyn TokenSource>, margin: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                source,
                margin,
                cache: Mutex::new(TokenCache::default()),
            }),
        }
    }

    /// Token manager backed by the tenant's client-credentials endpoint.
    pub fn from_config(config: &VerifyConfig) -> ClientResult<Self> {
        let source = ClientCredentialsSource::new(config)?;
        Ok(Self::new(Arc::new(source), config.expiry_margin))
    }

    /// Return a usable bearer token, refreshing it when it is missing or
    /// inside its renewal window.
    pub async fn get_token(&self) -> ClientResult<AccessToken> {
        let refresh = {
            let mut cache = self.inner.cache.lock();
            let now = Instant::now();

            if let Some(token) = &cache.token {
                if now < token.refresh_at {
                    return Ok(token.hand_out(None));
                }
                // Someone else is already refreshing; the old token still works.
                if now < token.expires_at && cache.in_flight.is_some() {
                    return Ok(token.hand_out(None));
                }
            }

            match cache.in_flight.clone() {
                Some(in_flight) => in_flight,
                None => {
                    let refresh = Inner::start_refresh(&self.inner);
                    cache.in_flight = Some(refresh.clone());
                    refresh
                }
            }
        };

        match refresh.await {
            Ok(token) => Ok(token),
            Err(message) => {
                let cache = self.inner.cache.lock();
                match &cache.token {
                    Some(token) if Instant::now() < token.expires_at => {
                        Ok(token.hand_out(Some(format!(
                            "token refresh failed, serving cached token: {}",
                            message
                        ))))
                    }
                    _ => Err(ClientError::Authentication(message)),
                }
            }
        }
    }

    /// Drop the cached token so the next call performs an exchange.
    pub fn invalidate(&self) {
        let mut cache = self.inner.cache.lock();
        if cache.token.take().is_some() {
            debug!("Cached token invalidated");
        }
    }

    pub fn status(&self) -> TokenStatus {
        let cache = self.inner.cache.lock();
        let now = Instant::now();

        let live = cache.token.as_ref().filter(|t| now < t.expires_at);
        let state = if cache.in_flight.is_some() {
            TokenState::Refreshing
        } else {
            match live {
                None => TokenState::Empty,
                Some(token) if now >= token.refresh_at => TokenState::Expiring,
                Some(_) => TokenState::Valid,
            }
        };

        let remaining = live.map(|t| t.expires_at.duration_since(now));
        let expires_at = remaining.and_then(|r| {
            chrono::Duration::from_std(r)
                .ok()
                .map(|r| Utc::now() + r)
        });

        TokenStatus {
            state,
            expires_in_secs: remaining.map(|r| r.as_secs()),
            expires_at,
            refresh_count: cache.refresh_count,
            failure_count: cache.failure_count,
            last_error: cache.last_error.clone(),
        }
    }
}

impl Inner {
    fn start_refresh(inner: &Arc<Inner>) -> RefreshFuture {
        let inner = Arc::clone(inner);
        let task = tokio::spawn(async move { inner.exchange().await });

        async move {
            match task.await {
                Ok(result) => result,
                Err(e) => Err(format!("token refresh task failed: {}", e)),
            }
        }
        .boxed()
        .shared()
    }

    async fn exchange(&self) -> Result<AccessToken, String> {
        let issued_at = Instant::now();
        let result = self.source.fetch().await;

        let mut cache = self.cache.lock();
        cache.in_flight = None;

        let outcome = result.map_err(|e| e.to_string()).and_then(|issued| {
            if issued.expires_in <= 0 {
                return Err(format!(
                    "token endpoint returned non-positive lifetime ({}s)",
                    issued.expires_in
                ));
            }
            if issued.expires_in > MAX_EXPIRES_IN {
                debug!(
                    expires_in = issued.expires_in,
                    cap = MAX_EXPIRES_IN,
                    "Capping advertised token lifetime"
                );
            }
            let lifetime = Duration::from_secs(issued.expires_in.min(MAX_EXPIRES_IN) as u64);
            let expires_at = issued_at
                .checked_add(lifetime)
                .ok_or_else(|| format!("token lifetime of {}s is out of range", issued.expires_in))?;
            if expires_at <= Instant::now() {
                return Err("token expired before it could be cached".to_string());
            }
            Ok(CachedToken {
                value: issued.access_token,
                issued_at,
                expires_at,
                refresh_at: expires_at - self.margin.min(lifetime / 2),
            })
        });

        match outcome {
            Ok(token) => {
                info!(
                    expires_in_secs = token.expires_at.duration_since(token.issued_at).as_secs(),
                    "OAuth2 token acquired"
                );
                let handed = token.hand_out(None);
                cache.token = Some(token);
                cache.refresh_count += 1;
                cache.last_error = None;
                Ok(handed)
            }
            Err(message) => {
                cache.failure_count += 1;
                cache.last_error = Some(message.clone());
                let fallback = cache
                    .token
                    .as_ref()
                    .is_some_and(|t| Instant::now() < t.expires_at);
                if fallback {
                    warn!(error = %message, "Token refresh failed, cached token still valid");
                } else {
                    error!(error = %message, "Token refresh failed with no valid cached token");
                }
                Err(message)
            }
        }
    }
}
