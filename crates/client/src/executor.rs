//! Authenticated HTTP executor for the Verify REST API.

use crate::auth::TokenManager;
use crate::config::VerifyConfig;
use crate::error::{ClientError, ClientResult};
use reqwest::{header, Client, Response, StatusCode};
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};
use verify_core::HttpMethod;

const SCIM_PATHS: [&str; 4] = ["/v2.0/Users", "/v2.0/Groups", "/v2.0/Me", "/v2.0/Bulk"];
const SCIM_CONTENT_TYPE: &str = "application/scim+json";
const JSON_CONTENT_TYPE: &str = "application/json";

const LOGIN_SNIFF_CHARS: usize = 4000;
const LOGIN_MARKERS: [&str; 4] = [
    "<html",
    "/idaas/mtfim/sps/idaas/login",
    "runtime=true",
    "location.href",
];
const TEXT_BODY_CHARS: usize = 2000;

/// One outbound API call.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: HttpMethod,
    /// Resolved path, e.g. `/v2.0/Users/abc`.
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl ApiRequest {
    pub fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
        }
    }

    /// Add query parameters from a JSON object. Arrays repeat the key;
    /// nulls are skipped.
    pub fn with_query_map(mut self, params: &Map<String, Value>) -> Self {
        for (key, value) in params {
            match value {
                Value::Null => {}
                Value::Array(items) => {
                    for item in items {
                        self.query.push((key.clone(), query_text(item)));
                    }
                }
                other => self.query.push((key.clone(), query_text(other))),
            }
        }
        self
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    fn is_scim(&self) -> bool {
        SCIM_PATHS.iter().any(|p| self.path.contains(p))
    }
}

fn query_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Upstream response, already shaped for tool output.
#[derive(Debug, Clone, Serialize)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

/// Verify API client. Cheap to clone.
#[derive(Clone)]
pub struct VerifyClient {
    http: Client,
    config: Arc<VerifyConfig>,
    tokens: TokenManager,
}

impl VerifyClient {
    pub fn new(config: VerifyConfig) -> ClientResult<Self> {
        let tokens = TokenManager::from_config(&config)?;
        Self::with_tokens(config, tokens)
    }

    /// Client sharing an existing token manager.
    pub fn with_tokens(config: VerifyConfig, tokens: TokenManager) -> ClientResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .danger_accept_invalid_certs(!config.verify_ssl)
            .build()?;

        Ok(Self {
            http,
            config: Arc::new(config),
            tokens,
        })
    }

    pub fn config(&self) -> &VerifyConfig {
        &self.config
    }

    pub fn tokens(&self) -> &TokenManager {
        &self.tokens
    }

    /// Execute a request with a bearer token, retrying once on 401.
    pub async fn execute(&self, request: &ApiRequest) -> ClientResult<ApiResponse> {
        let url = self.config.api_url(&request.path)?;
        debug!(method = %request.method, url = %url, "Verify API request");

        let token = self.tokens.get_token().await?;
        let mut warning = token.degraded.clone();
        let mut response = self.send(request, url.clone(), &token.value).await?;

        if response.status() == StatusCode::UNAUTHORIZED {
            info!(path = %request.path, "Got 401, refreshing token and retrying");
            self.tokens.invalidate();
            let token = self.tokens.get_token().await?;
            warning = token.degraded.clone();
            response = self.send(request, url, &token.value).await?;
        }

        if let Some(warning) = &warning {
            warn!(path = %request.path, warning = %warning, "Request used a degraded token");
        }

        let (status, body) = Self::read_body(response).await?;
        Ok(ApiResponse {
            status,
            body,
            warning,
        })
    }

    async fn send(&self, request: &ApiRequest, url: url::Url, token: &str) -> ClientResult<Response> {
        let media_type = if request.is_scim() {
            SCIM_CONTENT_TYPE
        } else {
            JSON_CONTENT_TYPE
        };

        let method = reqwest::Method::from_bytes(request.method.as_str().as_bytes())
            .map_err(|e| ClientError::InvalidInput(e.to_string()))?;

        let mut builder = self
            .http
            .request(method, url)
            .bearer_auth(token)
            .header(header::ACCEPT, media_type);

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }

        if let Some(body) = request.body.as_ref().filter(|_| request.method != HttpMethod::Get) {
            builder = builder
                .header(header::CONTENT_TYPE, media_type)
                .body(serde_json::to_vec(body)?);
        }

        Ok(builder.send().await?)
    }

    async fn read_body(response: Response) -> ClientResult<(u16, Value)> {
        let status = response.status();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_ascii_lowercase();
        let text = response.text().await?;

        if is_login_page(&content_type, &text) {
            warn!(status = status.as_u16(), "Verify returned an interactive login page");
            return Ok((
                status.as_u16(),
                json!({
                    "status": "error",
                    "error_code": "AUTH_REDIRECT_DETECTED",
                    "http_code": status.as_u16(),
                    "message": "Verify returned an interactive login HTML page instead of API JSON.",
                    "hint": "Token may lack scope/permission for this endpoint or session/auth context is invalid.",
                }),
            ));
        }

        if !status.is_success() {
            return Err(ClientError::from_response(status.as_u16(), &text));
        }

        if status == StatusCode::NO_CONTENT || text.is_empty() {
            return Ok((
                status.as_u16(),
                json!({"status": "success", "http_code": status.as_u16()}),
            ));
        }

        match serde_json::from_str::<Value>(&text) {
            Ok(body) => Ok((status.as_u16(), body)),
            Err(_) => {
                let excerpt: String = text.chars().take(TEXT_BODY_CHARS).collect();
                Ok((
                    status.as_u16(),
                    json!({"status": "success", "http_code": status.as_u16(), "body": excerpt}),
                ))
            }
        }
    }
}

fn is_login_page(content_type: &str, body: &str) -> bool {
    if !content_type.contains("text/html") && !content_type.contains("application/xhtml+xml") {
        return false;
    }
    let head: String = body.chars().take(LOGIN_SNIFF_CHARS).collect::<String>().to_lowercase();
    LOGIN_MARKERS.iter().all(|marker| head.contains(marker))
}
