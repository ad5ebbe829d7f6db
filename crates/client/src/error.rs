//! Error types for the Verify client.

use serde_json::Value;

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors raised while authorizing or executing Verify API calls.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// HTTP request failed before a response was received.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The Verify API answered with a non-success status. The body is
    /// forwarded as received.
    #[error("Upstream error (status {status})")]
    Upstream { status: u16, body: Value },

    /// Invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Credential exchange failed and no valid cached token exists.
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Invalid input.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl ClientError {
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Authentication(_))
    }

    /// Stable machine-readable code for tool output.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Http(e) if e.is_timeout() => "TIMEOUT",
            Self::Http(_) => "HTTP_ERROR",
            Self::Upstream { .. } => "UPSTREAM_ERROR",
            Self::Config(_) => "CONFIG_ERROR",
            Self::Json(_) => "JSON_ERROR",
            Self::Authentication(_) => "AUTH_ERROR",
            Self::InvalidInput(_) => "INVALID_INPUT",
            Self::InvalidUrl(_) => "INVALID_URL",
        }
    }

    /// Build an upstream error from a status code and raw response text.
    pub fn from_response(status: u16, body: &str) -> Self {
        let body = serde_json::from_str::<Value>(body)
            .unwrap_or_else(|_| Value::String(body.to_string()));
        Self::Upstream { status, body }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_response_keeps_json_body() {
        let err = ClientError::from_response(400, r#"{"messageId": "CSIAH0001E"}"#);
        match err {
            ClientError::Upstream { status, body } => {
                assert_eq!(status, 400);
                assert_eq!(body, json!({"messageId": "CSIAH0001E"}));
            }
            other => panic!("unexpected: {other}"),
        }
    }

    #[test]
    fn test_from_response_keeps_text_body() {
        let err = ClientError::from_response(502, "Bad Gateway");
        assert_eq!(err.code(), "UPSTREAM_ERROR");
        match err {
            ClientError::Upstream { body, .. } => assert_eq!(body, json!("Bad Gateway")),
            other => panic!("unexpected: {other}"),
        }
    }

    #[test]
    fn test_auth_code() {
        let err = ClientError::Authentication("invalid_client".to_string());
        assert!(err.is_auth());
        assert_eq!(err.code(), "AUTH_ERROR");
    }
}
