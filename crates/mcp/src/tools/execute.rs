// verify_execute: proxy a call to the Verify REST API

use crate::protocol::{CallToolResult, ToolContent, ToolSchema};
use crate::tools::{
    error_output, json_output, json_schema_enum, json_schema_free_object, json_schema_object,
    json_schema_string, Tool,
};
use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::{info, warn};
use verify_client::{ApiRequest, ClientError, VerifyClient};
use verify_core::{types::resolve_template, CoreError, HttpMethod, SearchEngine};

const MAX_SUGGESTIONS: usize = 10;

pub struct ExecuteTool {
    engine: Arc<SearchEngine>,
    client: VerifyClient,
}

impl ExecuteTool {
    pub fn new(engine: Arc<SearchEngine>, client: VerifyClient) -> Self {
        Self { engine, client }
    }

    /// Turn an endpoint id or raw path into a concrete path and leftover
    /// query parameters.
    fn resolve(
        &self,
        endpoint: &str,
        method: HttpMethod,
        params: &Map<String, Value>,
    ) -> std::result::Result<(String, Map<String, Value>), CallToolResult> {
        let catalog = self.engine.catalog();

        if endpoint.starts_with('/') {
            if catalog.find_by_route(method, endpoint).is_none() {
                warn!(method = %method, path = %endpoint, "Executing path not in the catalog");
            }
            return resolve_template(endpoint, endpoint, params).map_err(invalid_params);
        }

        let descriptor = catalog.get(endpoint).map_err(|e| {
            error_output(json!({
                "error": e.to_string(),
                "error_code": "NOT_FOUND",
                "suggestions": catalog.suggest(endpoint, MAX_SUGGESTIONS),
                "hint": "Use verify_discover to find the correct endpoint_id",
            }))
        })?;

        if descriptor.method != method {
            return Err(error_output(json!({
                "error": format!(
                    "endpoint {} is {} {}, not {}",
                    descriptor.id, descriptor.method, descriptor.path, method
                ),
                "error_code": "METHOD_MISMATCH",
                "expected_method": descriptor.method,
            })));
        }

        descriptor.resolve_path(params).map_err(invalid_params)
    }
}

fn invalid_params(error: CoreError) -> CallToolResult {
    let missing = match &error {
        CoreError::MissingPathParams { missing, .. } => missing.clone(),
        _ => Vec::new(),
    };
    error_output(json!({
        "error": error.to_string(),
        "error_code": "INVALID_PARAMS",
        "missing": missing,
        "hint": "Pass path parameters in params, e.g. {\"id\": \"...\"}",
    }))
}

#[derive(Debug, Deserialize)]
struct ExecuteArgs {
    #[serde(alias = "endpoint_id")]
    endpoint: String,
    method: String,
    #[serde(default)]
    params: Option<Map<String, Value>>,
    #[serde(default)]
    body: Option<Value>,
}

#[async_trait::async_trait]
impl Tool for ExecuteTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "verify_execute".to_string(),
            description: "Execute an IBM Security Verify API endpoint with the gateway's credentials. \
                Call verify_get_api_details first to learn the required parameters. Path \
                parameters such as {id} are filled from params; the remaining params are sent \
                as the query string. The upstream JSON response is returned as-is."
                .to_string(),
            input_schema: json_schema_object(
                json!({
                    "method": json_schema_enum(
                        &["GET", "POST", "PUT", "PATCH", "DELETE"],
                        "HTTP method; must match the endpoint's declared method"
                    ),
                    "endpoint": json_schema_string(
                        "Endpoint id from verify_discover (e.g. \"getUsers\") or a raw API path starting with / (e.g. \"/v2.0/Users/{id}\")"
                    ),
                    "params": json_schema_free_object("Path and query parameters as key-value pairs"),
                    "body": json_schema_free_object("JSON request body for POST, PUT and PATCH"),
                }),
                vec!["method", "endpoint"],
            ),
        }
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<CallToolResult> {
        let args: ExecuteArgs =
            serde_json::from_value(arguments).context("Invalid arguments for verify_execute")?;

        let method: HttpMethod = match args.method.parse() {
            Ok(method) => method,
            Err(e) => {
                return Ok(error_output(json!({
                    "error": e,
                    "error_code": "INVALID_PARAMS",
                })));
            }
        };

        let endpoint = args.endpoint.trim();
        let params = args.params.unwrap_or_default();
        let (path, query) = match self.resolve(endpoint, method, &params) {
            Ok(resolved) => resolved,
            Err(failure) => return Ok(failure),
        };

        let mut request = ApiRequest::new(method, path.clone()).with_query_map(&query);
        if let Some(body) = args.body.filter(|b| !b.is_null()) {
            request = request.with_body(body);
        }

        info!(method = %method, path = %path, endpoint = %endpoint, "verify_execute");

        match self.client.execute(&request).await {
            Ok(response) => {
                let mut result = json_output(&response.body);
                if let Some(warning) = response.warning {
                    result
                        .content
                        .push(ToolContent::text(format!("Warning: {}", warning)));
                }
                Ok(result)
            }
            Err(ClientError::Upstream { status, body }) => {
                warn!(method = %method, path = %path, status, "Verify API returned an error");
                Ok(error_output(json!({
                    "error": format!("Verify API returned HTTP {}", status),
                    "error_code": "UPSTREAM_ERROR",
                    "http_code": status,
                    "response": body,
                    "endpoint": endpoint,
                    "method": method,
                    "path": path,
                })))
            }
            Err(e) => {
                warn!(method = %method, path = %path, error = %e, "verify_execute failed");
                Ok(error_output(json!({
                    "error": e.to_string(),
                    "error_code": e.code(),
                    "endpoint": endpoint,
                    "method": method,
                    "path": path,
                })))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::engine;
    use verify_client::VerifyConfig;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn setup() -> (MockServer, ExecuteTool) {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1.0/endpoint/default/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "tok",
                "expires_in": 3600
            })))
            .mount(&server)
            .await;

        let config = VerifyConfig::new(&server.uri(), "client", "secret").unwrap();
        let client = VerifyClient::new(config).unwrap();
        (server, ExecuteTool::new(engine(), client))
    }

    fn body_of(result: &CallToolResult) -> Value {
        match &result.content[0] {
            ToolContent::Text { text } => serde_json::from_str(text).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_execute_by_id_substitutes_path() {
        let (server, tool) = setup().await;
        Mock::given(method("GET"))
            .and(path("/v2.0/Users/u-123"))
            .and(header("authorization", "Bearer tok"))
            .and(query_param("attributes", "emails"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "u-123"})))
            .expect(1)
            .mount(&server)
            .await;

        let result = tool
            .execute(json!({
                "method": "get",
                "endpoint": "getUser",
                "params": {"id": "u-123", "attributes": "emails"}
            }))
            .await
            .unwrap();

        assert!(!result.is_error());
        assert_eq!(body_of(&result), json!({"id": "u-123"}));
    }

    #[tokio::test]
    async fn test_execute_raw_path_with_body() {
        let (server, tool) = setup().await;
        Mock::given(method("POST"))
            .and(path("/v2.0/Users"))
            .and(body_json(json!({"userName": "jdoe"})))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": "new"})))
            .expect(1)
            .mount(&server)
            .await;

        let result = tool
            .execute(json!({
                "method": "POST",
                "endpoint_id": "/v2.0/Users",
                "body": {"userName": "jdoe"}
            }))
            .await
            .unwrap();

        assert_eq!(body_of(&result), json!({"id": "new"}));
    }

    #[tokio::test]
    async fn test_missing_path_param_is_invalid_params() {
        let (_server, tool) = setup().await;
        let result = tool
            .execute(json!({"method": "GET", "endpoint": "getUser"}))
            .await
            .unwrap();

        assert!(result.is_error());
        let body = body_of(&result);
        assert_eq!(body["error_code"], "INVALID_PARAMS");
        assert_eq!(body["missing"], json!(["id"]));
    }

    #[tokio::test]
    async fn test_method_mismatch() {
        let (_server, tool) = setup().await;
        let result = tool
            .execute(json!({"method": "DELETE", "endpoint": "getUsers"}))
            .await
            .unwrap();

        assert!(result.is_error());
        assert_eq!(body_of(&result)["error_code"], "METHOD_MISMATCH");
    }

    #[tokio::test]
    async fn test_unknown_endpoint() {
        let (_server, tool) = setup().await;
        let result = tool
            .execute(json!({"method": "GET", "endpoint": "getUserz"}))
            .await
            .unwrap();

        assert!(result.is_error());
        assert_eq!(body_of(&result)["error_code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_upstream_error_passed_through() {
        let (server, tool) = setup().await;
        Mock::given(method("GET"))
            .and(path("/v2.0/Users"))
            .respond_with(
                ResponseTemplate::new(400)
                    .set_body_json(json!({"scimType": "invalidFilter", "detail": "bad filter"})),
            )
            .mount(&server)
            .await;

        let result = tool
            .execute(json!({"method": "GET", "endpoint": "getUsers", "params": {"filter": "x"}}))
            .await
            .unwrap();

        assert!(result.is_error());
        let body = body_of(&result);
        assert_eq!(body["error_code"], "UPSTREAM_ERROR");
        assert_eq!(body["http_code"], 400);
        assert_eq!(body["response"]["scimType"], "invalidFilter");
    }

    #[tokio::test]
    async fn test_invalid_method() {
        let (_server, tool) = setup().await;
        let result = tool
            .execute(json!({"method": "TRACE", "endpoint": "getUsers"}))
            .await
            .unwrap();

        assert!(result.is_error());
        assert_eq!(body_of(&result)["error_code"], "INVALID_PARAMS");
    }
}
