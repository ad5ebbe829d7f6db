// verify_get_api_details: full parameter schema for one endpoint

use crate::protocol::{CallToolResult, ToolSchema};
use crate::tools::{error_output, json_output, json_schema_object, json_schema_string, Tool};
use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use verify_core::{ParamLocation, SearchEngine};

const MAX_SUGGESTIONS: usize = 10;

pub struct GetApiDetailsTool {
    engine: Arc<SearchEngine>,
}

impl GetApiDetailsTool {
    pub fn new(engine: Arc<SearchEngine>) -> Self {
        Self { engine }
    }
}

#[derive(Debug, Deserialize)]
struct DetailsArgs {
    #[serde(alias = "endpoint")]
    endpoint_id: String,
}

#[async_trait::async_trait]
impl Tool for GetApiDetailsTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "verify_get_api_details".to_string(),
            description: "Get the full parameter schema for one IBM Security Verify API endpoint: \
                method, path, every parameter with its location (path, query or body), type and \
                whether it is required. Call this before verify_execute."
                .to_string(),
            input_schema: json_schema_object(
                json!({
                    "endpoint_id": json_schema_string(
                        "Endpoint identifier from verify_discover (e.g. \"getUsers\", \"createUser\")"
                    ),
                }),
                vec!["endpoint_id"],
            ),
        }
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<CallToolResult> {
        let args: DetailsArgs = serde_json::from_value(arguments)
            .context("Invalid arguments for verify_get_api_details")?;
        let catalog = self.engine.catalog();
        let endpoint_id = args.endpoint_id.trim();

        let endpoint = match catalog.get(endpoint_id) {
            Ok(endpoint) => endpoint,
            Err(e) => {
                return Ok(error_output(json!({
                    "error": e.to_string(),
                    "error_code": "NOT_FOUND",
                    "suggestions": catalog.suggest(endpoint_id, MAX_SUGGESTIONS),
                    "hint": "Use verify_discover to search for the correct endpoint_id",
                })));
            }
        };

        let names = |location: ParamLocation| {
            endpoint
                .params_in(location)
                .map(|p| p.name.as_str())
                .collect::<Vec<_>>()
        };

        Ok(json_output(&json!({
            "endpoint_id": endpoint.id,
            "method": endpoint.method,
            "path": endpoint.path,
            "category": endpoint.category,
            "summary": endpoint.summary,
            "parameters": endpoint.parameters,
            "required": endpoint.required_params(),
            "path_params": names(ParamLocation::Path),
            "query_params": names(ParamLocation::Query),
            "body_params": names(ParamLocation::Body),
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::engine;
    use serde_json::Value;

    #[tokio::test]
    async fn test_details_for_known_endpoint() {
        let tool = GetApiDetailsTool::new(engine());
        let result = tool.execute(json!({"endpoint_id": "getUsers"})).await.unwrap();
        assert!(!result.is_error());

        let body: Value = serde_json::from_str(&result.text_content()).unwrap();
        assert_eq!(body["method"], "GET");
        assert_eq!(body["path"], "/v2.0/Users");
        assert!(body["parameters"].is_array());
    }

    #[tokio::test]
    async fn test_path_params_listed() {
        let tool = GetApiDetailsTool::new(engine());
        let result = tool.execute(json!({"endpoint": "getUser"})).await.unwrap();
        let body: Value = serde_json::from_str(&result.text_content()).unwrap();

        let path_params = body["path_params"].as_array().unwrap();
        assert!(!path_params.is_empty());
        for name in path_params {
            assert!(body["path"].as_str().unwrap().contains(&format!("{{{}}}", name.as_str().unwrap())));
        }
    }

    #[tokio::test]
    async fn test_unknown_endpoint_suggests() {
        let tool = GetApiDetailsTool::new(engine());
        let result = tool.execute(json!({"endpoint_id": "getuser"})).await.unwrap();
        assert!(result.is_error());

        let body: Value = serde_json::from_str(&result.text_content()).unwrap();
        assert_eq!(body["error_code"], "NOT_FOUND");
        let suggestions = body["suggestions"].as_array().unwrap();
        assert!(suggestions.iter().any(|s| s == "getUsers"));
        assert!(suggestions.len() <= 10);
    }

    #[tokio::test]
    async fn test_missing_argument_is_error() {
        let tool = GetApiDetailsTool::new(engine());
        assert!(tool.execute(json!({})).await.is_err());
    }
}
