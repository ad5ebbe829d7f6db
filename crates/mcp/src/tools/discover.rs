// verify_discover: ranked endpoint search

use crate::protocol::{CallToolResult, ToolSchema};
use crate::tools::{
    json_output, json_schema_enum, json_schema_integer, json_schema_object, json_schema_string, Tool,
};
use anyhow::{Context, Result};
use serde_json::json;
use std::sync::Arc;
use verify_core::search::{DEFAULT_LIMIT, MAX_LIMIT};
use verify_core::{SearchEngine, SearchRequest};

pub struct DiscoverTool {
    engine: Arc<SearchEngine>,
}

impl DiscoverTool {
    pub fn new(engine: Arc<SearchEngine>) -> Self {
        Self { engine }
    }
}

#[async_trait::async_trait]
impl Tool for DiscoverTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "verify_discover".to_string(),
            description: "Search IBM Security Verify API endpoints by keyword, category, or HTTP method. \
                Use this FIRST to find an endpoint_id before calling verify_get_api_details or \
                verify_execute. Exact id matches rank first, then whole-word matches, then partial \
                matches. With three or fewer matches the full parameter schema is included."
                .to_string(),
            input_schema: json_schema_object(
                json!({
                    "search": json_schema_string(
                        "Keyword to match against endpoint ids, summaries, categories and paths (e.g. \"users\", \"mfa\", \"getUsers\")"
                    ),
                    "category": json_schema_string(
                        "Restrict to one category, exact name, case-insensitive (see verify_list_categories)"
                    ),
                    "method": json_schema_enum(
                        &["GET", "POST", "PUT", "PATCH", "DELETE"],
                        "Restrict to one HTTP method"
                    ),
                    "offset": json_schema_integer("Number of matches to skip (default 0)", 0, None),
                    "limit": json_schema_integer(
                        &format!("Page size (default {}, max {})", DEFAULT_LIMIT, MAX_LIMIT),
                        1,
                        Some(MAX_LIMIT as u64)
                    ),
                }),
                vec![],
            ),
        }
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<CallToolResult> {
        let request: SearchRequest = if arguments.is_null() {
            SearchRequest::default()
        } else {
            serde_json::from_value(arguments).context("Invalid arguments for verify_discover")?
        };

        let result = self.engine.search(&request);
        let mut body = serde_json::to_value(&result)?;
        body["total_available"] = json!(self.engine.catalog().len());

        if result.total_matches == 0 {
            let unknown_category = request
                .category
                .as_deref()
                .is_some_and(|c| self.engine.categories().get(c).is_none());

            body["message"] = json!(match request.query.as_deref() {
                Some(q) if !q.trim().is_empty() => format!("No endpoints found matching '{}'", q.trim()),
                _ => "No endpoints found".to_string(),
            });
            body["hint"] = json!(if unknown_category {
                "Unknown category. Use verify_list_categories to see valid names"
            } else {
                "Try broader keywords or use verify_list_categories to browse"
            });
        }

        tracing::debug!(
            query = ?request.query,
            category = ?request.category,
            total_matches = result.total_matches,
            "verify_discover"
        );

        Ok(json_output(&body))
    }
}
