// verify_list_categories: browse the API surface

use crate::protocol::{CallToolResult, ToolSchema};
use crate::tools::{json_output, json_schema_object, Tool};
use anyhow::Result;
use serde_json::json;
use std::sync::Arc;
use verify_core::SearchEngine;

pub struct ListCategoriesTool {
    engine: Arc<SearchEngine>,
}

impl ListCategoriesTool {
    pub fn new(engine: Arc<SearchEngine>) -> Self {
        Self { engine }
    }
}

#[async_trait::async_trait]
impl Tool for ListCategoriesTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "verify_list_categories".to_string(),
            description: "List all IBM Security Verify API categories with the number of endpoints \
                in each, sorted by name. Use a category name with verify_discover to browse it."
                .to_string(),
            input_schema: json_schema_object(json!({}), vec![]),
        }
    }

    async fn execute(&self, _arguments: serde_json::Value) -> Result<CallToolResult> {
        let index = self.engine.categories();
        Ok(json_output(&json!({
            "total_categories": index.len(),
            "total_endpoints": index.total_endpoints(),
            "categories": index.list(),
        })))
    }
}
