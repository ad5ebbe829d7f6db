// The four Verify gateway tools

pub mod categories;
pub mod details;
pub mod discover;
pub mod execute;
mod registry;

pub use categories::ListCategoriesTool;
pub use details::GetApiDetailsTool;
pub use discover::DiscoverTool;
pub use execute::ExecuteTool;
pub use registry::{
    json_schema_enum, json_schema_free_object, json_schema_integer, json_schema_object,
    json_schema_string, Tool, ToolRegistry,
};

use crate::protocol::{pretty, CallToolResult, ToolContent};
use serde_json::Value;

/// Tool output longer than this is cut with a notice.
pub const MAX_RESPONSE_CHARS: usize = 50_000;

/// Successful call whose text is the pretty-printed JSON body.
pub fn json_output(body: &Value) -> CallToolResult {
    CallToolResult {
        content: vec![ToolContent::text(truncate(pretty(body)))],
        is_error: None,
    }
}

/// Failed call with a JSON error body.
pub fn error_output(body: Value) -> CallToolResult {
    CallToolResult::error_json(&body)
}

pub fn truncate(text: String) -> String {
    match text.char_indices().nth(MAX_RESPONSE_CHARS) {
        None => text,
        Some((cut, _)) => format!(
            "{}\n\n[Response truncated at {} characters. Use filters or pagination to narrow results.]",
            &text[..cut],
            MAX_RESPONSE_CHARS
        ),
    }
}
