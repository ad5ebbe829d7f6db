// MCP server: JSON-RPC dispatch and the stdio transport

use crate::protocol::{
    CallToolParams, CallToolResult, InitializeParams, InitializeResult, JsonRpcError,
    JsonRpcRequest, JsonRpcResponse, ListToolsResult, ServerCapabilities, ServerInfo,
    ToolsCapability, JSONRPC_VERSION, PROTOCOL_VERSION,
};
use crate::tools::ToolRegistry;
use anyhow::Result;
use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::codec::{FramedRead, FramedWrite, LinesCodec, LinesCodecError};
use tracing::{debug, info, warn};

/// Longest accepted stdin line.
const MAX_LINE_LENGTH: usize = 8 * 1024 * 1024;

pub struct McpServer {
    registry: ToolRegistry,
    info: ServerInfo,
    instructions: Option<String>,
}

impl McpServer {
    pub fn new(registry: ToolRegistry, info: ServerInfo) -> Self {
        Self {
            registry,
            info,
            instructions: None,
        }
    }

    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = Some(instructions.into());
        self
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn info(&self) -> &ServerInfo {
        &self.info
    }

    /// Handle one raw JSON-RPC message. Returns `None` for notifications.
    pub async fn handle_message(&self, raw: &str) -> Option<JsonRpcResponse> {
        let value: Value = match serde_json::from_str(raw) {
            Ok(value) => value,
            Err(e) => {
                debug!(error = %e, "Unparseable JSON-RPC message");
                return Some(JsonRpcResponse::error(
                    Value::Null,
                    JsonRpcError::parse_error(e.to_string()),
                ));
            }
        };

        let id = value.get("id").cloned();
        let request: JsonRpcRequest = match serde_json::from_value(value) {
            Ok(request) => request,
            Err(e) => {
                return id.map(|id| {
                    JsonRpcResponse::error(id, JsonRpcError::invalid_request(e.to_string()))
                });
            }
        };

        self.handle_request(request).await
    }

    pub async fn handle_request(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        let Some(id) = request.id.clone() else {
            self.handle_notification(&request);
            return None;
        };

        if request.jsonrpc != JSONRPC_VERSION {
            return Some(JsonRpcResponse::error(
                id,
                JsonRpcError::invalid_request(format!(
                    "unsupported jsonrpc version: {}",
                    request.jsonrpc
                )),
            ));
        }

        let outcome = match request.method.as_str() {
            "initialize" => self.initialize(request.params),
            "ping" => Ok(json!({})),
            "tools/list" => self.list_tools(),
            "tools/call" => self.call_tool(request.params).await,
            other => Err(JsonRpcError::method_not_found(other)),
        };

        Some(match outcome {
            Ok(result) => JsonRpcResponse::success(id, result),
            Err(error) => JsonRpcResponse::error(id, error),
        })
    }

    fn handle_notification(&self, request: &JsonRpcRequest) {
        match request.method.as_str() {
            "notifications/initialized" => info!("Client initialized"),
            "notifications/cancelled" => debug!(params = ?request.params, "Client cancelled a request"),
            other => debug!(method = %other, "Ignoring notification"),
        }
    }

    fn initialize(&self, params: Option<Value>) -> Result<Value, JsonRpcError> {
        let params: InitializeParams = match params {
            Some(params) => serde_json::from_value(params)
                .map_err(|e| JsonRpcError::invalid_params(e.to_string()))?,
            None => InitializeParams::default(),
        };

        if let Some(client) = &params.client_info {
            info!(
                client = %client.name,
                client_version = %client.version,
                protocol_version = ?params.protocol_version,
                "Initialize"
            );
        }

        let result = InitializeResult {
            protocol_version: PROTOCOL_VERSION.to_string(),
            capabilities: ServerCapabilities {
                tools: Some(ToolsCapability {
                    list_changed: false,
                }),
            },
            server_info: self.info.clone(),
            instructions: self.instructions.clone(),
        };
        to_result(&result)
    }

    fn list_tools(&self) -> Result<Value, JsonRpcError> {
        to_result(&ListToolsResult {
            tools: self.registry.list_schemas(),
        })
    }

    async fn call_tool(&self, params: Option<Value>) -> Result<Value, JsonRpcError> {
        let params: CallToolParams = serde_json::from_value(params.unwrap_or(Value::Null))
            .map_err(|e| JsonRpcError::invalid_params(format!("invalid tools/call params: {}", e)))?;

        let tool = self
            .registry
            .get(&params.name)
            .ok_or_else(|| JsonRpcError::invalid_params(format!("Unknown tool: {}", params.name)))?;

        debug!(tool = %params.name, "tools/call");

        let result = match tool.execute(params.arguments).await {
            Ok(result) => result,
            Err(e) => {
                warn!(tool = %params.name, error = %e, "Tool rejected its arguments");
                CallToolResult::error_json(&json!({
                    "error": format!("{:#}", e),
                    "error_code": "INVALID_ARGUMENTS",
                }))
            }
        };
        to_result(&result)
    }

    /// Serve line-delimited JSON-RPC until `reader` reaches EOF.
    ///
    /// Each message is handled in its own task. Responses go through a
    /// single writer so lines never interleave.
    pub async fn serve<R, W>(self: Arc<Self>, reader: R, writer: W) -> Result<()>
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (tx, mut rx) = mpsc::unbounded_channel::<JsonRpcResponse>();

        let writer_task = tokio::spawn(async move {
            let mut sink = FramedWrite::new(writer, LinesCodec::new());
            while let Some(response) = rx.recv().await {
                let line = serde_json::to_string(&response)?;
                sink.send(line).await?;
            }
            Ok::<_, anyhow::Error>(())
        });

        let mut lines = FramedRead::new(reader, LinesCodec::new_with_max_length(MAX_LINE_LENGTH));
        let mut in_flight = JoinSet::new();

        while let Some(line) = lines.next().await {
            let line = match line {
                Ok(line) => line,
                Err(LinesCodecError::MaxLineLengthExceeded) => {
                    warn!(max = MAX_LINE_LENGTH, "Dropping oversized message");
                    let _ = tx.send(JsonRpcResponse::error(
                        Value::Null,
                        JsonRpcError::parse_error("message too long"),
                    ));
                    continue;
                }
                Err(LinesCodecError::Io(e)) => return Err(e.into()),
            };
            if line.trim().is_empty() {
                continue;
            }

            let server = Arc::clone(&self);
            let tx = tx.clone();
            in_flight.spawn(async move {
                if let Some(response) = server.handle_message(&line).await {
                    // The receiver only closes when the writer failed.
                    let _ = tx.send(response);
                }
            });

            // Reap finished handlers so the set stays small.
            while in_flight.try_join_next().is_some() {}
        }

        debug!("Input closed, waiting for in-flight requests");
        while in_flight.join_next().await.is_some() {}
        drop(tx);

        writer_task.await?
    }

    /// Serve on the process's stdin and stdout.
    pub async fn serve_stdio(self: Arc<Self>) -> Result<()> {
        info!(tools = self.registry.len(), "MCP server listening on stdio");
        self.serve(tokio::io::stdin(), tokio::io::stdout()).await
    }
}

fn to_result<T: serde::Serialize>(value: &T) -> Result<Value, JsonRpcError> {
    serde_json::to_value(value).map_err(|e| JsonRpcError::internal_error(e.to_string()))
}
