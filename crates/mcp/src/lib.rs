// MCP (Model Context Protocol) server for the IBM Security Verify gateway
//
// Four generic tools cover the whole Verify REST surface: list categories,
// discover endpoints, read one endpoint's schema, execute a call.

pub mod protocol;
pub mod server;
pub mod tools;

pub use server::McpServer;

use anyhow::{Context, Result};
use protocol::ServerInfo;
use std::sync::Arc;
use tools::{DiscoverTool, ExecuteTool, GetApiDetailsTool, ListCategoriesTool, ToolRegistry};
use verify_client::{VerifyClient, VerifyConfig};
use verify_core::{CategoryIndex, EndpointCatalog, SearchEngine};

pub const SERVER_NAME: &str = "verify-mcp";
pub const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Usage notes sent to the client in the `initialize` response.
pub const INSTRUCTIONS: &str = "\
You are connected to the IBM Security Verify MCP gateway.

IBM Security Verify is IBM's cloud identity platform: user lifecycle, SSO, MFA,
adaptive access, federation, and privacy and consent.

Tools:
  1. verify_list_categories: list API categories and their endpoint counts
  2. verify_discover: search endpoints by keyword, category or HTTP method
  3. verify_get_api_details: parameter schema of one endpoint
  4. verify_execute: call an endpoint

Workflow:
  Step 1: find endpoints with verify_list_categories or verify_discover
  Step 2: read the parameters with verify_get_api_details
  Step 3: call the endpoint with verify_execute

Tips:
  - SCIM endpoints live under /v2.0/Users and /v2.0/Groups and take SCIM filter syntax
  - Path parameters such as {id} are filled from params
  - Check verify_get_api_details for required fields before executing
";

/// Everything a transport needs: the search engine, the outbound client and
/// the MCP dispatcher built on both.
#[derive(Clone)]
pub struct Gateway {
    engine: Arc<SearchEngine>,
    client: VerifyClient,
    server: Arc<McpServer>,
}

impl Gateway {
    /// Load the built-in catalog and connect to the configured tenant.
    pub fn new(config: VerifyConfig) -> Result<Self> {
        let catalog = EndpointCatalog::load_builtin().context("Failed to load endpoint catalog")?;
        let client = VerifyClient::new(config).context("Failed to create Verify client")?;
        Self::from_parts(Arc::new(catalog), client)
    }

    pub fn from_parts(catalog: Arc<EndpointCatalog>, client: VerifyClient) -> Result<Self> {
        let index = CategoryIndex::build(&catalog).context("Failed to index categories")?;
        let engine = Arc::new(SearchEngine::new(catalog, Arc::new(index)));

        tracing::info!(
            endpoints = engine.catalog().len(),
            categories = engine.categories().len(),
            tenant = %client.config().tenant_host(),
            "Endpoint catalog loaded"
        );

        let registry = build_registry(engine.clone(), client.clone());
        let server = McpServer::new(
            registry,
            ServerInfo {
                name: SERVER_NAME.to_string(),
                version: SERVER_VERSION.to_string(),
            },
        )
        .with_instructions(INSTRUCTIONS);

        Ok(Self {
            engine,
            client,
            server: Arc::new(server),
        })
    }

    pub fn engine(&self) -> &Arc<SearchEngine> {
        &self.engine
    }

    pub fn client(&self) -> &VerifyClient {
        &self.client
    }

    pub fn server(&self) -> &Arc<McpServer> {
        &self.server
    }
}

/// Register the four Verify tools.
pub fn build_registry(engine: Arc<SearchEngine>, client: VerifyClient) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(ListCategoriesTool::new(engine.clone())));
    registry.register(Arc::new(DiscoverTool::new(engine.clone())));
    registry.register(Arc::new(GetApiDetailsTool::new(engine.clone())));
    registry.register(Arc::new(ExecuteTool::new(engine, client)));
    registry
}
