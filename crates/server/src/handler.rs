//! MCP server handler implementation.
//!
//! This module defines the main server handler that
//! routes tool calls to the appropriate implementations.

use std::sync::Arc;

use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::{
        tool::{ToolCallContext, ToolRouter},
        wrapper::Parameters,
    },
    model::{
        CallToolRequestParam, CallToolResult, Implementation, ListToolsResult, PaginatedRequestParam, ProtocolVersion,
        ServerCapabilities, ServerInfo,
    },
    service::{RequestContext, RoleServer},
    tool, tool_router,
};
use shellcache_client::HttpNetwork;
use shellcache_core::CacheDb;

use crate::context::ProxyContext;
use crate::tools::cache::{CacheGetParams, CacheKeysParams, get_impl, keys_impl};
use crate::tools::proxy_deploy::{ProxyDeployParams, deploy_impl};
use crate::tools::proxy_fetch::{ProxyFetchParams, fetch_impl};
use crate::tools::proxy_status::status_impl;

/// The main MCP server handler for shellcache.
#[derive(Clone)]
pub struct ShellCacheServer {
    tool_router: ToolRouter<Self>,
    ctx: Arc<ProxyContext<CacheDb, HttpNetwork>>,
}

/// Tool router implementation using the #[tool_router] macro.
///
/// This macro generates the routing logic that maps tool names to handler methods.
#[tool_router]
impl ShellCacheServer {
    /// Create a new server handler.
    pub fn new(ctx: Arc<ProxyContext<CacheDb, HttpNetwork>>) -> Self {
        Self { tool_router: Self::tool_router(), ctx }
    }

    /// Route one request through the active proxy worker.
    #[tool(
        description = "Fetch a URL through the offline cache proxy. Reports whether the answer came from a cache partition, the network, a synthetic fallback, or a passthrough."
    )]
    async fn proxy_fetch(&self, params: Parameters<ProxyFetchParams>) -> Result<CallToolResult, McpError> {
        fetch_impl(&self.ctx, params.0).await
    }

    /// Install and activate a new proxy version.
    #[tool(
        description = "Deploy a new proxy version: precache its manifest, activate it, delete stale partitions, and take over as controller."
    )]
    async fn proxy_deploy(&self, params: Parameters<ProxyDeployParams>) -> Result<CallToolResult, McpError> {
        deploy_impl(&self.ctx, params.0).await
    }

    #[tool(description = "Show the active proxy version, its lifecycle state, and every cache partition with its entry count.")]
    async fn proxy_status(&self) -> Result<CallToolResult, McpError> {
        status_impl(&self.ctx).await
    }

    /// Read one stored response.
    #[tool(description = "Get a stored response (status, headers, body) from a cache partition.")]
    async fn cache_get(&self, params: Parameters<CacheGetParams>) -> Result<CallToolResult, McpError> {
        get_impl(self.ctx.store.as_ref(), &self.ctx.config, params.0).await
    }

    #[tool(description = "List the request URLs stored in a cache partition, oldest first.")]
    async fn cache_keys(&self, params: Parameters<CacheKeysParams>) -> Result<CallToolResult, McpError> {
        keys_impl(self.ctx.store.as_ref(), params.0).await
    }
}

impl ServerHandler for ShellCacheServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "shellcache".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self, _request: Option<PaginatedRequestParam>, _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, rmcp::model::ErrorData> {
        Ok(ListToolsResult { meta: None, tools: self.tool_router.list_all(), next_cursor: None })
    }

    async fn call_tool(
        &self, request: CallToolRequestParam, context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, rmcp::model::ErrorData> {
        self.tool_router
            .call(ToolCallContext::new(self, request, context))
            .await
    }
}
