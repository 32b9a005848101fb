//! proxy_deploy tool implementation.
//!
//! Builds a worker for a new version, installs it, activates it and makes
//! it the controller.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use shellcache_client::fetch::Network;
use shellcache_core::CachePartitionStore;

use super::json_result;
use crate::context::ProxyContext;

/// Input parameters for the proxy_deploy tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ProxyDeployParams {
    /// Version tag of the new generation, e.g. "v62".
    pub version_tag: String,

    /// Precache manifest override. Defaults to the configured manifest.
    #[serde(default)]
    pub manifest: Option<Vec<String>>,
}

/// Implementation of the proxy_deploy tool.
pub async fn deploy_impl<S, N>(ctx: &ProxyContext<S, N>, params: ProxyDeployParams) -> Result<CallToolResult, McpError>
where
    S: CachePartitionStore + 'static,
    N: Network + 'static,
{
    let worker = ctx.build_worker(Some(&params.version_tag), params.manifest)?;
    let report = ctx.registration.deploy(worker).await?;
    json_result(&report)
}
