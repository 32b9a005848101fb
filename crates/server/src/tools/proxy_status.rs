//! proxy_status tool implementation.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use shellcache_client::fetch::Network;
use shellcache_core::{CachePartitionStore, PartitionKind};

use super::json_result;
use crate::context::ProxyContext;

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PartitionSummary {
    pub name: String,
    /// None for partitions this proxy did not name.
    pub kind: Option<PartitionKind>,
    pub entries: u64,
    /// Belongs to the active version.
    pub current: bool,
}

/// Output structure for the proxy_status tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ProxyStatusOutput {
    pub active_version: Option<String>,
    pub state: Option<String>,
    pub scope: String,
    pub partitions: Vec<PartitionSummary>,
}

/// Implementation of the proxy_status tool.
pub async fn status_impl<S, N>(ctx: &ProxyContext<S, N>) -> Result<CallToolResult, McpError>
where
    S: CachePartitionStore + 'static,
    N: Network + 'static,
{
    let active = ctx.registration.active().await;

    let (active_version, state) = match &active {
        Some(worker) => (Some(worker.version().to_string()), Some(worker.state().await.to_string())),
        None => (None, None),
    };

    let partitions = ctx
        .store
        .partitions()
        .await?
        .into_iter()
        .map(|info| PartitionSummary {
            kind: PartitionKind::from_name(&info.name),
            current: active.as_ref().is_some_and(|w| w.partition_names().contains(&info.name)),
            name: info.name,
            entries: info.entries,
        })
        .collect();

    json_result(&ProxyStatusOutput { active_version, state, scope: ctx.config.origin.clone(), partitions })
}
