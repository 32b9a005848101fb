//! cache_keys tool implementation.
//!
//! Lists the request URLs stored in a partition.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use shellcache_core::{CachePartitionStore, Error};

use crate::tools::json_result;

/// Parameters for the cache_keys tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheKeysParams {
    /// Partition name, e.g. "media-v61".
    pub partition: String,
}

/// Output from the cache_keys tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheKeysOutput {
    pub partition: String,
    /// Stored request URLs, oldest first.
    pub keys: Vec<String>,
}

/// Implementation of the cache_keys tool.
pub async fn keys_impl<S: CachePartitionStore>(store: &S, params: CacheKeysParams) -> Result<CallToolResult, McpError> {
    let exists = store.partitions().await?.iter().any(|p| p.name == params.partition);
    if !exists {
        return Err(Error::CacheMiss(format!("no partition named {}", params.partition)).into());
    }

    let keys = store.keys(&params.partition).await?;
    json_result(&CacheKeysOutput { partition: params.partition, keys })
}
