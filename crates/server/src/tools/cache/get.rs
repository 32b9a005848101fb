//! cache_get tool implementation.
//!
//! Retrieves a stored response from one partition.

use std::collections::BTreeMap;

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use shellcache_client::fetch::resolve;
use shellcache_core::{AppConfig, CachePartitionStore, Error, MatchOptions, Method, RequestKey};

use crate::error::ServerError;
use crate::tools::json_result;

/// Parameters for the cache_get tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheGetParams {
    /// Partition name, e.g. "precache-v61".
    pub partition: String,

    /// Request URL. Relative URLs resolve against the configured origin.
    pub url: String,

    /// HTTP method of the stored request (default: GET).
    #[serde(default)]
    pub method: Method,

    /// Match on the URL with its query string removed.
    #[serde(default)]
    pub ignore_search: bool,
}

/// Output from the cache_get tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheGetOutput {
    pub partition: String,
    pub url: String,
    pub status: u16,
    pub headers: BTreeMap<String, String>,
    /// Stored body, decoded as UTF-8 (lossy).
    pub body: String,
    pub body_bytes: usize,
}

/// Implementation of the cache_get tool.
pub async fn get_impl<S: CachePartitionStore>(
    store: &S, config: &AppConfig, params: CacheGetParams,
) -> Result<CallToolResult, McpError> {
    let scope = config.origin_url().map_err(|e| ServerError::InvalidInput(e.to_string()))?;
    let url = resolve(&scope, &params.url).map_err(|e| ServerError::InvalidInput(format!("url: {e}")))?;
    let key = RequestKey::new(params.method, url);

    let options = MatchOptions { ignore_search: params.ignore_search };
    let response = store
        .match_request(&params.partition, &key, options)
        .await?
        .ok_or_else(|| Error::CacheMiss(format!("{} {} in {}", key.method, key.url, params.partition)))?;

    json_result(&CacheGetOutput {
        partition: params.partition,
        url: key.url.to_string(),
        status: response.status,
        body: String::from_utf8_lossy(&response.body).into_owned(),
        body_bytes: response.body.len(),
        headers: response.headers,
    })
}
