//! proxy_fetch tool implementation.
//!
//! Offers one request to the active worker, the way a page's fetch would be
//! intercepted. Requests the worker declines are completed on the network
//! directly.

use std::collections::BTreeMap;

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use shellcache_client::fetch::{Network, resolve};
use shellcache_client::{FetchOutcome, ResponseSource};
use shellcache_core::{CachePartitionStore, Method, ProxyRequest, ProxyResponse, RequestMode};

use super::json_result;
use crate::context::ProxyContext;
use crate::error::ServerError;

/// Input parameters for the proxy_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ProxyFetchParams {
    /// Request URL. Relative URLs resolve against the configured origin.
    pub url: String,

    /// HTTP method (default: GET).
    #[serde(default)]
    pub method: Method,

    /// Request mode: "navigate", "same-origin", "no-cors" (default) or "cors".
    #[serde(default)]
    pub mode: RequestMode,

    /// Optional Accept header.
    #[serde(default)]
    pub accept: Option<String>,
}

/// Output structure for the proxy_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ProxyFetchOutput {
    /// The resolved request URL.
    pub url: String,
    /// One of "cache", "network", "synthetic" or "passthrough".
    pub source: String,
    /// Partition that answered, for cache hits.
    pub partition: Option<String>,
    /// Why the proxy declined the request, for passthroughs.
    pub passthrough_reason: Option<String>,
    pub status: u16,
    pub content_type: Option<String>,
    pub headers: BTreeMap<String, String>,
    /// Response body, decoded as UTF-8 (lossy).
    pub body: String,
    pub body_bytes: usize,
}

impl ProxyFetchOutput {
    fn new(
        request: &ProxyRequest, source: &str, partition: Option<String>, reason: Option<&str>, response: ProxyResponse,
    ) -> Self {
        Self {
            url: request.url.to_string(),
            source: source.to_string(),
            partition,
            passthrough_reason: reason.map(str::to_string),
            status: response.status,
            content_type: response.content_type().map(str::to_string),
            body: String::from_utf8_lossy(&response.body).into_owned(),
            body_bytes: response.body.len(),
            headers: response.headers,
        }
    }
}

/// Implementation of the proxy_fetch tool.
pub async fn fetch_impl<S, N>(ctx: &ProxyContext<S, N>, params: ProxyFetchParams) -> Result<CallToolResult, McpError>
where
    S: CachePartitionStore + 'static,
    N: Network + 'static,
{
    let scope = ctx.config.origin_url().map_err(|e| ServerError::InvalidInput(e.to_string()))?;
    let url = resolve(&scope, &params.url).map_err(|e| ServerError::InvalidInput(format!("url: {e}")))?;

    let mut request = ProxyRequest::new(params.method, url).with_mode(params.mode);
    if let Some(accept) = params.accept {
        request = request.with_header("accept", accept);
    }

    let output = match ctx.registration.handle(&request).await {
        FetchOutcome::Respond { response, source } => {
            let (label, partition) = match source {
                ResponseSource::Cache { partition } => ("cache", Some(partition)),
                ResponseSource::Network => ("network", None),
                ResponseSource::Synthetic => ("synthetic", None),
            };
            ProxyFetchOutput::new(&request, label, partition, None, response)
        }
        FetchOutcome::Passthrough(reason) => {
            tracing::debug!(url = %request.url, reason = reason.as_str(), "not intercepted, fetching directly");
            let response = ctx.network.fetch(&request).await?;
            ProxyFetchOutput::new(&request, "passthrough", None, Some(reason.as_str()), response)
        }
    };

    json_result(&output)
}
