//! Test fixtures for tool implementations.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use rmcp::model::CallToolResult;
use serde::de::DeserializeOwned;
use shellcache_client::fetch::Network;
use shellcache_core::{AppConfig, CacheDb, Error, ProxyRequest, ProxyResponse};
use url::Url;

use crate::context::ProxyContext;

pub const ORIGIN: &str = "https://checkpoints.example.com/";

/// Canned upstream: unknown URLs answer 404, offline fails every fetch.
pub struct StubNetwork {
    routes: Mutex<HashMap<String, ProxyResponse>>,
    online: AtomicBool,
}

impl StubNetwork {
    pub fn new() -> Self {
        Self { routes: Mutex::new(HashMap::new()), online: AtomicBool::new(true) }
    }

    pub fn serve(&self, path: &str, status: u16, body: &str) {
        let url = Url::parse(ORIGIN).unwrap().join(path).unwrap();
        let response = ProxyResponse::new(status, body.as_bytes()).with_header("content-type", "text/plain");
        self.routes.lock().unwrap().insert(url.to_string(), response);
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }
}

#[async_trait]
impl Network for StubNetwork {
    async fn fetch(&self, request: &ProxyRequest) -> Result<ProxyResponse, Error> {
        if !self.online.load(Ordering::SeqCst) {
            return Err(Error::Network(format!("offline: {}", request.url)));
        }
        let routes = self.routes.lock().unwrap();
        Ok(routes.get(request.url.as_str()).cloned().unwrap_or_else(|| ProxyResponse::new(404, "not found")))
    }
}

pub async fn context(network: StubNetwork, manifest: &[&str]) -> ProxyContext<CacheDb, StubNetwork> {
    let config = AppConfig {
        version_tag: "v1".into(),
        origin: ORIGIN.into(),
        precache_manifest: manifest.iter().map(|p| p.to_string()).collect(),
        blocklist: vec!["firestore.googleapis.com".into()],
        ..Default::default()
    };
    let store = Arc::new(CacheDb::open_in_memory().await.unwrap());
    ProxyContext::new(config, store, Arc::new(network))
}

/// Decode the JSON text content of a tool result.
pub fn output<T: DeserializeOwned>(result: &CallToolResult) -> T {
    let content_val = serde_json::to_value(&result.content[0]).unwrap();
    let text = content_val.get("text").and_then(|v| v.as_str()).expect("Expected text field in content");
    serde_json::from_str(text).unwrap()
}
