//! Fakes shared by the proxy tests.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use shellcache_core::{
    CachePartitionStore, Error, MatchOptions, PartitionInfo, ProxyRequest, ProxyResponse, RequestKey, VersionTag,
};
use url::Url;

use super::route::Blocklist;
use super::worker::WorkerOptions;
use crate::fetch::Network;

pub const SCOPE: &str = "https://checkpoints.example.com/";

pub fn scope_url(path: &str) -> Url {
    Url::parse(SCOPE).unwrap().join(path).unwrap()
}

pub fn options(version: &str, manifest: &[&str]) -> WorkerOptions {
    WorkerOptions {
        version: VersionTag::new(version).unwrap(),
        scope: Url::parse(SCOPE).unwrap(),
        shell_document: "./index.html".to_string(),
        manifest: manifest.iter().map(|p| p.to_string()).collect(),
        blocklist: Blocklist::new(["firestore.googleapis.com", "www.gstatic.com"]),
        max_entry_bytes: 5 * 1024 * 1024,
    }
}

/// Canned upstream. Unknown URLs answer 404; offline means every fetch is a
/// transport error.
pub struct StubNetwork {
    routes: Mutex<HashMap<String, ProxyResponse>>,
    online: AtomicBool,
    calls: AtomicUsize,
}

impl StubNetwork {
    pub fn new() -> Self {
        Self { routes: Mutex::new(HashMap::new()), online: AtomicBool::new(true), calls: AtomicUsize::new(0) }
    }

    /// Answer `path` (relative to the scope, or absolute) with `status` and `body`.
    pub fn serve(&self, path: &str, status: u16, body: &str) {
        let response = ProxyResponse::new(status, body.as_bytes()).with_header("content-type", "text/plain");
        self.routes.lock().unwrap().insert(scope_url(path).to_string(), response);
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Network for StubNetwork {
    async fn fetch(&self, request: &ProxyRequest) -> Result<ProxyResponse, Error> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.online.load(Ordering::SeqCst) {
            return Err(Error::Network(format!("offline: {}", request.url)));
        }
        let routes = self.routes.lock().unwrap();
        Ok(routes.get(request.url.as_str()).cloned().unwrap_or_else(|| ProxyResponse::new(404, "not found")))
    }
}

/// A store whose every operation fails.
pub struct FailingStore;

fn broken() -> Error {
    Error::CorruptEntry("disk unavailable".to_string())
}

#[async_trait]
impl CachePartitionStore for FailingStore {
    async fn open(&self, _partition: &str) -> Result<(), Error> {
        Err(broken())
    }

    async fn partitions(&self) -> Result<Vec<PartitionInfo>, Error> {
        Err(broken())
    }

    async fn match_request(
        &self, _partition: &str, _key: &RequestKey, _options: MatchOptions,
    ) -> Result<Option<ProxyResponse>, Error> {
        Err(broken())
    }

    async fn put(&self, _partition: &str, _key: &RequestKey, _response: &ProxyResponse) -> Result<(), Error> {
        Err(broken())
    }

    async fn put_all(&self, _partition: &str, _entries: &[(RequestKey, ProxyResponse)]) -> Result<(), Error> {
        Err(broken())
    }

    async fn keys(&self, _partition: &str) -> Result<Vec<String>, Error> {
        Err(broken())
    }

    async fn delete(&self, _partition: &str) -> Result<bool, Error> {
        Err(broken())
    }
}
