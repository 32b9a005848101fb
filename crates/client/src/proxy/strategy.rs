//! Caching strategies, one per route.
//!
//! Every strategy answers: a cache lookup that errors is treated like a
//! network failure with nothing cached, and a network failure with nothing
//! cached becomes a synthetic response.

use std::sync::Arc;

use shellcache_core::{CachePartitionStore, Error, MatchOptions, ProxyRequest, ProxyResponse, RequestKey};

use super::worker::{FetchOutcome, Worker, check_cacheable_size};
use crate::fetch::{Network, is_same_origin};

/// Body of the synthetic response for a navigation nobody can answer.
pub const OFFLINE_BODY: &str = "Offline";

fn offline_document() -> ProxyResponse {
    ProxyResponse::synthetic(503, OFFLINE_BODY)
}

fn gateway_timeout() -> ProxyResponse {
    ProxyResponse::synthetic(504, "")
}

impl<S, N> Worker<S, N>
where
    S: CachePartitionStore + 'static,
    N: Network + 'static,
{
    /// Shell first, then the request itself with its query string ignored.
    async fn lookup_shell(&self, request: &ProxyRequest) -> Result<Option<ProxyResponse>, Error> {
        let precache = &self.names.precache;
        if let Some(shell) = self.store.match_request(precache, &self.shell, MatchOptions::default()).await? {
            return Ok(Some(shell));
        }
        self.store.match_request(precache, &request.key(), MatchOptions::ignore_search()).await
    }

    /// Cache-first with background refresh of the canonical shell document.
    pub(crate) async fn serve_navigation(&self, request: &ProxyRequest) -> FetchOutcome {
        let precache = &self.names.precache;

        match self.lookup_shell(request).await {
            Ok(Some(cached)) => {
                tracing::debug!(url = %request.url, "navigation served from shell cache");
                self.refresh_in_background(request.clone(), self.shell.clone(), precache.clone()).await;
                return FetchOutcome::cached(cached, precache);
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(url = %request.url, error = %e, "shell lookup failed");
                return FetchOutcome::synthetic(offline_document());
            }
        }

        match self.network.fetch(request).await {
            Ok(fresh) => {
                if fresh.is_ok() {
                    self.store_quietly(precache, &self.shell, &fresh).await;
                }
                FetchOutcome::network(fresh)
            }
            Err(e) => {
                tracing::debug!(url = %request.url, error = %e, "navigation fetch failed");
                match self.store.match_request(precache, &self.shell, MatchOptions::default()).await {
                    Ok(Some(shell)) => FetchOutcome::cached(shell, precache),
                    _ => FetchOutcome::synthetic(offline_document()),
                }
            }
        }
    }

    /// Serve the cached copy immediately and refresh it behind the caller's back.
    pub(crate) async fn serve_stale_while_revalidate(&self, request: &ProxyRequest, partition: &str) -> FetchOutcome {
        let key = request.key();
        let same_origin = is_same_origin(&self.scope, &request.url);

        let cached = match self.store.match_request(partition, &key, MatchOptions::default()).await {
            Ok(cached) => cached,
            Err(e) => {
                tracing::warn!(url = %request.url, partition, error = %e, "cache lookup failed");
                return FetchOutcome::synthetic(gateway_timeout());
            }
        };

        if let Some(cached) = cached {
            tracing::debug!(url = %request.url, partition, "stale hit");
            if same_origin {
                self.refresh_in_background(request.clone(), key, partition.to_string()).await;
            }
            return FetchOutcome::cached(cached, partition);
        }

        match self.network.fetch(request).await {
            Ok(fresh) => {
                if fresh.is_ok() && same_origin {
                    self.store_quietly(partition, &key, &fresh).await;
                }
                FetchOutcome::network(fresh)
            }
            Err(e) => {
                tracing::debug!(url = %request.url, error = %e, "asset fetch failed with nothing cached");
                FetchOutcome::synthetic(gateway_timeout())
            }
        }
    }

    /// Check the partition, fall back to the network, keep a copy of good
    /// responses. With `same_origin_only`, cross-origin responses are
    /// returned but never stored.
    pub(crate) async fn serve_cache_first(
        &self, request: &ProxyRequest, partition: &str, same_origin_only: bool,
    ) -> FetchOutcome {
        let key = request.key();

        match self.store.match_request(partition, &key, MatchOptions::default()).await {
            Ok(Some(cached)) => {
                tracing::debug!(url = %request.url, partition, "cache hit");
                return FetchOutcome::cached(cached, partition);
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(url = %request.url, partition, error = %e, "cache lookup failed");
                return FetchOutcome::synthetic(gateway_timeout());
            }
        }

        match self.network.fetch(request).await {
            Ok(fresh) => {
                let storable = !same_origin_only || is_same_origin(&self.scope, &request.url);
                if fresh.is_ok() && storable {
                    self.store_quietly(partition, &key, &fresh).await;
                }
                FetchOutcome::network(fresh)
            }
            Err(e) => {
                tracing::debug!(url = %request.url, error = %e, "fetch failed with nothing cached");
                FetchOutcome::synthetic(gateway_timeout())
            }
        }
    }

    /// A failed write must not cost the caller the response it already has.
    async fn store_quietly(&self, partition: &str, key: &RequestKey, response: &ProxyResponse) {
        if let Err(e) = check_cacheable_size(response, self.max_entry_bytes) {
            tracing::debug!(url = %key.url, partition, error = %e, "response served but not cached");
            return;
        }
        if let Err(e) = self.store.put(partition, key, response).await {
            tracing::warn!(url = %key.url, partition, error = %e, "cache write failed");
        }
    }

    /// Refetch `request` and, on a 2xx, overwrite `key` in `partition`.
    /// Failures are swallowed; the stale entry keeps serving.
    async fn refresh_in_background(&self, request: ProxyRequest, key: RequestKey, partition: String) {
        let store = Arc::clone(&self.store);
        let network = Arc::clone(&self.network);
        let max_entry_bytes = self.max_entry_bytes;

        self.spawn_background(async move {
            match network.fetch(&request).await {
                Ok(fresh) if fresh.is_ok() => {
                    if let Err(e) = check_cacheable_size(&fresh, max_entry_bytes) {
                        tracing::debug!(url = %key.url, partition, error = %e, "background refresh not stored");
                    } else if let Err(e) = store.put(&partition, &key, &fresh).await {
                        tracing::warn!(url = %key.url, partition, error = %e, "background refresh write failed");
                    }
                }
                Ok(fresh) => {
                    tracing::debug!(url = %request.url, status = fresh.status, "background refresh not stored");
                }
                Err(e) => {
                    tracing::debug!(url = %request.url, error = %e, "background refresh failed");
                }
            }
        })
        .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proxy::{ResponseSource, WorkerOptions};
    use crate::proxy::test_support::{FailingStore, StubNetwork, options, scope_url};
    use shellcache_core::CacheDb;

    async fn active_worker(manifest: &[&str], network: Arc<StubNetwork>) -> Worker<CacheDb, StubNetwork> {
        active_worker_with(options("v1", manifest), network).await
    }

    async fn active_worker_with(opts: WorkerOptions, network: Arc<StubNetwork>) -> Worker<CacheDb, StubNetwork> {
        let store = Arc::new(CacheDb::open_in_memory().await.unwrap());
        let worker = Worker::new(opts, store, network).unwrap();
        worker.install().await.unwrap();
        worker.activate().await.unwrap();
        worker
    }

    fn body(outcome: &FetchOutcome) -> &[u8] {
        &outcome.response().unwrap().body
    }

    #[tokio::test]
    async fn test_navigation_served_offline_from_precache() {
        let network = Arc::new(StubNetwork::new());
        network.serve("./index.html", 200, "<html>shell</html>");
        network.serve("./app.js", 200, "boot()");
        let worker = active_worker(&["./index.html", "./app.js"], Arc::clone(&network)).await;

        network.set_online(false);
        let outcome = worker.handle(&ProxyRequest::navigate(scope_url("./index.html"))).await;

        let response = outcome.response().unwrap();
        assert!(response.is_ok());
        assert_eq!(response.body, b"<html>shell</html>");
    }

    #[tokio::test]
    async fn test_navigation_to_other_path_gets_shell() {
        let network = Arc::new(StubNetwork::new());
        network.serve("./index.html", 200, "<html>shell</html>");
        let worker = active_worker(&["./index.html"], Arc::clone(&network)).await;
        network.set_online(false);

        let outcome = worker.handle(&ProxyRequest::navigate(scope_url("./checkpoint/gate-3?scan=1"))).await;
        assert_eq!(body(&outcome), b"<html>shell</html>");
    }

    #[tokio::test]
    async fn test_navigation_hit_refreshes_shell_in_background() {
        let network = Arc::new(StubNetwork::new());
        network.serve("./index.html", 200, "<html>v1</html>");
        let worker = active_worker(&["./index.html"], Arc::clone(&network)).await;

        network.serve("./index.html", 200, "<html>v1.1</html>");
        let first = worker.handle(&ProxyRequest::navigate(scope_url("./index.html"))).await;
        assert_eq!(body(&first), b"<html>v1</html>");

        worker.settle().await;
        network.set_online(false);
        let second = worker.handle(&ProxyRequest::navigate(scope_url("./index.html"))).await;
        assert_eq!(body(&second), b"<html>v1.1</html>");
    }

    #[tokio::test]
    async fn test_navigation_refresh_writes_under_shell_key() {
        let network = Arc::new(StubNetwork::new());
        network.serve("./index.html", 200, "<html>v1</html>");
        let worker = active_worker(&["./index.html"], Arc::clone(&network)).await;

        network.serve("./history", 200, "<html>history</html>");
        worker.handle(&ProxyRequest::navigate(scope_url("./history"))).await;
        worker.settle().await;

        let keys = worker.store.keys("precache-v1").await.unwrap();
        assert_eq!(keys, vec![scope_url("./index.html").to_string()]);
        let shell = worker
            .store
            .match_request("precache-v1", &worker.shell, MatchOptions::default())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(shell.body, b"<html>history</html>");
    }

    #[tokio::test]
    async fn test_navigation_offline_without_cache_is_synthetic() {
        let network = Arc::new(StubNetwork::new());
        network.serve("./app.js", 200, "boot()");
        let worker = active_worker(&["./app.js"], Arc::clone(&network)).await;
        network.set_online(false);

        let outcome = worker.handle(&ProxyRequest::navigate(scope_url("./"))).await;
        match outcome {
            FetchOutcome::Respond { response, source } => {
                assert_eq!(source, ResponseSource::Synthetic);
                assert!(!response.is_ok());
                assert_eq!(response.content_type(), Some("text/plain"));
                assert!(!response.body.is_empty());
            }
            other => panic!("expected a response, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_navigation_miss_stores_network_result_as_shell() {
        let network = Arc::new(StubNetwork::new());
        network.serve("./app.js", 200, "boot()");
        let worker = active_worker(&["./app.js"], Arc::clone(&network)).await;

        network.serve("./", 200, "<html>root</html>");
        let outcome = worker.handle(&ProxyRequest::navigate(scope_url("./"))).await;
        assert!(matches!(outcome, FetchOutcome::Respond { source: ResponseSource::Network, .. }));

        network.set_online(false);
        let offline = worker.handle(&ProxyRequest::navigate(scope_url("./anything"))).await;
        assert_eq!(body(&offline), b"<html>root</html>");
    }

    #[tokio::test]
    async fn test_asset_stale_while_revalidate() {
        let network = Arc::new(StubNetwork::new());
        network.serve("./index.html", 200, "<html>shell</html>");
        let worker = active_worker(&["./index.html"], Arc::clone(&network)).await;
        worker
            .store
            .put("assets-v1", &RequestKey::get(scope_url("./app.js")), &ProxyResponse::new(200, "stale()"))
            .await
            .unwrap();

        network.serve("./app.js", 200, "fresh()");
        let first = worker.handle(&ProxyRequest::get(scope_url("./app.js"))).await;
        assert_eq!(body(&first), b"stale()");

        worker.settle().await;
        network.set_online(false);
        let second = worker.handle(&ProxyRequest::get(scope_url("./app.js"))).await;
        assert_eq!(body(&second), b"fresh()");
    }

    #[tokio::test]
    async fn test_asset_refresh_failure_keeps_stale_entry() {
        let network = Arc::new(StubNetwork::new());
        network.serve("./index.html", 200, "<html>shell</html>");
        let worker = active_worker(&["./index.html"], Arc::clone(&network)).await;
        let key = RequestKey::get(scope_url("./style.css"));
        worker.store.put("assets-v1", &key, &ProxyResponse::new(200, "body{}")).await.unwrap();

        network.serve("./style.css", 500, "upstream down");
        let outcome = worker.handle(&ProxyRequest::get(scope_url("./style.css"))).await;
        assert_eq!(body(&outcome), b"body{}");
        worker.settle().await;

        let stored = worker.store.match_request("assets-v1", &key, MatchOptions::default()).await.unwrap().unwrap();
        assert_eq!(stored.body, b"body{}");
    }

    #[tokio::test]
    async fn test_asset_miss_waits_for_network_and_stores() {
        let network = Arc::new(StubNetwork::new());
        network.serve("./index.html", 200, "<html>shell</html>");
        network.serve("./libs/jsQR.js", 200, "jsQR()");
        let worker = active_worker(&["./index.html"], Arc::clone(&network)).await;

        let outcome = worker.handle(&ProxyRequest::get(scope_url("./libs/jsQR.js"))).await;
        assert!(matches!(outcome, FetchOutcome::Respond { source: ResponseSource::Network, .. }));

        let keys = worker.store.keys("assets-v1").await.unwrap();
        assert_eq!(keys, vec![scope_url("./libs/jsQR.js").to_string()]);
    }

    #[tokio::test]
    async fn test_asset_cross_origin_not_stored() {
        let network = Arc::new(StubNetwork::new());
        network.serve("./index.html", 200, "<html>shell</html>");
        network.serve("https://unpkg.com/lib.js", 200, "lib()");
        let worker = active_worker(&["./index.html"], Arc::clone(&network)).await;

        let outcome = worker.handle(&ProxyRequest::get(scope_url("https://unpkg.com/lib.js"))).await;
        assert_eq!(body(&outcome), b"lib()");
        assert!(worker.store.keys("assets-v1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_asset_offline_miss_is_synthetic() {
        let network = Arc::new(StubNetwork::new());
        network.serve("./index.html", 200, "<html>shell</html>");
        let worker = active_worker(&["./index.html"], Arc::clone(&network)).await;
        network.set_online(false);

        let outcome = worker.handle(&ProxyRequest::get(scope_url("./app.js"))).await;
        assert!(matches!(
            outcome,
            FetchOutcome::Respond { ref response, source: ResponseSource::Synthetic } if response.status == 504
        ));
    }

    #[tokio::test]
    async fn test_media_cache_first_stores_copy() {
        let network = Arc::new(StubNetwork::new());
        network.serve("./index.html", 200, "<html>shell</html>");
        network.serve("./photo.png", 200, "PNGDATA");
        let worker = active_worker(&["./index.html"], Arc::clone(&network)).await;

        let outcome = worker.handle(&ProxyRequest::get(scope_url("./photo.png"))).await;
        assert_eq!(body(&outcome), b"PNGDATA");
        assert_eq!(worker.store.keys("media-v1").await.unwrap(), vec![scope_url("./photo.png").to_string()]);

        let calls = network.calls();
        network.set_online(false);
        let again = worker.handle(&ProxyRequest::get(scope_url("./photo.png"))).await;
        assert!(matches!(again, FetchOutcome::Respond { source: ResponseSource::Cache { .. }, .. }));
        assert_eq!(body(&again), b"PNGDATA");
        assert_eq!(network.calls(), calls);
    }

    #[tokio::test]
    async fn test_media_error_status_not_stored() {
        let network = Arc::new(StubNetwork::new());
        network.serve("./index.html", 200, "<html>shell</html>");
        let worker = active_worker(&["./index.html"], Arc::clone(&network)).await;

        let outcome = worker.handle(&ProxyRequest::get(scope_url("./missing.png"))).await;
        assert_eq!(outcome.response().unwrap().status, 404);
        assert!(worker.store.keys("media-v1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_same_origin_fallback_uses_assets_partition() {
        let network = Arc::new(StubNetwork::new());
        network.serve("./index.html", 200, "<html>shell</html>");
        network.serve("./manifest.json", 200, "{\"name\":\"rondas\"}");
        let worker = active_worker(&["./index.html"], Arc::clone(&network)).await;

        worker.handle(&ProxyRequest::get(scope_url("./manifest.json"))).await;
        network.set_online(false);
        let outcome = worker.handle(&ProxyRequest::get(scope_url("./manifest.json"))).await;
        assert!(matches!(
            outcome,
            FetchOutcome::Respond { source: ResponseSource::Cache { ref partition }, .. } if partition == "assets-v1"
        ));
    }

    #[tokio::test]
    async fn test_cache_failure_is_synthetic_response() {
        let network = Arc::new(StubNetwork::new());
        network.serve("./photo.png", 200, "PNGDATA");
        let worker = Worker::new(options("v1", &["./index.html"]), Arc::new(FailingStore), network).unwrap();

        let media = worker.serve_cache_first(&ProxyRequest::get(scope_url("./photo.png")), "media-v1", true).await;
        assert!(matches!(media, FetchOutcome::Respond { source: ResponseSource::Synthetic, .. }));

        let nav = worker.serve_navigation(&ProxyRequest::navigate(scope_url("./"))).await;
        assert_eq!(nav.response().unwrap().status, 503);
    }

    #[tokio::test]
    async fn test_oversized_response_served_but_not_cached() {
        let network = Arc::new(StubNetwork::new());
        network.serve("./app.js", 200, "boot()");
        let big = "x".repeat(2048);
        network.serve("./photo.png", 200, &big);
        network.serve("./bundle.js", 200, &big);
        network.serve("./", 200, &big);
        let opts = WorkerOptions { max_entry_bytes: 1024, ..options("v1", &["./app.js"]) };
        let worker = active_worker_with(opts, Arc::clone(&network)).await;

        for request in [
            ProxyRequest::get(scope_url("./photo.png")),
            ProxyRequest::get(scope_url("./bundle.js")),
            ProxyRequest::navigate(scope_url("./")),
        ] {
            let outcome = worker.handle(&request).await;
            assert!(matches!(outcome, FetchOutcome::Respond { source: ResponseSource::Network, .. }));
            let response = outcome.response().unwrap();
            assert_eq!(response.status, 200);
            assert_eq!(response.body.len(), 2048);
        }

        assert!(worker.store.keys("media-v1").await.unwrap().is_empty());
        assert!(worker.store.keys("assets-v1").await.unwrap().is_empty());
        assert_eq!(worker.store.keys("precache-v1").await.unwrap(), vec![scope_url("./app.js").to_string()]);
    }

    #[tokio::test]
    async fn test_oversized_refresh_keeps_cached_copy() {
        let network = Arc::new(StubNetwork::new());
        network.serve("./index.html", 200, "<html>shell</html>");
        let opts = WorkerOptions { max_entry_bytes: 1024, ..options("v1", &["./index.html"]) };
        let worker = active_worker_with(opts, Arc::clone(&network)).await;

        network.serve("./index.html", 200, &"x".repeat(2048));
        worker.handle(&ProxyRequest::navigate(scope_url("./"))).await;
        worker.settle().await;

        network.set_online(false);
        let outcome = worker.handle(&ProxyRequest::navigate(scope_url("./"))).await;
        assert_eq!(body(&outcome), b"<html>shell</html>");
    }
}
