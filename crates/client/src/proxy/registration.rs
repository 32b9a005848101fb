//! The slot holding the active worker, and the deploy sequence that replaces it.

use std::sync::Arc;

use serde::Serialize;
use shellcache_core::{CachePartitionStore, Error, ProxyRequest};
use tokio::sync::{Mutex, RwLock};

use super::route::Passthrough;
use super::worker::{FetchOutcome, Worker};
use crate::fetch::Network;

/// Summary of a completed deploy.
#[derive(Debug, Clone, Serialize)]
pub struct DeployReport {
    pub version: String,
    pub previous_version: Option<String>,
    /// Number of precache entries stored during install.
    pub precached: usize,
    pub deleted_partitions: Vec<String>,
    /// True when a previous worker was superseded.
    pub controller_changed: bool,
}

/// Owns the currently active worker, if any.
///
/// Requests go to whichever worker is active when they arrive; a request
/// already in flight keeps the worker it started with.
pub struct Registration<S, N> {
    active: RwLock<Option<Arc<Worker<S, N>>>>,
    deploy_lock: Mutex<()>,
}

impl<S, N> Default for Registration<S, N> {
    fn default() -> Self {
        Self { active: RwLock::new(None), deploy_lock: Mutex::new(()) }
    }
}

impl<S, N> Registration<S, N>
where
    S: CachePartitionStore + 'static,
    N: Network + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn active(&self) -> Option<Arc<Worker<S, N>>> {
        self.active.read().await.clone()
    }

    /// Install `worker`, activate it and make it the controller.
    ///
    /// Deploys are serialized. If install fails the current controller is
    /// untouched and keeps serving.
    pub async fn deploy(&self, worker: Worker<S, N>) -> Result<DeployReport, Error> {
        let _guard = self.deploy_lock.lock().await;

        let version = worker.version().to_string();
        tracing::info!(version = %version, "deploying worker");

        let precached = worker.install().await?;
        let deleted_partitions = worker.activate().await?;

        let previous = self.active.write().await.replace(Arc::new(worker));
        let previous_version = match &previous {
            Some(old) => {
                old.supersede().await?;
                Some(old.version().to_string())
            }
            None => None,
        };

        tracing::info!(
            version = %version,
            previous = previous_version.as_deref().unwrap_or("none"),
            "controller changed"
        );

        Ok(DeployReport {
            version,
            controller_changed: previous_version.is_some(),
            previous_version,
            precached,
            deleted_partitions,
        })
    }

    /// Offer a request to the active worker.
    pub async fn handle(&self, request: &ProxyRequest) -> FetchOutcome {
        match self.active().await {
            Some(worker) => worker.handle(request).await,
            None => FetchOutcome::Passthrough(Passthrough::NoController),
        }
    }

    /// Wait for the active worker's background refreshes.
    pub async fn settle(&self) {
        if let Some(worker) = self.active().await {
            worker.settle().await;
        }
    }
}
