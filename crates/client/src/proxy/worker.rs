//! One generation of the proxy: its lifecycle and request dispatch.

use std::fmt;
use std::sync::Arc;

use shellcache_core::{
    AppConfig, CachePartitionStore, Error, PartitionKind, PartitionNames, ProxyRequest, ProxyResponse, RequestKey, VersionTag,
};
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinSet;
use url::Url;

use super::route::{Blocklist, Passthrough, Route, route};
use crate::fetch::{Network, resolve};

/// Lifecycle state of a worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    /// Precache manifest is being fetched and stored.
    Installing,
    /// Installed, ready to take over.
    Waiting,
    /// Controlling pages and handling fetches.
    Active,
    /// Replaced by a newer active worker.
    Superseded,
    /// Install failed; this worker will never activate.
    Redundant,
}

impl WorkerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Installing => "installing",
            Self::Waiting => "waiting",
            Self::Active => "active",
            Self::Superseded => "superseded",
            Self::Redundant => "redundant",
        }
    }
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Bodies larger than `max` are served to the caller but never cached.
pub(crate) fn check_cacheable_size(response: &ProxyResponse, max: usize) -> Result<(), Error> {
    if response.body.len() > max {
        return Err(Error::FetchTooLarge(format!("{} bytes exceeds {max}", response.body.len())));
    }
    Ok(())
}

fn is_valid_transition(from: WorkerState, to: WorkerState) -> bool {
    use WorkerState::*;

    matches!(
        (from, to),
        (Installing, Waiting) | (Installing, Redundant) | (Waiting, Active) | (Active, Superseded)
    )
}

/// Where a proxied response came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseSource {
    Cache { partition: String },
    Network,
    /// Produced by the proxy because neither cache nor network could answer.
    Synthetic,
}

/// Result of offering a request to the proxy.
#[derive(Debug, Clone)]
pub enum FetchOutcome {
    /// Not intercepted; the caller should use default network handling.
    Passthrough(Passthrough),
    Respond { response: ProxyResponse, source: ResponseSource },
}

impl FetchOutcome {
    pub(crate) fn cached(response: ProxyResponse, partition: &str) -> Self {
        Self::Respond { response, source: ResponseSource::Cache { partition: partition.to_string() } }
    }

    pub(crate) fn network(response: ProxyResponse) -> Self {
        Self::Respond { response, source: ResponseSource::Network }
    }

    pub(crate) fn synthetic(response: ProxyResponse) -> Self {
        Self::Respond { response, source: ResponseSource::Synthetic }
    }

    pub fn response(&self) -> Option<&ProxyResponse> {
        match self {
            Self::Respond { response, .. } => Some(response),
            Self::Passthrough(_) => None,
        }
    }
}

/// Everything that distinguishes one worker generation from another.
#[derive(Debug, Clone)]
pub struct WorkerOptions {
    pub version: VersionTag,
    /// Origin + path the worker controls.
    pub scope: Url,
    /// Canonical app-shell document, relative to `scope`.
    pub shell_document: String,
    pub manifest: Vec<String>,
    pub blocklist: Blocklist,
    /// Largest response body written to a partition.
    pub max_entry_bytes: usize,
}

impl WorkerOptions {
    pub fn from_config(config: &AppConfig) -> Result<Self, Error> {
        let version = config.version().map_err(|e| Error::InvalidInput(e.to_string()))?;
        let scope = config.origin_url().map_err(|e| Error::InvalidInput(e.to_string()))?;
        Ok(Self {
            version,
            scope,
            shell_document: config.shell_document.clone(),
            manifest: config.precache_manifest.clone(),
            blocklist: Blocklist::new(&config.blocklist),
            max_entry_bytes: config.max_bytes,
        })
    }
}

/// A single proxy generation bound to one version tag.
pub struct Worker<S, N> {
    pub(crate) version: VersionTag,
    pub(crate) names: PartitionNames,
    pub(crate) scope: Url,
    pub(crate) shell: RequestKey,
    manifest: Vec<String>,
    blocklist: Blocklist,
    pub(crate) max_entry_bytes: usize,
    pub(crate) store: Arc<S>,
    pub(crate) network: Arc<N>,
    state: RwLock<WorkerState>,
    refreshes: Mutex<JoinSet<()>>,
}

impl<S, N> Worker<S, N>
where
    S: CachePartitionStore + 'static,
    N: Network + 'static,
{
    pub fn new(options: WorkerOptions, store: Arc<S>, network: Arc<N>) -> Result<Self, Error> {
        let shell_url = resolve(&options.scope, &options.shell_document)
            .map_err(|e| Error::InvalidUrl(format!("shell document {}: {e}", options.shell_document)))?;

        Ok(Self {
            names: PartitionNames::for_version(&options.version),
            version: options.version,
            scope: options.scope,
            shell: RequestKey::get(shell_url),
            manifest: options.manifest,
            blocklist: options.blocklist,
            max_entry_bytes: options.max_entry_bytes,
            store,
            network,
            state: RwLock::new(WorkerState::Installing),
            refreshes: Mutex::new(JoinSet::new()),
        })
    }

    pub fn version(&self) -> &VersionTag {
        &self.version
    }

    pub fn partition_names(&self) -> &PartitionNames {
        &self.names
    }

    pub fn scope(&self) -> &Url {
        &self.scope
    }

    pub async fn state(&self) -> WorkerState {
        *self.state.read().await
    }

    async fn transition(&self, to: WorkerState) -> Result<(), Error> {
        let mut state = self.state.write().await;
        if !is_valid_transition(*state, to) {
            return Err(Error::InvalidState(format!("worker {}: {} -> {}", self.version, *state, to)));
        }
        tracing::debug!(version = %self.version, from = %*state, to = %to, "worker state change");
        *state = to;
        Ok(())
    }

    /// Fetch every manifest entry and store all of them in the precache
    /// partition, or none of them.
    ///
    /// Any transport failure or non-2xx response fails the whole install and
    /// leaves the worker `Redundant`. Returns the number of entries stored.
    pub async fn install(&self) -> Result<usize, Error> {
        let current = self.state().await;
        if current != WorkerState::Installing {
            return Err(Error::InvalidState(format!("worker {} cannot install from {current}", self.version)));
        }

        match self.precache().await {
            Ok(count) => {
                self.transition(WorkerState::Waiting).await?;
                tracing::info!(version = %self.version, entries = count, "precache installed");
                Ok(count)
            }
            Err(e) => {
                self.transition(WorkerState::Redundant).await?;
                tracing::warn!(version = %self.version, error = %e, "precache install failed");
                Err(e)
            }
        }
    }

    async fn precache(&self) -> Result<usize, Error> {
        let mut requests = Vec::with_capacity(self.manifest.len());
        for path in &self.manifest {
            let url = resolve(&self.scope, path).map_err(|e| Error::InstallFailed(format!("{path}: {e}")))?;
            requests.push((path.clone(), ProxyRequest::get(url)));
        }

        let mut join_set = JoinSet::new();
        for (index, (path, request)) in requests.into_iter().enumerate() {
            let network = Arc::clone(&self.network);
            join_set.spawn(async move {
                let result = network.fetch(&request).await;
                (index, path, request, result)
            });
        }

        let mut fetched: Vec<Option<(RequestKey, ProxyResponse)>> = vec![None; self.manifest.len()];
        while let Some(joined) = join_set.join_next().await {
            let (index, path, request, result) =
                joined.map_err(|e| Error::InstallFailed(format!("precache task failed: {e}")))?;
            let response = result.map_err(|e| Error::InstallFailed(format!("{path}: {e}")))?;
            if !response.is_ok() {
                return Err(Error::InstallFailed(format!("{path}: status {}", response.status)));
            }
            check_cacheable_size(&response, self.max_entry_bytes)
                .map_err(|e| Error::InstallFailed(format!("{path}: {e}")))?;
            fetched[index] = Some((request.key(), response));
        }

        let entries: Vec<(RequestKey, ProxyResponse)> = fetched.into_iter().flatten().collect();
        self.store
            .put_all(&self.names.precache, &entries)
            .await
            .map_err(|e| Error::InstallFailed(format!("storing precache: {e}")))?;

        Ok(entries.len())
    }

    /// Reclaim every partition that does not belong to this version, make
    /// sure this version's partitions exist, and go active.
    ///
    /// Returns the names of the deleted partitions.
    pub async fn activate(&self) -> Result<Vec<String>, Error> {
        let current = self.state().await;
        if current != WorkerState::Waiting {
            return Err(Error::InvalidState(format!("worker {} cannot activate from {current}", self.version)));
        }

        let deleted = self.store.delete_all_except(&self.names.all()).await?;
        for name in self.names.all() {
            self.store.open(name).await?;
        }

        self.transition(WorkerState::Active).await?;
        tracing::info!(version = %self.version, deleted = ?deleted, "worker activated");
        Ok(deleted)
    }

    pub(crate) async fn supersede(&self) -> Result<(), Error> {
        self.transition(WorkerState::Superseded).await
    }

    /// Route one intercepted request.
    ///
    /// Never fails: anything the proxy cannot answer becomes either a
    /// passthrough or a synthetic failure response.
    pub async fn handle(&self, request: &ProxyRequest) -> FetchOutcome {
        match route(request, &self.scope, &self.blocklist) {
            Route::Passthrough(reason) => {
                tracing::trace!(url = %request.url, reason = reason.as_str(), "not intercepted");
                FetchOutcome::Passthrough(reason)
            }
            Route::Navigation => self.serve_navigation(request).await,
            Route::Asset => {
                self.serve_stale_while_revalidate(request, self.names.get(PartitionKind::Assets)).await
            }
            Route::Media => self.serve_cache_first(request, self.names.get(PartitionKind::Media), true).await,
            Route::SameOrigin => self.serve_cache_first(request, self.names.get(PartitionKind::Assets), false).await,
        }
    }

    /// Run `fut` in the background, tracked so [`Worker::settle`] can wait for it.
    pub(crate) async fn spawn_background<F>(&self, fut: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut refreshes = self.refreshes.lock().await;
        while refreshes.try_join_next().is_some() {}
        refreshes.spawn(fut);
    }

    /// Wait for every background refresh started so far.
    ///
    /// Refreshes spawned while this runs are not waited for.
    pub async fn settle(&self) {
        let mut pending = std::mem::take(&mut *self.refreshes.lock().await);
        while pending.join_next().await.is_some() {}
    }
}
