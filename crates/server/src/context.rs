//! Shared state behind the tool handlers.

use std::sync::Arc;

use shellcache_client::fetch::Network;
use shellcache_client::{DeployReport, Registration, Worker, WorkerOptions};
use shellcache_core::{AppConfig, CachePartitionStore, Error, VersionTag};

/// The configured proxy: its store, its network and the registration that
/// holds the active worker.
pub struct ProxyContext<S, N> {
    pub config: AppConfig,
    pub store: Arc<S>,
    pub network: Arc<N>,
    pub registration: Registration<S, N>,
}

impl<S, N> ProxyContext<S, N>
where
    S: CachePartitionStore + 'static,
    N: Network + 'static,
{
    pub fn new(config: AppConfig, store: Arc<S>, network: Arc<N>) -> Self {
        Self { config, store, network, registration: Registration::new() }
    }

    /// Build a worker from the configuration, optionally overriding the
    /// version tag and the precache manifest.
    pub fn build_worker(&self, version: Option<&str>, manifest: Option<Vec<String>>) -> Result<Worker<S, N>, Error> {
        let mut options = WorkerOptions::from_config(&self.config)?;

        if let Some(version) = version {
            options.version = VersionTag::new(version)?;
        }

        if let Some(manifest) = manifest {
            if manifest.is_empty() || manifest.iter().any(|p| p.trim().is_empty()) {
                return Err(Error::InvalidInput("manifest entries cannot be empty".into()));
            }
            options.manifest = manifest;
        }

        Worker::new(options, Arc::clone(&self.store), Arc::clone(&self.network))
    }

    /// Deploy the version named in the configuration.
    pub async fn deploy_configured(&self) -> Result<DeployReport, Error> {
        let worker = self.build_worker(None, None)?;
        self.registration.deploy(worker).await
    }
}
