//! The partitioned cache abstraction the proxy is written against.

use async_trait::async_trait;

use crate::Error;
use crate::http::{ProxyResponse, RequestKey};

/// Lookup options for [`CachePartitionStore::match_request`].
#[derive(Debug, Clone, Copy, Default)]
pub struct MatchOptions {
    /// Match on the URL with its query string removed.
    pub ignore_search: bool,
}

impl MatchOptions {
    pub fn ignore_search() -> Self {
        Self { ignore_search: true }
    }
}

/// Summary of one partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionInfo {
    pub name: String,
    pub entries: u64,
}

/// A set of named cache partitions, each mapping request identities to
/// captured responses.
///
/// Individual operations are atomic; nothing else is. Two concurrent `put`s
/// for the same key resolve as last-write-wins.
#[async_trait]
pub trait CachePartitionStore: Send + Sync {
    /// Create the partition if it does not exist yet.
    async fn open(&self, partition: &str) -> Result<(), Error>;

    /// Names of every existing partition.
    async fn partitions(&self) -> Result<Vec<PartitionInfo>, Error>;

    /// Look up a stored response.
    ///
    /// With `ignore_search`, the first entry whose URL matches once the query
    /// string is dropped is returned.
    async fn match_request(
        &self, partition: &str, key: &RequestKey, options: MatchOptions,
    ) -> Result<Option<ProxyResponse>, Error>;

    /// Store a response, replacing any previous entry for the same key.
    ///
    /// Never creates the partition: writing to a partition that was never
    /// opened, or has been deleted, fails with `CACHE_MISS`.
    async fn put(&self, partition: &str, key: &RequestKey, response: &ProxyResponse) -> Result<(), Error>;

    /// Store several responses so that either all or none become visible.
    /// Creates the partition if needed.
    async fn put_all(&self, partition: &str, entries: &[(RequestKey, ProxyResponse)]) -> Result<(), Error>;

    /// Stored request URLs of a partition, oldest first.
    async fn keys(&self, partition: &str) -> Result<Vec<String>, Error>;

    /// Delete a partition and everything in it. Returns false if it did not exist.
    async fn delete(&self, partition: &str) -> Result<bool, Error>;

    /// Delete every partition not named in `keep`. Returns the deleted names.
    async fn delete_all_except(&self, keep: &[&str]) -> Result<Vec<String>, Error> {
        let mut deleted = Vec::new();
        for info in self.partitions().await? {
            if keep.contains(&info.name.as_str()) {
                continue;
            }
            if self.delete(&info.name).await? {
                deleted.push(info.name);
            }
        }
        Ok(deleted)
    }
}
