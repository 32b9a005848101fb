//! SQLite-backed partitioned response cache.
//!
//! This module provides the [`CachePartitionStore`] abstraction and its
//! persistent implementation using SQLite with async access via
//! tokio-rusqlite. It supports:
//!
//! - Named partitions derived from a deployment version tag
//! - Content-addressed entry keys (SHA-256 of method + URL)
//! - Query-insensitive lookups for the app shell
//! - Atomic multi-entry writes for precache installs
//! - Automatic schema migrations and WAL mode

pub mod connection;
pub mod entries;
pub mod hash;
pub mod migrations;
pub mod partition;
pub mod store;

pub use crate::Error;

pub use connection::CacheDb;
pub use partition::{PartitionKind, PartitionNames, VersionTag};
pub use store::{CachePartitionStore, MatchOptions, PartitionInfo};
