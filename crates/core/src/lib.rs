//! Core types and shared functionality for shellcache.
//!
//! This crate provides:
//! - The partitioned response cache and its SQLite backend
//! - Request/response value types seen by the proxy
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;
pub mod http;

pub use cache::{CacheDb, CachePartitionStore, MatchOptions, PartitionInfo, PartitionKind, PartitionNames, VersionTag};
pub use config::{AppConfig, ConfigError};
pub use error::Error;
pub use http::{Method, ProxyRequest, ProxyResponse, RequestKey, RequestMode};
