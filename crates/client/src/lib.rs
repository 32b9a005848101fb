//! Client side of shellcache.
//!
//! This crate provides the upstream network seam and the offline cache
//! proxy built on top of it.

pub mod fetch;
pub mod proxy;

pub use fetch::{FetchConfig, HttpNetwork, Network};
pub use proxy::{DeployReport, FetchOutcome, Registration, ResponseSource, Worker, WorkerOptions, WorkerState};
