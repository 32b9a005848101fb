//! The offline cache proxy.
//!
//! ### Lifecycle
//! A [`Worker`] is one generation of the proxy, tied to a version tag. It
//! moves `installing -> waiting -> active -> superseded`; a failed install
//! ends in `redundant` instead. [`Registration::deploy`] drives a worker
//! through install and activation and swaps it in as the controller.
//!
//! ### Partitions
//! Each version owns three partitions: `precache-<tag>`, `assets-<tag>` and
//! `media-<tag>`. Activating a version deletes every other partition.
//!
//! ### Routing
//! See [`route`] for the decision order. Strategies never fail: when neither
//! cache nor network can answer, the caller gets a synthetic response.

pub mod registration;
pub mod route;
mod strategy;
pub mod worker;

#[cfg(test)]
pub(crate) mod test_support;

pub use registration::{DeployReport, Registration};
pub use route::{Blocklist, Passthrough, ResourceClass, Route, route};
pub use strategy::OFFLINE_BODY;
pub use worker::{FetchOutcome, ResponseSource, Worker, WorkerOptions, WorkerState};
