//! # discovery-sync
//!
//! Discovery reconciliation core for an API-gateway control plane.
//!
//! Registry connectors report live backend instances per route; the
//! [`DefaultDiscoveryProcessor`] reconciles them against persisted upstream
//! records and publishes [`ChangeEvent`]s describing the desired routing
//! state.
//!
//! ## Key Traits
//!
//! - [`RegistryConnector`] - Pluggable service-registry backend
//! - [`UpstreamStore`] - Durable upstream records per route handler
//! - [`EventPublisher`] - Fire-and-forget change-event sink
//! - [`DataChangedEventListener`] - Watch callback turning registry changes
//!   into store writes and events

mod config;
mod connector;
mod constants;
mod errors;
mod event;
mod listener;
mod metrics;
mod model;
mod processor;
mod storage;
pub mod utils;

pub use config::*;
pub use connector::*;
pub use constants::*;
pub use errors::*;
pub use event::*;
pub use listener::*;
pub use metrics::*;
pub use model::*;
pub use processor::*;
pub use storage::*;

//-----------------------------------------------------------
// Test utils

#[cfg(test)]
pub mod test_utils;
