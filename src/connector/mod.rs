//! Pluggable registry backends.
//!
//! A connector is selected by type tag through [`ConnectorFactory`]. The core
//! never talks to a registry protocol directly; it only relies on the five
//! operations of [`RegistryConnector`].

mod factory;
mod local;


use std::collections::HashMap;
use std::sync::Arc;

pub use factory::*;
pub use local::*;
#[cfg(test)]
use mockall::automock;

use crate::DataChangedEventListener;
use crate::DiscoveredInstance;
use crate::Result;

/// Connection parameters handed to [`RegistryConnector::init`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegisterConfig {
    pub register_type: String,
    pub server_lists: Vec<String>,
    pub props: HashMap<String, String>,
}

#[cfg_attr(test, automock)]
pub trait RegistryConnector: Send + Sync + 'static {
    fn init(
        &self,
        config: &RegisterConfig,
    ) -> Result<()>;

    /// Live instances under `watch_key`
    fn select_instances(
        &self,
        watch_key: &str,
    ) -> Result<Vec<DiscoveredInstance>>;

    /// Subscribe `listener` to changes under `watch_key`. The connector may
    /// invoke the listener from any thread, including the calling one.
    fn watch_instances(
        &self,
        watch_key: &str,
        listener: Arc<dyn DataChangedEventListener>,
    ) -> Result<()>;

    fn unwatch_instances(
        &self,
        watch_key: &str,
    ) -> Result<()>;

    fn close(&self) -> Result<()>;
}
