//! Translation of low-level registry notifications into change events.
//!
//! At most one [`DataChangedEventListener`] is registered per discovery id in
//! the [`ListenerRegistry`]; re-registering replaces the previous listener.

mod parser;
mod sync_listener;

#[cfg(test)]
mod sync_listener_test;

use std::sync::Arc;

use dashmap::DashMap;
#[cfg(test)]
use mockall::automock;
pub use parser::*;
pub use sync_listener::*;
use tracing::debug;

use crate::RegistryChangeEvent;
use crate::Result;
use crate::SyncRecord;

#[cfg_attr(test, automock)]
pub trait DataChangedEventListener: Send + Sync + 'static {
    /// Invoked by a connector watch for every registry change under the
    /// watched key.
    fn on_change(
        &self,
        event: RegistryChangeEvent,
    ) -> Result<()>;

    /// Binds another route context to this listener. The listener decides
    /// whether the context is new.
    fn add_listener(
        &self,
        record: SyncRecord,
    );
}

/// discovery id -> active listener
#[derive(Default)]
pub struct ListenerRegistry {
    listeners: DashMap<String, Arc<dyn DataChangedEventListener>>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last write wins. Returns the replaced listener, if any.
    pub fn add(
        &self,
        discovery_id: &str,
        listener: Arc<dyn DataChangedEventListener>,
    ) -> Option<Arc<dyn DataChangedEventListener>> {
        let previous = self.listeners.insert(discovery_id.to_string(), listener);
        if previous.is_some() {
            debug!(discovery_id, "replaced data changed listener");
        }
        previous
    }

    pub fn get(
        &self,
        discovery_id: &str,
    ) -> Option<Arc<dyn DataChangedEventListener>> {
        self.listeners.get(discovery_id).map(|l| l.value().clone())
    }

    pub fn remove(
        &self,
        discovery_id: &str,
    ) -> Option<Arc<dyn DataChangedEventListener>> {
        self.listeners.remove(discovery_id).map(|(_, l)| l)
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }
}
