use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use dashmap::DashMap;
use serde_json::json;
use tracing::debug;
use tracing::info;

use super::RegisterConfig;
use super::RegistryConnector;
use crate::constants::LOCAL_REGISTRY_TYPE;
use crate::ConnectorError;
use crate::DataChangedEventListener;
use crate::DiscoveredInstance;
use crate::RegistryChangeEvent;
use crate::RegistryEventKind;
use crate::Result;

/// In-process registry backend.
///
/// Instances are registered programmatically per watch key; watchers are
/// notified synchronously on the registering thread.
#[derive(Default)]
pub struct LocalConnector {
    initialized: AtomicBool,
    instances: DashMap<String, Vec<DiscoveredInstance>>,
    watchers: DashMap<String, Arc<dyn DataChangedEventListener>>,
}

impl LocalConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    pub fn is_watching(
        &self,
        watch_key: &str,
    ) -> bool {
        self.watchers.contains_key(watch_key)
    }

    /// Adds or replaces (by url) an instance and notifies the watcher.
    pub fn register_instance(
        &self,
        watch_key: &str,
        instance: DiscoveredInstance,
    ) -> Result<()> {
        let kind = {
            let mut entry = self.instances.entry(watch_key.to_string()).or_default();
            match entry.iter_mut().find(|i| i.url() == instance.url()) {
                Some(existing) => {
                    *existing = instance.clone();
                    RegistryEventKind::Updated
                }
                None => {
                    entry.push(instance.clone());
                    RegistryEventKind::Added
                }
            }
        };
        debug!(watch_key, url = %instance.url(), ?kind, "local instance registered");
        self.notify(watch_key, kind, &instance)
    }

    /// Returns false when no such instance was registered.
    pub fn deregister_instance(
        &self,
        watch_key: &str,
        host: &str,
        port: u16,
    ) -> Result<bool> {
        let removed = match self.instances.get_mut(watch_key) {
            Some(mut entry) => entry
                .iter()
                .position(|i| i.host == host && i.port == port)
                .map(|idx| entry.remove(idx)),
            None => None,
        };

        match removed {
            Some(instance) => {
                debug!(watch_key, url = %instance.url(), "local instance deregistered");
                self.notify(watch_key, RegistryEventKind::Deleted, &instance)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn notify(
        &self,
        watch_key: &str,
        kind: RegistryEventKind,
        instance: &DiscoveredInstance,
    ) -> Result<()> {
        // clone out so the shard lock is released before the callback runs
        let listener = self.watchers.get(watch_key).map(|l| l.value().clone());
        let Some(listener) = listener else {
            return Ok(());
        };

        let value = json!({
            "url": instance.url(),
            "weight": instance.weight,
            "status": instance.status,
        });
        listener.on_change(RegistryChangeEvent::new(watch_key, value.to_string(), kind))
    }

    fn ensure_initialized(&self) -> Result<()> {
        if self.is_initialized() {
            Ok(())
        } else {
            Err(ConnectorError::NotInitialized(LOCAL_REGISTRY_TYPE.to_string()).into())
        }
    }
}

impl RegistryConnector for LocalConnector {
    fn init(
        &self,
        config: &RegisterConfig,
    ) -> Result<()> {
        info!(
            servers = ?config.server_lists,
            props = config.props.len(),
            "local registry connector initialized"
        );
        self.initialized.store(true, Ordering::Release);
        Ok(())
    }

    fn select_instances(
        &self,
        watch_key: &str,
    ) -> Result<Vec<DiscoveredInstance>> {
        self.ensure_initialized()?;
        Ok(self
            .instances
            .get(watch_key)
            .map(|entry| entry.value().clone())
            .unwrap_or_default())
    }

    fn watch_instances(
        &self,
        watch_key: &str,
        listener: Arc<dyn DataChangedEventListener>,
    ) -> Result<()> {
        self.ensure_initialized()?;
        self.watchers.insert(watch_key.to_string(), listener);
        Ok(())
    }

    fn unwatch_instances(
        &self,
        watch_key: &str,
    ) -> Result<()> {
        self.watchers.remove(watch_key);
        Ok(())
    }

    fn close(&self) -> Result<()> {
        self.initialized.store(false, Ordering::Release);
        self.watchers.clear();
        info!("local registry connector closed");
        Ok(())
    }
}
