use std::collections::HashSet;
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::metrics::ACTIVE_DISCOVERIES;
use crate::metrics::CONNECTOR_LIFECYCLE;
use crate::ConnectorFactory;
use crate::DiscoveryRegistration;
use crate::RegisterConfig;
use crate::RegistryConnector;
use crate::Result;

/// Owns connector lifetime per discovery id and the watch keys subscribed
/// through each connector.
///
/// Sequences spanning several steps on one id (e.g. check, subscribe, track)
/// are serialized by callers with the id's stripe in `IdLocks`. Changes to
/// which ids reference a connector, and to the keys they track, go through
/// `membership` because distinct ids may share one connector.
pub struct RegistrationManager {
    factory: Arc<ConnectorFactory>,
    connectors: DashMap<String, Arc<dyn RegistryConnector>>,
    watch_keys: DashMap<String, HashSet<String>>,
    membership: Mutex<()>,
}

impl std::fmt::Debug for RegistrationManager {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("RegistrationManager")
            .field("factory", &self.factory)
            .field("connectors", &self.connectors.len())
            .finish()
    }
}

impl RegistrationManager {
    pub fn new(factory: Arc<ConnectorFactory>) -> Self {
        Self {
            factory,
            connectors: DashMap::new(),
            watch_keys: DashMap::new(),
            membership: Mutex::new(()),
        }
    }

    /// Initializes and caches a connector for `registration`.
    ///
    /// Returns false without touching the registry when the id is already
    /// cached. Nothing is cached when property parsing, connector lookup or
    /// `init` fails.
    pub fn register(
        &self,
        registration: &DiscoveryRegistration,
    ) -> Result<bool> {
        let _membership = self.membership.lock();
        if self.connectors.contains_key(&registration.id) {
            info!(discovery_id = %registration.id, "discovery has been initialized");
            return Ok(false);
        }

        let config = RegisterConfig {
            register_type: registration.register_type.clone(),
            server_lists: registration.server_list.clone(),
            props: registration.parse_props()?,
        };
        let connector = self.factory.create(&registration.register_type)?;
        connector.init(&config)?;
        CONNECTOR_LIFECYCLE
            .with_label_values(&[&registration.register_type, "init"])
            .inc();

        self.connectors.insert(registration.id.clone(), connector);
        self.watch_keys.insert(registration.id.clone(), HashSet::new());
        ACTIVE_DISCOVERIES.inc();
        info!(
            discovery_id = %registration.id,
            register_type = %registration.register_type,
            "discovery initialized"
        );
        Ok(true)
    }

    /// Drops the cached connector and watch keys of `registration`.
    ///
    /// The connector is closed only when no other id still references the
    /// same instance. Otherwise the keys only this id tracked are unwatched so
    /// its listener stops receiving notifications. Returns false for an
    /// unknown id.
    pub fn deregister(
        &self,
        registration: &DiscoveryRegistration,
    ) -> Result<bool> {
        let _membership = self.membership.lock();
        let Some((_, removed)) = self.connectors.remove(&registration.id) else {
            return Ok(false);
        };
        let released = self
            .watch_keys
            .remove(&registration.id)
            .map(|(_, keys)| keys)
            .unwrap_or_default();
        ACTIVE_DISCOVERIES.dec();

        let sharers: Vec<String> = self
            .connectors
            .iter()
            .filter(|entry| same_connector(entry.value(), &removed))
            .map(|entry| entry.key().clone())
            .collect();
        if sharers.is_empty() {
            removed.close()?;
            CONNECTOR_LIFECYCLE
                .with_label_values(&[&registration.register_type, "close"])
                .inc();
            info!(
                discovery_id = %registration.id,
                name = %registration.name,
                "discovery shutdown"
            );
            return Ok(true);
        }

        let still_watched: HashSet<String> = sharers
            .iter()
            .filter_map(|id| self.watch_keys.get(id).map(|keys| keys.value().clone()))
            .flatten()
            .collect();
        let mut first_err = None;
        for watch_key in released.difference(&still_watched) {
            if let Err(e) = removed.unwatch_instances(watch_key) {
                warn!(discovery_id = %registration.id, %watch_key, "unwatch failed: {:?}", e);
                first_err.get_or_insert(e);
            }
        }
        debug!(
            discovery_id = %registration.id,
            sharers = sharers.len(),
            "connector still shared by another discovery, keeping it open"
        );
        first_err.map_or(Ok(true), Err)
    }

    pub fn connector(
        &self,
        discovery_id: &str,
    ) -> Option<Arc<dyn RegistryConnector>> {
        self.connectors.get(discovery_id).map(|c| c.value().clone())
    }

    pub fn contains(
        &self,
        discovery_id: &str,
    ) -> bool {
        self.connectors.contains_key(discovery_id)
    }

    /// Tracked watch keys; `None` for an unknown id.
    pub fn watch_keys(
        &self,
        discovery_id: &str,
    ) -> Option<HashSet<String>> {
        self.watch_keys.get(discovery_id).map(|keys| keys.value().clone())
    }

    pub fn is_tracked(
        &self,
        discovery_id: &str,
        watch_key: &str,
    ) -> bool {
        self.watch_keys
            .get(discovery_id)
            .map_or(false, |keys| keys.contains(watch_key))
    }

    /// Returns true when the key was newly added.
    pub fn track_key(
        &self,
        discovery_id: &str,
        watch_key: &str,
    ) -> bool {
        let _membership = self.membership.lock();
        self.watch_keys
            .get_mut(discovery_id)
            .map_or(false, |mut keys| keys.insert(watch_key.to_string()))
    }

    /// Returns true when the key was tracked.
    pub fn untrack_key(
        &self,
        discovery_id: &str,
        watch_key: &str,
    ) -> bool {
        let _membership = self.membership.lock();
        self.watch_keys
            .get_mut(discovery_id)
            .map_or(false, |mut keys| keys.remove(watch_key))
    }

    pub fn len(&self) -> usize {
        self.connectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connectors.is_empty()
    }
}

// address identity only; vtable pointers of the same object may differ
fn same_connector(
    a: &Arc<dyn RegistryConnector>,
    b: &Arc<dyn RegistryConnector>,
) -> bool {
    std::ptr::eq(
        Arc::as_ptr(a) as *const (),
        Arc::as_ptr(b) as *const (),
    )
}
