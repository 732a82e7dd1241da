use std::collections::HashSet;
use std::sync::Arc;

use tracing::debug;
use tracing::info;
use tracing::warn;

use super::candidates;
use super::plan;
use super::DiscoveryProcessor;
use super::IdLocks;
use super::RegistrationManager;
use crate::metrics::RECONCILE_FAILURES;
use crate::metrics::RECONCILE_PASSES;
use crate::metrics::UPSTREAMS_DELETED;
use crate::metrics::UPSTREAMS_INSERTED;
use crate::utils::time::timestamp_millis;
use crate::ChangeEvent;
use crate::ConfigGroup;
use crate::CustomUpstreamParser;
use crate::DataChangedEventListener;
use crate::DiscoveryConfig;
use crate::DiscoveryDataChangedEventSyncListener;
use crate::DiscoveryHandler;
use crate::DiscoveryRegistration;
use crate::EventPublisher;
use crate::EventType;
use crate::ListenerRegistry;
use crate::PersistedUpstream;
use crate::ProxySelector;
use crate::RegistryConnector;
use crate::Result;
use crate::SyncRecord;
use crate::UpstreamData;
use crate::UpstreamStore;

/// Default [`DiscoveryProcessor`].
///
/// All caches are owned by the processor. Every operation touching a
/// discovery id runs under that id's lock stripe, which the sync listeners
/// it builds share.
pub struct DefaultDiscoveryProcessor {
    registrations: RegistrationManager,
    listeners: ListenerRegistry,
    store: Arc<dyn UpstreamStore>,
    publisher: Arc<dyn EventPublisher>,
    locks: Arc<IdLocks>,
    config: DiscoveryConfig,
}

impl std::fmt::Debug for DefaultDiscoveryProcessor {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("DefaultDiscoveryProcessor")
            .field("registrations", &self.registrations)
            .field("listeners", &self.listeners.len())
            .field("locks", &self.locks)
            .finish()
    }
}

impl DefaultDiscoveryProcessor {
    pub fn new(
        registrations: RegistrationManager,
        listeners: ListenerRegistry,
        store: Arc<dyn UpstreamStore>,
        publisher: Arc<dyn EventPublisher>,
        config: DiscoveryConfig,
    ) -> Self {
        Self {
            registrations,
            listeners,
            store,
            publisher,
            locks: Arc::new(IdLocks::new(config.lock_stripes)),
            config,
        }
    }

    /// Binds another route context to the listener registered for the
    /// handler's discovery id, if any.
    pub fn add_discovery_sync_data_listener(
        &self,
        handler: &DiscoveryHandler,
        selector: &ProxySelector,
    ) {
        match self.listeners.get(&handler.discovery_id) {
            Some(listener) => listener.add_listener(SyncRecord::for_handler(selector, handler)),
            None => debug!(
                discovery_id = %handler.discovery_id,
                "no data changed listener registered"
            ),
        }
    }

    /// Last write wins.
    pub fn add_changed_event_listener(
        &self,
        discovery_id: &str,
        listener: Arc<dyn DataChangedEventListener>,
    ) {
        self.listeners.add(discovery_id, listener);
    }

    pub fn get_changed_event_listener(
        &self,
        discovery_id: &str,
    ) -> Option<Arc<dyn DataChangedEventListener>> {
        self.listeners.get(discovery_id)
    }

    /// Builds, without registering, the sync listener for `handler`'s route.
    pub fn discovery_data_changed_event_listener(
        &self,
        handler: &DiscoveryHandler,
        selector: &ProxySelector,
    ) -> Result<Arc<DiscoveryDataChangedEventSyncListener>> {
        let parser = CustomUpstreamParser::from_handler(&handler.handler)?;
        Ok(Arc::new(DiscoveryDataChangedEventSyncListener::new(
            self.publisher.clone(),
            self.store.clone(),
            parser,
            SyncRecord::for_handler(selector, handler),
            handler.discovery_id.clone(),
            self.config.default_protocol.clone(),
            self.locks.clone(),
        )))
    }

    pub fn connector(
        &self,
        discovery_id: &str,
    ) -> Option<Arc<dyn RegistryConnector>> {
        self.registrations.connector(discovery_id)
    }

    pub fn watch_keys(
        &self,
        discovery_id: &str,
    ) -> Option<HashSet<String>> {
        self.registrations.watch_keys(discovery_id)
    }

    pub fn publish_event(
        &self,
        event: ChangeEvent,
    ) {
        self.publisher.publish(event);
    }

    fn reconcile(
        &self,
        connector: &dyn RegistryConnector,
        handler: &DiscoveryHandler,
        selector: &ProxySelector,
    ) -> Result<Vec<UpstreamData>> {
        let watch_key = handler.watch_key(&self.config.default_listener_node);
        let instances = connector.select_instances(&watch_key)?;
        let candidates = candidates(&instances, selector, &self.config.default_protocol);

        let persisted = self.store.select_by_handler_id(&handler.id)?;
        let plan = plan(&persisted, &candidates);
        if plan.is_empty() {
            debug!(handler_id = %handler.id, "persisted upstreams already converged");
            return Ok(candidates);
        }

        // deletions stay applied if a later insert fails
        if !plan.stale_ids.is_empty() {
            let deleted = self.store.delete_by_ids(&plan.stale_ids)?;
            UPSTREAMS_DELETED
                .with_label_values(&[&handler.discovery_id])
                .inc_by(deleted as u64);
        }

        let now = timestamp_millis();
        for insert in &plan.inserts {
            self.store
                .insert(PersistedUpstream::from_upstream_data(insert, &handler.id, now))?;
            UPSTREAMS_INSERTED.with_label_values(&[&handler.discovery_id]).inc();
        }

        info!(
            handler_id = %handler.id,
            deleted = plan.stale_ids.len(),
            inserted = plan.inserts.len(),
            "upstreams reconciled"
        );
        Ok(candidates)
    }
}

impl DiscoveryProcessor for DefaultDiscoveryProcessor {
    fn create_discovery(
        &self,
        registration: &DiscoveryRegistration,
    ) -> Result<()> {
        let _guard = self.locks.lock(&registration.id);
        self.registrations.register(registration)?;
        Ok(())
    }

    fn remove_discovery(
        &self,
        registration: &DiscoveryRegistration,
    ) -> Result<()> {
        let _guard = self.locks.lock(&registration.id);
        match self.registrations.deregister(registration) {
            Ok(false) => {
                debug!(discovery_id = %registration.id, "discovery not registered");
                Ok(())
            }
            // the connector is uncached even when close fails
            removed => {
                self.listeners.remove(&registration.id);
                removed.map(|_| ())
            }
        }
    }

    fn create_proxy_selector(
        &self,
        handler: &DiscoveryHandler,
        selector: &ProxySelector,
    ) -> Result<()> {
        let _guard = self.locks.lock(&handler.discovery_id);
        let Some(connector) = self.registrations.connector(&handler.discovery_id) else {
            warn!(discovery_id = %handler.discovery_id, "discovery not registered");
            return Ok(());
        };

        let watch_key = handler.watch_key(&self.config.default_listener_node);
        if self.registrations.is_tracked(&handler.discovery_id, &watch_key) {
            debug!(%watch_key, "watch key already subscribed");
            return Ok(());
        }

        let listener: Arc<dyn DataChangedEventListener> =
            self.discovery_data_changed_event_listener(handler, selector)?;
        // tracked before watching so a concurrent removal of a sharing id
        // never unwatches a key this id is subscribing
        self.registrations.track_key(&handler.discovery_id, &watch_key);
        if let Err(e) = connector.watch_instances(&watch_key, listener.clone()) {
            self.registrations.untrack_key(&handler.discovery_id, &watch_key);
            return Err(e);
        }
        self.listeners.add(&handler.discovery_id, listener);

        info!(
            discovery_id = %handler.discovery_id,
            %watch_key,
            selector_id = %selector.id,
            "proxy selector subscribed"
        );
        self.publisher.publish(ChangeEvent::single(
            ConfigGroup::RouteSelector,
            EventType::Update,
            SyncRecord::from_selector(selector),
        ));
        Ok(())
    }

    fn remove_proxy_selector(
        &self,
        handler: &DiscoveryHandler,
        selector: &ProxySelector,
    ) -> Result<()> {
        let _guard = self.locks.lock(&handler.discovery_id);
        let watch_key = handler.watch_key(&self.config.default_listener_node);
        if !self.registrations.untrack_key(&handler.discovery_id, &watch_key) {
            debug!(
                discovery_id = %handler.discovery_id,
                %watch_key,
                "watch key not subscribed"
            );
            return Ok(());
        }

        if let Some(connector) = self.registrations.connector(&handler.discovery_id) {
            connector.unwatch_instances(&watch_key)?;
        }

        info!(
            discovery_id = %handler.discovery_id,
            %watch_key,
            selector_id = %selector.id,
            "proxy selector unsubscribed"
        );
        self.publisher.publish(ChangeEvent::single(
            ConfigGroup::RouteSelector,
            EventType::Delete,
            SyncRecord::from_selector(selector),
        ));
        Ok(())
    }

    fn fetch_all(
        &self,
        handler: &DiscoveryHandler,
        selector: &ProxySelector,
    ) -> Result<()> {
        let _guard = self.locks.lock(&handler.discovery_id);
        let Some(connector) = self.registrations.connector(&handler.discovery_id) else {
            warn!(discovery_id = %handler.discovery_id, "discovery not registered");
            return Ok(());
        };

        let upstreams = self
            .reconcile(connector.as_ref(), handler, selector)
            .map_err(|e| {
                RECONCILE_FAILURES
                    .with_label_values(&[&handler.discovery_id])
                    .inc();
                e
            })?;
        RECONCILE_PASSES.with_label_values(&[&handler.discovery_id]).inc();

        self.publisher.publish(ChangeEvent::single(
            ConfigGroup::DiscoveredUpstream,
            EventType::Update,
            SyncRecord::from_selector(selector).with_upstreams(upstreams),
        ));
        Ok(())
    }

    fn remove_selector_upstream(
        &self,
        selector: &ProxySelector,
    ) {
        self.publisher.publish(ChangeEvent::single(
            ConfigGroup::DiscoveredUpstream,
            EventType::Delete,
            SyncRecord::from_selector(selector),
        ));
    }

    fn change_upstream(
        &self,
        selector: &ProxySelector,
        upstreams: Vec<UpstreamData>,
    ) {
        self.publisher.publish(ChangeEvent::single(
            ConfigGroup::DiscoveredUpstream,
            EventType::Update,
            SyncRecord::from_selector(selector).with_upstreams(upstreams),
        ));
    }
}
