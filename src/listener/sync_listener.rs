use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;
use tracing::trace;

use super::CustomUpstreamParser;
use super::DataChangedEventListener;
use crate::utils::time::timestamp_millis;
use crate::ChangeEvent;
use crate::ConfigGroup;
use crate::EventPublisher;
use crate::EventType;
use crate::IdLocks;
use crate::PersistedUpstream;
use crate::RegistryChangeEvent;
use crate::RegistryEventKind;
use crate::Result;
use crate::SyncRecord;
use crate::UpstreamData;
use crate::UpstreamStore;

/// Applies registry watch notifications to the upstream store and publishes
/// the resulting upstream set for every bound route.
///
/// One listener serves one discovery id. Each bound [`SyncRecord`] context
/// names a selector and the handler owning its persisted upstreams.
pub struct DiscoveryDataChangedEventSyncListener {
    publisher: Arc<dyn EventPublisher>,
    store: Arc<dyn UpstreamStore>,
    parser: CustomUpstreamParser,
    contexts: RwLock<Vec<SyncRecord>>,
    discovery_id: String,
    default_protocol: String,
    locks: Arc<IdLocks>,
}

impl std::fmt::Debug for DiscoveryDataChangedEventSyncListener {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("DiscoveryDataChangedEventSyncListener")
            .field("discovery_id", &self.discovery_id)
            .field("contexts", &self.contexts.read().len())
            .finish()
    }
}

impl DiscoveryDataChangedEventSyncListener {
    pub fn new(
        publisher: Arc<dyn EventPublisher>,
        store: Arc<dyn UpstreamStore>,
        parser: CustomUpstreamParser,
        template: SyncRecord,
        discovery_id: impl Into<String>,
        default_protocol: impl Into<String>,
        locks: Arc<IdLocks>,
    ) -> Self {
        Self {
            publisher,
            store,
            parser,
            contexts: RwLock::new(vec![template]),
            discovery_id: discovery_id.into(),
            default_protocol: default_protocol.into(),
            locks,
        }
    }

    pub fn discovery_id(&self) -> &str {
        &self.discovery_id
    }

    /// Snapshot of the bound route contexts, template first.
    pub fn contexts(&self) -> Vec<SyncRecord> {
        self.contexts.read().clone()
    }

    fn apply(
        &self,
        kind: RegistryEventKind,
        handler_id: &str,
        data: &UpstreamData,
        now: u64,
    ) -> Result<()> {
        match kind {
            RegistryEventKind::Added | RegistryEventKind::Updated => {
                let record = PersistedUpstream::from_upstream_data(data, handler_id, now);
                if !self.store.update_by_handler_and_url(&record)? {
                    self.store.insert(record)?;
                }
            }
            RegistryEventKind::Deleted => {
                self.store.delete_by_url(handler_id, &data.url)?;
            }
            RegistryEventKind::Ignored => {}
        }
        Ok(())
    }

    fn stamp(
        &self,
        upstream: &UpstreamData,
        context: &SyncRecord,
        handler_id: &str,
    ) -> UpstreamData {
        let mut data = upstream.clone();
        data.discovery_handler_id = Some(handler_id.to_string());
        if data.namespace_id.as_deref().map_or(true, |ns| ns.trim().is_empty()) {
            data.namespace_id = Some(context.namespace_id.clone());
        }
        if data.protocol.trim().is_empty() {
            data.protocol = self.default_protocol.clone();
        }
        data
    }
}

impl DataChangedEventListener for DiscoveryDataChangedEventSyncListener {
    fn on_change(
        &self,
        event: RegistryChangeEvent,
    ) -> Result<()> {
        if event.kind == RegistryEventKind::Ignored {
            trace!(key = %event.key, "ignored registry event");
            return Ok(());
        }

        let upstreams = self.parser.parse_value(&event.value)?;
        if upstreams.is_empty() {
            return Ok(());
        }

        let _guard = self.locks.lock(&self.discovery_id);
        let contexts = self.contexts();
        let now = timestamp_millis();

        for context in contexts {
            let Some(handler_id) = context.discovery_handler_id.clone() else {
                continue;
            };

            for upstream in &upstreams {
                let data = self.stamp(upstream, &context, &handler_id);
                self.apply(event.kind, &handler_id, &data, now)?;
            }

            let upstream_list = self
                .store
                .select_by_handler_id(&handler_id)?
                .iter()
                .map(UpstreamData::from)
                .collect();

            debug!(
                discovery_id = %self.discovery_id,
                selector_id = %context.selector_id,
                kind = ?event.kind,
                "registry change applied"
            );
            self.publisher.publish(ChangeEvent::single(
                ConfigGroup::DiscoveredUpstream,
                EventType::Update,
                context.with_upstreams(upstream_list),
            ));
        }
        Ok(())
    }

    fn add_listener(
        &self,
        record: SyncRecord,
    ) {
        let mut contexts = self.contexts.write();
        let bound = contexts.iter().any(|c| {
            c.selector_id == record.selector_id
                && c.discovery_handler_id == record.discovery_handler_id
        });
        if bound {
            trace!(selector_id = %record.selector_id, "route context already bound");
            return;
        }
        debug!(
            discovery_id = %self.discovery_id,
            selector_id = %record.selector_id,
            "route context bound"
        );
        contexts.push(record);
    }
}
