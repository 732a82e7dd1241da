use std::sync::Arc;

use discovery_sync::ChangeEvent;
use discovery_sync::ConfigGroup;
use discovery_sync::ConnectorFactory;
use discovery_sync::DefaultDiscoveryProcessor;
use discovery_sync::DiscoveryConfig;
use discovery_sync::EventPublisher;
use discovery_sync::EventType;
use discovery_sync::ListenerRegistry;
use discovery_sync::LocalConnector;
use discovery_sync::ProxySelector;
use discovery_sync::RegistrationManager;
use discovery_sync::UpstreamStore;
use parking_lot::Mutex;

pub const LOCAL: &str = "local";

#[derive(Default)]
pub struct RecordingPublisher {
    events: Mutex<Vec<ChangeEvent>>,
}

impl RecordingPublisher {
    pub fn events_of(
        &self,
        group: ConfigGroup,
        event_type: EventType,
    ) -> Vec<ChangeEvent> {
        self.events
            .lock()
            .iter()
            .filter(|e| e.group == group && e.event_type == event_type)
            .cloned()
            .collect()
    }

    pub fn last_upstream_urls(&self) -> Vec<String> {
        let events = self.events_of(ConfigGroup::DiscoveredUpstream, EventType::Update);
        let mut urls: Vec<String> = events
            .last()
            .and_then(|e| e.payload.first())
            .and_then(|r| r.upstream_list.as_ref())
            .map(|list| list.iter().map(|u| u.url.clone()).collect())
            .unwrap_or_default();
        urls.sort();
        urls
    }
}

impl EventPublisher for RecordingPublisher {
    fn publish(
        &self,
        event: ChangeEvent,
    ) {
        self.events.lock().push(event);
    }
}

/// Processor wired to a shared in-process registry.
pub fn local_processor(
    store: Arc<dyn UpstreamStore>,
    publisher: Arc<dyn EventPublisher>,
) -> (DefaultDiscoveryProcessor, Arc<LocalConnector>) {
    let local = Arc::new(LocalConnector::new());
    let factory = ConnectorFactory::new();
    factory.register_shared(LOCAL, local.clone());

    let processor = DefaultDiscoveryProcessor::new(
        RegistrationManager::new(Arc::new(factory)),
        ListenerRegistry::new(),
        store,
        publisher,
        DiscoveryConfig::default(),
    );
    (processor, local)
}

pub fn orders_selector() -> ProxySelector {
    ProxySelector::new("selector-orders", "orders", "divide", "default-ns")
}

pub fn sorted_urls(records: &[discovery_sync::PersistedUpstream]) -> Vec<String> {
    let mut urls: Vec<String> = records.iter().map(|r| r.url.clone()).collect();
    urls.sort();
    urls
}
