use parking_lot::Mutex;

use crate::ChangeEvent;
use crate::ConfigGroup;
use crate::DiscoveredInstance;
use crate::DiscoveryHandler;
use crate::DiscoveryRegistration;
use crate::EventPublisher;
use crate::EventType;
use crate::PersistedUpstream;
use crate::ProxySelector;

/// Publisher keeping every event in publication order.
#[derive(Debug, Default)]
pub struct RecordingPublisher {
    events: Mutex<Vec<ChangeEvent>>,
}

impl RecordingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ChangeEvent> {
        self.events.lock().clone()
    }

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

    pub fn clear(&self) {
        self.events.lock().clear();
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

pub fn registration(
    id: &str,
    register_type: &str,
) -> DiscoveryRegistration {
    DiscoveryRegistration::new(id, register_type, vec!["127.0.0.1:2181".to_string()])
}

pub fn selector(id: &str) -> ProxySelector {
    ProxySelector::new(id, format!("{}-name", id), "divide", "default-ns")
}

pub fn handler(
    id: &str,
    discovery_id: &str,
    listener_node: &str,
) -> DiscoveryHandler {
    DiscoveryHandler::new(id, discovery_id, listener_node)
}

pub fn instance(
    host: &str,
    port: u16,
) -> DiscoveredInstance {
    DiscoveredInstance::new(host, port, 50, 0)
}

pub fn persisted(
    id: &str,
    handler_id: &str,
    url: &str,
    date_created: u64,
) -> PersistedUpstream {
    PersistedUpstream {
        id: id.to_string(),
        discovery_handler_id: handler_id.to_string(),
        namespace_id: "default-ns".to_string(),
        protocol: "http://".to_string(),
        url: url.to_string(),
        status: 0,
        weight: 50,
        props: String::new(),
        date_created,
        date_updated: date_created,
    }
}

/// Sorted urls carried by the first record of `event`.
pub fn event_urls(event: &ChangeEvent) -> Vec<String> {
    let mut urls: Vec<String> = event
        .payload
        .first()
        .and_then(|r| r.upstream_list.as_ref())
        .map(|list| list.iter().map(|u| u.url.clone()).collect())
        .unwrap_or_default();
    urls.sort();
    urls
}
