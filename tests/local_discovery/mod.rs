use std::sync::Arc;

use discovery_sync::ConfigGroup;
use discovery_sync::DiscoveredInstance;
use discovery_sync::DiscoveryHandler;
use discovery_sync::DiscoveryProcessor;
use discovery_sync::DiscoveryRegistration;
use discovery_sync::EventType;
use discovery_sync::MemoryUpstreamStore;
use discovery_sync::UpstreamStore;

use crate::commons::local_processor;
use crate::commons::orders_selector;
use crate::commons::sorted_urls;
use crate::commons::RecordingPublisher;
use crate::commons::LOCAL;
use crate::enable_logger;

const WATCH_KEY: &str = "/gateway/orders";

#[test]
fn test_local_registry_full_lifecycle() {
    enable_logger();
    let store = Arc::new(MemoryUpstreamStore::new());
    let publisher = Arc::new(RecordingPublisher::default());
    let (processor, local) = local_processor(store.clone(), publisher.clone());

    let registration = DiscoveryRegistration::new("discovery-local", LOCAL, vec![]);
    let handler = DiscoveryHandler::new("handler-orders", "discovery-local", WATCH_KEY);
    let selector = orders_selector();

    processor.create_discovery(&registration).unwrap();
    assert!(local.is_initialized());

    local
        .register_instance(WATCH_KEY, DiscoveredInstance::new("10.0.0.1", 8080, 50, 1))
        .unwrap();

    processor.create_proxy_selector(&handler, &selector).unwrap();
    assert!(local.is_watching(WATCH_KEY));
    assert_eq!(
        publisher
            .events_of(ConfigGroup::RouteSelector, EventType::Update)
            .len(),
        1
    );

    processor.fetch_all(&handler, &selector).unwrap();
    assert_eq!(
        sorted_urls(&store.select_by_handler_id("handler-orders").unwrap()),
        vec!["10.0.0.1:8080"]
    );
    assert_eq!(publisher.last_upstream_urls(), vec!["10.0.0.1:8080"]);

    // watch path
    local
        .register_instance(WATCH_KEY, DiscoveredInstance::new("10.0.0.2", 8080, 20, 1))
        .unwrap();
    assert_eq!(
        sorted_urls(&store.select_by_handler_id("handler-orders").unwrap()),
        vec!["10.0.0.1:8080", "10.0.0.2:8080"]
    );
    assert_eq!(
        publisher.last_upstream_urls(),
        vec!["10.0.0.1:8080", "10.0.0.2:8080"]
    );

    assert!(local.deregister_instance(WATCH_KEY, "10.0.0.1", 8080).unwrap());
    assert_eq!(
        sorted_urls(&store.select_by_handler_id("handler-orders").unwrap()),
        vec!["10.0.0.2:8080"]
    );

    processor.remove_proxy_selector(&handler, &selector).unwrap();
    assert!(!local.is_watching(WATCH_KEY));
    assert_eq!(
        publisher
            .events_of(ConfigGroup::RouteSelector, EventType::Delete)
            .len(),
        1
    );

    processor.remove_discovery(&registration).unwrap();
    assert!(!local.is_initialized());
    assert!(processor.connector("discovery-local").is_none());
}

#[test]
fn test_shared_local_connector_survives_partial_removal() {
    let store = Arc::new(MemoryUpstreamStore::new());
    let publisher = Arc::new(RecordingPublisher::default());
    let (processor, local) = local_processor(store, publisher);

    let first = DiscoveryRegistration::new("discovery-a", LOCAL, vec![]);
    let second = DiscoveryRegistration::new("discovery-b", LOCAL, vec![]);
    processor.create_discovery(&first).unwrap();
    processor.create_discovery(&second).unwrap();

    processor.remove_discovery(&first).unwrap();
    assert!(local.is_initialized());

    processor.remove_discovery(&second).unwrap();
    assert!(!local.is_initialized());
}

#[test]
fn test_reconcile_removes_instances_gone_from_registry() {
    let store = Arc::new(MemoryUpstreamStore::new());
    let publisher = Arc::new(RecordingPublisher::default());
    let (processor, local) = local_processor(store.clone(), publisher.clone());
    let registration = DiscoveryRegistration::new("discovery-local", LOCAL, vec![]);
    let handler = DiscoveryHandler::new("handler-orders", "discovery-local", "");
    let selector = orders_selector();
    processor.create_discovery(&registration).unwrap();

    let default_key = "/shenyu/discovery";
    local
        .register_instance(default_key, DiscoveredInstance::new("a", 1, 50, 1))
        .unwrap();
    local
        .register_instance(default_key, DiscoveredInstance::new("b", 1, 50, 1))
        .unwrap();
    processor.fetch_all(&handler, &selector).unwrap();

    local.deregister_instance(default_key, "a", 1).unwrap();
    local
        .register_instance(default_key, DiscoveredInstance::new("c", 1, 50, 1))
        .unwrap();
    processor.fetch_all(&handler, &selector).unwrap();

    assert_eq!(
        sorted_urls(&store.select_by_handler_id("handler-orders").unwrap()),
        vec!["b:1", "c:1"]
    );
    assert_eq!(publisher.last_upstream_urls(), vec!["b:1", "c:1"]);
}
