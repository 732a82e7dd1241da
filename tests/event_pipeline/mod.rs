use std::sync::Arc;
use std::time::Duration;

use discovery_sync::event_channel;
use discovery_sync::ChangeEvent;
use discovery_sync::ChangeEventSubscriber;
use discovery_sync::DiscoveredInstance;
use discovery_sync::DiscoveryHandler;
use discovery_sync::DiscoveryProcessor;
use discovery_sync::DiscoveryRegistration;
use discovery_sync::MemoryUpstreamStore;
use parking_lot::Mutex;
use tokio::sync::watch;

use crate::commons::local_processor;
use crate::commons::orders_selector;
use crate::commons::LOCAL;

#[derive(Default)]
struct JsonCollector {
    lines: Mutex<Vec<String>>,
}

impl ChangeEventSubscriber for JsonCollector {
    fn on_event(
        &self,
        event: &ChangeEvent,
    ) {
        self.lines.lock().push(serde_json::to_string(event).unwrap());
    }
}

#[tokio::test]
async fn test_reconcile_event_reaches_subscriber_as_json() {
    let (publisher, mut dispatcher) = event_channel(8);
    let collector = Arc::new(JsonCollector::default());
    dispatcher.subscribe(collector.clone());
    let (shutdown_tx, shutdown_rx) = watch::channel(());
    let dispatcher_handle = tokio::spawn(dispatcher.run(shutdown_rx));

    let (processor, local) =
        local_processor(Arc::new(MemoryUpstreamStore::new()), Arc::new(publisher));
    processor
        .create_discovery(&DiscoveryRegistration::new("discovery-local", LOCAL, vec![]))
        .unwrap();
    local
        .register_instance("/shenyu/discovery", DiscoveredInstance::new("10.0.0.1", 8080, 50, 1))
        .unwrap();
    processor
        .fetch_all(
            &DiscoveryHandler::new("handler-orders", "discovery-local", ""),
            &orders_selector(),
        )
        .unwrap();

    shutdown_tx.send(()).unwrap();
    tokio::time::timeout(Duration::from_secs(1), dispatcher_handle)
        .await
        .unwrap()
        .unwrap();

    let lines = collector.lines.lock().clone();
    assert_eq!(lines.len(), 1);
    let value: serde_json::Value = serde_json::from_str(&lines[0]).unwrap();
    assert_eq!(value["group"], "DISCOVERED_UPSTREAM");
    assert_eq!(value["type"], "UPDATE");
    assert_eq!(value["payload"][0]["selectorId"], "selector-orders");
    assert_eq!(value["payload"][0]["pluginName"], "divide");
    assert_eq!(value["payload"][0]["upstreamList"][0]["url"], "10.0.0.1:8080");
    assert_eq!(value["payload"][0]["upstreamList"][0]["protocol"], "http://");
}
