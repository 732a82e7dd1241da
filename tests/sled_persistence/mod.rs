use std::sync::Arc;

use discovery_sync::init_sled_upstream_db;
use discovery_sync::DiscoveredInstance;
use discovery_sync::DiscoveryHandler;
use discovery_sync::DiscoveryProcessor;
use discovery_sync::DiscoveryRegistration;
use discovery_sync::SledUpstreamStore;
use discovery_sync::UpstreamStore;

use crate::commons::local_processor;
use crate::commons::orders_selector;
use crate::commons::sorted_urls;
use crate::commons::RecordingPublisher;
use crate::commons::LOCAL;

#[test]
fn test_reconciled_upstreams_survive_restart() {
    let temp_dir = tempfile::tempdir().unwrap();
    let handler = DiscoveryHandler::new("handler-orders", "discovery-local", "/gateway/orders");

    {
        let db = init_sled_upstream_db(temp_dir.path()).unwrap();
        let store = Arc::new(SledUpstreamStore::new(&db).unwrap());
        let publisher = Arc::new(RecordingPublisher::default());
        let (processor, local) = local_processor(store.clone(), publisher);
        processor
            .create_discovery(&DiscoveryRegistration::new("discovery-local", LOCAL, vec![]))
            .unwrap();
        local
            .register_instance("/gateway/orders", DiscoveredInstance::new("10.0.0.1", 80, 50, 1))
            .unwrap();
        local
            .register_instance("/gateway/orders", DiscoveredInstance::new("10.0.0.2", 80, 50, 1))
            .unwrap();

        processor.fetch_all(&handler, &orders_selector()).unwrap();
        store.flush().unwrap();
    }

    let db = init_sled_upstream_db(temp_dir.path()).unwrap();
    let store = SledUpstreamStore::new(&db).unwrap();
    assert_eq!(
        sorted_urls(&store.select_by_handler_id("handler-orders").unwrap()),
        vec!["10.0.0.1:80", "10.0.0.2:80"]
    );
}
