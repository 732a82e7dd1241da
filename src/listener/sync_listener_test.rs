use std::sync::Arc;

use super::*;
use crate::test_utils::event_urls;
use crate::test_utils::persisted;
use crate::test_utils::selector;
use crate::test_utils::RecordingPublisher;
use crate::ConfigGroup;
use crate::Error;
use crate::EventType;
use crate::IdLocks;
use crate::MemoryUpstreamStore;
use crate::MockUpstreamStore;
use crate::RegistryChangeEvent;
use crate::RegistryEventKind;
use crate::StorageError;
use crate::SyncRecord;
use crate::UpstreamStore;

struct Fixture {
    publisher: Arc<RecordingPublisher>,
    store: Arc<MemoryUpstreamStore>,
    listener: DiscoveryDataChangedEventSyncListener,
}

fn template(
    selector_id: &str,
    handler_id: &str,
) -> SyncRecord {
    SyncRecord {
        discovery_handler_id: Some(handler_id.to_string()),
        ..SyncRecord::from_selector(&selector(selector_id))
    }
}

fn setup(parser: CustomUpstreamParser) -> Fixture {
    let publisher = Arc::new(RecordingPublisher::new());
    let store = Arc::new(MemoryUpstreamStore::new());
    let listener = DiscoveryDataChangedEventSyncListener::new(
        publisher.clone(),
        store.clone(),
        parser,
        template("s1", "h1"),
        "d1",
        "http://",
        Arc::new(IdLocks::new(4)),
    );
    Fixture {
        publisher,
        store,
        listener,
    }
}

#[test]
fn test_added_event_inserts_and_publishes_full_set() {
    let f = setup(CustomUpstreamParser::default());
    f.store.insert(persisted("p1", "h1", "a:1", 1)).unwrap();

    f.listener
        .on_change(RegistryChangeEvent::new(
            "/k",
            r#"{"url":"b:2","weight":10}"#,
            RegistryEventKind::Added,
        ))
        .unwrap();

    let stored = f.store.select_by_handler_id("h1").unwrap();
    assert_eq!(stored.len(), 2);
    let inserted = stored.iter().find(|r| r.url == "b:2").unwrap();
    assert_eq!(inserted.protocol, "http://");
    assert_eq!(inserted.namespace_id, "default-ns");
    assert_eq!(inserted.weight, 10);

    let events = f.publisher.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].group, ConfigGroup::DiscoveredUpstream);
    assert_eq!(events[0].event_type, EventType::Update);
    assert_eq!(events[0].payload[0].selector_id, "s1");
    assert_eq!(events[0].payload[0].discovery_handler_id.as_deref(), Some("h1"));
    assert_eq!(event_urls(&events[0]), vec!["a:1", "b:2"]);
}

#[test]
fn test_updated_event_overwrites_existing_record() {
    let f = setup(CustomUpstreamParser::default());
    f.store.insert(persisted("p1", "h1", "a:1", 1)).unwrap();

    f.listener
        .on_change(RegistryChangeEvent::new(
            "/k",
            r#"{"url":"a:1","weight":99,"status":1}"#,
            RegistryEventKind::Updated,
        ))
        .unwrap();

    let stored = f.store.select_by_handler_id("h1").unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].id, "p1");
    assert_eq!(stored[0].weight, 99);
    assert_eq!(stored[0].status, 1);
    assert_eq!(stored[0].date_created, 1);
}

#[test]
fn test_deleted_event_removes_by_url() {
    let f = setup(CustomUpstreamParser::default());
    f.store.insert(persisted("p1", "h1", "a:1", 1)).unwrap();
    f.store.insert(persisted("p2", "h1", "b:2", 2)).unwrap();

    f.listener
        .on_change(RegistryChangeEvent::new(
            "/k",
            r#"{"url":"a:1"}"#,
            RegistryEventKind::Deleted,
        ))
        .unwrap();

    let events = f.publisher.events();
    assert_eq!(events.len(), 1);
    assert_eq!(event_urls(&events[0]), vec!["b:2"]);
    assert_eq!(f.store.len(), 1);
}

#[test]
fn test_ignored_and_empty_events_do_nothing() {
    let f = setup(CustomUpstreamParser::default());

    f.listener
        .on_change(RegistryChangeEvent::new("/k", "{not json", RegistryEventKind::Ignored))
        .unwrap();
    f.listener
        .on_change(RegistryChangeEvent::new("/k", "[]", RegistryEventKind::Added))
        .unwrap();

    assert!(f.publisher.events().is_empty());
    assert!(f.store.is_empty());
}

#[test]
fn test_malformed_payload_propagates() {
    let f = setup(CustomUpstreamParser::default());

    let result = f
        .listener
        .on_change(RegistryChangeEvent::new("/k", "{oops", RegistryEventKind::Added));

    assert!(matches!(result, Err(Error::InvalidConfig(_))));
    assert!(f.publisher.events().is_empty());
}

#[test]
fn test_add_listener_deduplicates_contexts() {
    let f = setup(CustomUpstreamParser::default());

    f.listener.add_listener(template("s1", "h1"));
    f.listener.add_listener(template("s2", "h2"));
    f.listener.add_listener(template("s2", "h2"));

    let contexts = f.listener.contexts();
    assert_eq!(contexts.len(), 2);
    assert_eq!(contexts[1].selector_id, "s2");
}

#[test]
fn test_each_bound_context_gets_its_own_event() {
    let f = setup(CustomUpstreamParser::default());
    f.listener.add_listener(template("s2", "h2"));

    f.listener
        .on_change(RegistryChangeEvent::new(
            "/k",
            r#"[{"url":"a:1"},{"url":"b:2"}]"#,
            RegistryEventKind::Added,
        ))
        .unwrap();

    assert_eq!(f.store.select_by_handler_id("h1").unwrap().len(), 2);
    assert_eq!(f.store.select_by_handler_id("h2").unwrap().len(), 2);

    let selectors: Vec<String> = f
        .publisher
        .events()
        .iter()
        .map(|e| e.payload[0].selector_id.clone())
        .collect();
    assert_eq!(selectors, vec!["s1", "s2"]);
}

#[test]
fn test_context_without_handler_is_skipped() {
    let f = setup(CustomUpstreamParser::default());
    f.listener.add_listener(SyncRecord::from_selector(&selector("s9")));

    f.listener
        .on_change(RegistryChangeEvent::new("/k", r#"{"url":"a:1"}"#, RegistryEventKind::Added))
        .unwrap();

    assert_eq!(f.publisher.events().len(), 1);
}

#[test]
fn test_store_error_propagates_without_event() {
    let publisher = Arc::new(RecordingPublisher::new());
    let mut store = MockUpstreamStore::new();
    store.expect_update_by_handler_and_url().returning(|_| Ok(false));
    store.expect_insert().returning(|r| {
        Err(StorageError::DuplicateUpstream {
            handler_id: r.discovery_handler_id,
            url: r.url,
        }
        .into())
    });
    store.expect_select_by_handler_id().never();

    let listener = DiscoveryDataChangedEventSyncListener::new(
        publisher.clone(),
        Arc::new(store),
        CustomUpstreamParser::default(),
        template("s1", "h1"),
        "d1",
        "http://",
        Arc::new(IdLocks::new(1)),
    );

    let result = listener.on_change(RegistryChangeEvent::new(
        "/k",
        r#"{"url":"a:1"}"#,
        RegistryEventKind::Added,
    ));

    assert!(matches!(
        result,
        Err(Error::Storage(StorageError::DuplicateUpstream { .. }))
    ));
    assert!(publisher.events().is_empty());
}
