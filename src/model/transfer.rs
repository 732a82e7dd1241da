use super::DiscoveredInstance;
use super::DiscoveryHandler;
use super::PersistedUpstream;
use super::ProxySelector;
use super::SyncRecord;
use super::UpstreamData;

impl SyncRecord {
    /// Selector translated without handler binding or upstreams
    pub fn from_selector(selector: &ProxySelector) -> Self {
        Self {
            plugin_name: selector.plugin_name.clone(),
            selector_id: selector.id.clone(),
            selector_name: selector.name.clone(),
            namespace_id: selector.namespace_id.clone(),
            discovery_handler_id: None,
            upstream_list: None,
        }
    }

    pub fn for_handler(
        selector: &ProxySelector,
        handler: &DiscoveryHandler,
    ) -> Self {
        Self {
            discovery_handler_id: Some(handler.id.clone()),
            ..Self::from_selector(selector)
        }
    }

    pub fn with_upstreams(
        self,
        upstreams: Vec<UpstreamData>,
    ) -> Self {
        Self {
            upstream_list: Some(upstreams),
            ..self
        }
    }
}

impl UpstreamData {
    /// Live candidate for `selector`, owned by the selector id.
    pub fn from_instance(
        instance: &DiscoveredInstance,
        selector: &ProxySelector,
        protocol: &str,
    ) -> Self {
        Self {
            discovery_handler_id: Some(selector.id.clone()),
            namespace_id: Some(selector.namespace_id.clone()),
            url: instance.url(),
            weight: instance.weight,
            status: instance.status,
            protocol: protocol.to_string(),
            ..Default::default()
        }
    }
}

impl From<&PersistedUpstream> for UpstreamData {
    fn from(record: &PersistedUpstream) -> Self {
        Self {
            id: Some(record.id.clone()),
            discovery_handler_id: Some(record.discovery_handler_id.clone()),
            namespace_id: Some(record.namespace_id.clone()),
            url: record.url.clone(),
            weight: record.weight,
            status: record.status,
            protocol: record.protocol.clone(),
            props: (!record.props.is_empty()).then(|| record.props.clone()),
            date_created: Some(record.date_created),
            date_updated: Some(record.date_updated),
        }
    }
}

impl PersistedUpstream {
    /// Fresh record for `data` owned by `handler_id`, stamped with `now`.
    pub fn from_upstream_data(
        data: &UpstreamData,
        handler_id: &str,
        now: u64,
    ) -> Self {
        Self {
            id: nanoid::nanoid!(),
            discovery_handler_id: handler_id.to_string(),
            namespace_id: data.namespace_id.clone().unwrap_or_default(),
            protocol: data.protocol.clone(),
            url: data.url.clone(),
            status: data.status,
            weight: data.weight,
            props: data.props.clone().unwrap_or_default(),
            date_created: now,
            date_updated: now,
        }
    }
}
