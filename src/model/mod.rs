//! Data carried between registries, the upstream store and the change-event
//! stream.
//!
//! `DiscoveredInstance` is the ephemeral registry view, `PersistedUpstream` the
//! durable record and `UpstreamData` the shape both are translated into when
//! they travel inside a [`SyncRecord`].

mod transfer;


use std::collections::HashMap;

use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

/// A configured external service-registry connection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryRegistration {
    pub id: String,

    #[serde(default)]
    pub name: String,

    /// Backend type tag used to pick a connector (e.g. `local`, `zk`)
    #[serde(rename = "type")]
    pub register_type: String,

    /// Connection properties as a JSON object string
    #[serde(default)]
    pub props: String,

    #[serde(default)]
    pub server_list: Vec<String>,

    #[serde(default)]
    pub namespace_id: String,
}

impl DiscoveryRegistration {
    pub fn new(
        id: impl Into<String>,
        register_type: impl Into<String>,
        server_list: Vec<String>,
    ) -> Self {
        Self {
            id: id.into(),
            register_type: register_type.into(),
            server_list,
            ..Default::default()
        }
    }

    pub fn with_props(
        mut self,
        props: impl Into<String>,
    ) -> Self {
        self.props = props.into();
        self
    }

    /// Parses the connection properties into a flat key/value set.
    ///
    /// Scalars are stringified, `null` entries are skipped. Nested arrays or
    /// objects are rejected as a configuration error.
    pub fn parse_props(&self) -> Result<HashMap<String, String>> {
        parse_flat_json_object(&self.props, "discovery props")
    }
}

/// Binding between a route handler and a discovery registration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryHandler {
    /// Route-handler id owning the persisted upstreams
    pub id: String,

    pub discovery_id: String,

    /// Watch key inside the registry namespace; blank selects the default
    #[serde(default)]
    pub listener_node: String,

    /// JSON object mapping upstream fields to registry payload keys
    #[serde(default)]
    pub handler: String,

    #[serde(default)]
    pub props: String,
}

impl DiscoveryHandler {
    pub fn new(
        id: impl Into<String>,
        discovery_id: impl Into<String>,
        listener_node: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            discovery_id: discovery_id.into(),
            listener_node: listener_node.into(),
            ..Default::default()
        }
    }

    pub fn with_handler(
        mut self,
        handler: impl Into<String>,
    ) -> Self {
        self.handler = handler.into();
        self
    }

    /// Watch key for this handler, falling back to `default_node` when blank.
    pub fn watch_key(
        &self,
        default_node: &str,
    ) -> String {
        if self.listener_node.trim().is_empty() {
            default_node.to_string()
        } else {
            self.listener_node.clone()
        }
    }
}

/// Logical route that discovered upstreams are attached to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxySelector {
    pub id: String,
    pub name: String,
    pub plugin_name: String,
    #[serde(default)]
    pub namespace_id: String,
}

impl ProxySelector {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        plugin_name: impl Into<String>,
        namespace_id: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            plugin_name: plugin_name.into(),
            namespace_id: namespace_id.into(),
        }
    }
}

/// Instance as reported live by a registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveredInstance {
    pub host: String,
    pub port: u16,
    pub weight: i32,
    pub status: i32,
}

impl DiscoveredInstance {
    pub fn new(
        host: impl Into<String>,
        port: u16,
        weight: i32,
        status: i32,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            weight,
            status,
        }
    }

    /// Canonical `host:port` URL
    pub fn url(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Durable upstream record. Unique per (discovery_handler_id, url).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedUpstream {
    pub id: String,
    pub discovery_handler_id: String,
    pub namespace_id: String,
    pub protocol: String,
    pub url: String,
    pub status: i32,
    pub weight: i32,
    pub props: String,
    /// epoch millis
    pub date_created: u64,
    /// epoch millis
    pub date_updated: u64,
}

/// Upstream entry as carried inside a [`SyncRecord`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpstreamData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discovery_handler_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace_id: Option<String>,

    pub url: String,
    pub weight: i32,
    pub status: i32,
    pub protocol: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub props: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_created: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_updated: Option<u64>,
}

/// One route's worth of sync data inside a [`ChangeEvent`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncRecord {
    pub plugin_name: String,
    pub selector_id: String,
    pub selector_name: String,
    pub namespace_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discovery_handler_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upstream_list: Option<Vec<UpstreamData>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConfigGroup {
    RouteSelector,
    DiscoveredUpstream,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    Update,
    Delete,
}

/// Structured notification consumed by the config-distribution subsystem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub group: ConfigGroup,
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub payload: Vec<SyncRecord>,
}

impl ChangeEvent {
    pub fn new(
        group: ConfigGroup,
        event_type: EventType,
        payload: Vec<SyncRecord>,
    ) -> Self {
        Self {
            group,
            event_type,
            payload,
        }
    }

    pub fn single(
        group: ConfigGroup,
        event_type: EventType,
        record: SyncRecord,
    ) -> Self {
        Self::new(group, event_type, vec![record])
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryEventKind {
    Added,
    Updated,
    Deleted,
    Ignored,
}

/// Low-level change notification delivered by a connector watch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryChangeEvent {
    pub key: String,
    /// JSON object or array describing the changed upstream(s)
    pub value: String,
    pub kind: RegistryEventKind,
}

impl RegistryChangeEvent {
    pub fn new(
        key: impl Into<String>,
        value: impl Into<String>,
        kind: RegistryEventKind,
    ) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            kind,
        }
    }
}

/// Blank input yields an empty map.
pub(crate) fn parse_flat_json_object(
    raw: &str,
    what: &str,
) -> Result<HashMap<String, String>> {
    if raw.trim().is_empty() {
        return Ok(HashMap::new());
    }

    let object: serde_json::Map<String, serde_json::Value> = serde_json::from_str(raw)
        .map_err(|e| Error::InvalidConfig(format!("malformed {}: {}", what, e)))?;

    let mut flat = HashMap::with_capacity(object.len());
    for (key, value) in object {
        let value = match value {
            serde_json::Value::Null => continue,
            serde_json::Value::String(s) => s,
            serde_json::Value::Bool(b) => b.to_string(),
            serde_json::Value::Number(n) => n.to_string(),
            _ => {
                return Err(Error::InvalidConfig(format!(
                    "{} entry {} must be a scalar value",
                    what, key
                )))
            }
        };
        flat.insert(key, value);
    }
    Ok(flat)
}
