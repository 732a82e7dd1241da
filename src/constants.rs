// -
// Discovery defaults

/// Watch key used when a discovery handler leaves its listener node blank
pub const DEFAULT_LISTENER_NODE: &str = "/shenyu/discovery";

/// Scheme assigned to upstreams translated from registry instances
pub const DEFAULT_UPSTREAM_PROTOCOL: &str = "http://";

/// Type tag of the built-in in-process registry backend
pub const LOCAL_REGISTRY_TYPE: &str = "local";

// -
// Database namespaces

/// Sled tree holding upstream records keyed by id
pub(crate) const UPSTREAM_TREE: &str = "_discovery_upstream";

/// Sled tree holding the (handler id, url) -> id uniqueness index
pub(crate) const UPSTREAM_URL_INDEX_TREE: &str = "_discovery_upstream_url_index";
