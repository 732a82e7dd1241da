use serde::Deserialize;
use serde::Serialize;

use crate::constants::DEFAULT_LISTENER_NODE;
use crate::constants::DEFAULT_UPSTREAM_PROTOCOL;
use crate::Error;
use crate::Result;

/// Default number of per-id lock stripes
pub const DEFAULT_LOCK_STRIPES: usize = 64;

/// Reconciliation and event pipeline parameters
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct DiscoveryConfig {
    /// Watch key used when a handler leaves its listener node blank
    #[serde(default = "default_listener_node")]
    pub default_listener_node: String,

    /// Scheme stamped on upstreams built from registry instances
    #[serde(default = "default_protocol")]
    pub default_protocol: String,

    /// Stripes for the per-discovery-id lock table
    #[serde(default = "default_lock_stripes")]
    pub lock_stripes: usize,

    /// Bounded queue between publishers and the event dispatcher
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            default_listener_node: default_listener_node(),
            default_protocol: default_protocol(),
            lock_stripes: default_lock_stripes(),
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}

impl DiscoveryConfig {
    pub fn validate(&self) -> Result<()> {
        if self.default_listener_node.trim().is_empty() {
            return Err(Error::InvalidConfig(
                "default_listener_node cannot be empty".into(),
            ));
        }
        if self.lock_stripes == 0 {
            return Err(Error::InvalidConfig("lock_stripes must be > 0".into()));
        }
        if self.event_channel_capacity == 0 {
            return Err(Error::InvalidConfig(
                "event_channel_capacity must be > 0".into(),
            ));
        }
        Ok(())
    }
}

fn default_listener_node() -> String {
    DEFAULT_LISTENER_NODE.to_string()
}

fn default_protocol() -> String {
    DEFAULT_UPSTREAM_PROTOCOL.to_string()
}

fn default_lock_stripes() -> usize {
    DEFAULT_LOCK_STRIPES
}

fn default_event_channel_capacity() -> usize {
    1024
}
