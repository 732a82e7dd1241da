use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;
use tracing::info;

use super::LocalConnector;
use super::RegistryConnector;
use crate::constants::LOCAL_REGISTRY_TYPE;
use crate::ConnectorError;
use crate::Error;
use crate::Result;

/// Builds (or hands out) a connector for one type tag.
pub type ConnectorProvider = Arc<dyn Fn() -> Arc<dyn RegistryConnector> + Send + Sync>;

/// Type-tag lookup table for registry backends, populated at startup.
///
/// A provider may return a fresh connector per call or the same shared
/// instance every time; the registration manager only closes a shared
/// instance once no registration references it any more.
#[derive(Default)]
pub struct ConnectorFactory {
    providers: DashMap<String, ConnectorProvider>,
}

impl std::fmt::Debug for ConnectorFactory {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        let mut tags: Vec<String> = self.providers.iter().map(|e| e.key().clone()).collect();
        tags.sort();
        f.debug_struct("ConnectorFactory").field("types", &tags).finish()
    }
}

impl ConnectorFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Factory with the built-in `local` backend registered as a shared
    /// instance.
    pub fn with_builtin() -> Self {
        let factory = Self::new();
        factory.register_shared(LOCAL_REGISTRY_TYPE, Arc::new(LocalConnector::new()));
        factory
    }

    /// Registers a provider; a later registration for the same tag wins.
    pub fn register<F>(
        &self,
        register_type: &str,
        provider: F,
    ) where
        F: Fn() -> Arc<dyn RegistryConnector> + Send + Sync + 'static,
    {
        let tag = normalize(register_type);
        info!(register_type = %tag, "Registered registry connector provider");
        self.providers.insert(tag, Arc::new(provider));
    }

    /// Registers a tag that always yields `connector`.
    pub fn register_shared(
        &self,
        register_type: &str,
        connector: Arc<dyn RegistryConnector>,
    ) {
        self.register(register_type, move || connector.clone());
    }

    pub fn contains(
        &self,
        register_type: &str,
    ) -> bool {
        self.providers.contains_key(&normalize(register_type))
    }

    /// Unknown or blank tags are configuration errors.
    pub fn create(
        &self,
        register_type: &str,
    ) -> Result<Arc<dyn RegistryConnector>> {
        let tag = normalize(register_type);
        if tag.is_empty() {
            return Err(Error::InvalidConfig("registry type cannot be empty".to_string()));
        }

        // clone the provider out so the map shard is not held while it runs
        let provider = self
            .providers
            .get(&tag)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| ConnectorError::UnknownType(tag.clone()))?;

        debug!(register_type = %tag, "Creating registry connector");
        Ok(provider())
    }
}

fn normalize(register_type: &str) -> String {
    register_type.trim().to_ascii_lowercase()
}
