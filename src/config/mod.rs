//! Configuration management for the discovery node.
//!
//! Provides hierarchical configuration loading and validation with:
//! - Default values as code base
//! - Configuration file support
//! - Environment variable overrides
//! - Component-wise validation

mod discovery;
mod monitoring;
mod storage;


use std::env;
use std::fmt::Debug;
use std::path::Path;
use std::path::PathBuf;

use config::Config;
use config::ConfigError;
use config::Environment;
use config::File;
pub use discovery::*;
pub use monitoring::*;
use serde::Deserialize;
use serde::Serialize;
pub use storage::*;

use crate::DiscoveryRegistration;
use crate::Error;
use crate::Result;

const ENV_PREFIX: &str = "DISCOVERY";

/// Main configuration container for the discovery node
///
/// Combines all subsystem configurations with hierarchical override support:
/// 1. Default values from code implementation
/// 2. Configuration file specified by `CONFIG_PATH`
/// 3. Environment variables with `DISCOVERY__` prefix (highest priority)
#[derive(Serialize, Deserialize, Clone)]
pub struct DiscoveryNodeConfig {
    /// Reconciliation and event pipeline parameters
    #[serde(default)]
    pub discovery: DiscoveryConfig,

    /// Upstream store backend
    #[serde(default)]
    pub storage: StorageConfig,

    /// Metrics endpoint
    #[serde(default)]
    pub monitoring: MonitoringConfig,

    /// Log files output directory
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,

    /// Registrations created at startup
    #[serde(default)]
    pub registrations: Vec<DiscoveryRegistration>,
}

impl Default for DiscoveryNodeConfig {
    fn default() -> Self {
        Self {
            discovery: DiscoveryConfig::default(),
            storage: StorageConfig::default(),
            monitoring: MonitoringConfig::default(),
            log_dir: default_log_dir(),
            registrations: Vec::new(),
        }
    }
}

impl Debug for DiscoveryNodeConfig {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("DiscoveryNodeConfig")
            .field("discovery", &self.discovery)
            .field("storage", &self.storage)
            .field("registrations", &self.registrations.len())
            .finish()
    }
}

impl DiscoveryNodeConfig {
    /// Loads configuration from hierarchical sources without validation.
    ///
    /// Callers MUST call `validate()` once all overrides are applied.
    ///
    /// # Examples
    /// ```ignore
    /// std::env::set_var("CONFIG_PATH", "config/discovery.toml");
    /// std::env::set_var("DISCOVERY__STORAGE__BACKEND", "sled");
    /// let cfg = DiscoveryNodeConfig::new()?.validate()?;
    /// ```
    pub fn new() -> Result<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);

        if let Ok(config_path) = env::var("CONFIG_PATH") {
            builder = builder.add_source(File::with_name(&config_path).required(true));
        }

        builder = builder.add_source(env_source());

        let config: Self = builder.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Applies additional overrides from `path`. Environment variables still
    /// win over the file.
    pub fn with_override_config(
        &self,
        path: &str,
    ) -> Result<Self> {
        let config: Self = Config::builder()
            .add_source(Config::try_from(self)?)
            .add_source(File::with_name(path))
            .add_source(env_source())
            .build()?
            .try_deserialize()?;
        Ok(config)
    }

    /// Consumes self and validates every subsystem.
    pub fn validate(self) -> Result<Self> {
        self.discovery.validate()?;
        self.storage.validate()?;
        self.monitoring.validate()?;
        validate_directory(&self.log_dir, "log_dir")?;

        let mut ids = std::collections::HashSet::new();
        for registration in &self.registrations {
            if registration.id.trim().is_empty() {
                return Err(Error::InvalidConfig("registration id cannot be empty".into()));
            }
            if !ids.insert(registration.id.as_str()) {
                return Err(Error::InvalidConfig(format!(
                    "Duplicate registration id {}",
                    registration.id
                )));
            }
        }
        Ok(self)
    }
}

fn env_source() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .separator("__")
        .ignore_empty(true)
        .try_parsing(true)
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("./logs")
}

/// Ensures directory path is valid and writable
pub(super) fn validate_directory(
    path: &Path,
    name: &str,
) -> Result<()> {
    if path.as_os_str().is_empty() {
        return Err(Error::Config(ConfigError::Message(format!(
            "{name} path cannot be empty"
        ))));
    }

    #[cfg(not(test))]
    {
        use std::fs;
        if !path.exists() {
            fs::create_dir_all(path).map_err(|e| {
                Error::Config(ConfigError::Message(format!(
                    "Failed to create {} directory at {}: {}",
                    name,
                    path.display(),
                    e
                )))
            })?;
        }
    }

    Ok(())
}
