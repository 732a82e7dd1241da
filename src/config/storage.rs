//! Upstream store backend selection

use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;

use super::validate_directory;
use crate::Result;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Process-local; records are lost on restart
    #[default]
    Memory,
    /// Embedded sled database under `db_root_dir`
    Sled,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,

    /// Only used by the sled backend
    #[serde(default = "default_db_dir")]
    pub db_root_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            db_root_dir: default_db_dir(),
        }
    }
}

impl StorageConfig {
    pub fn validate(&self) -> Result<()> {
        if self.backend == StorageBackend::Sled {
            validate_directory(&self.db_root_dir, "db_root_dir")?;
        }
        Ok(())
    }
}

fn default_db_dir() -> PathBuf {
    PathBuf::from("/tmp/discovery-db")
}
