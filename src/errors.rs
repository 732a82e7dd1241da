//! Discovery Core Error Hierarchy
//!
//! Errors are grouped by the layer that produced them. Only the
//! "discovery not registered" case is recovered locally (as a logged no-op);
//! everything below propagates to the administrative caller unchanged.

use config::ConfigError;

#[doc(hidden)]
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Configuration source loading or deserialization failures
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Malformed connection properties, handler blobs or settings
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    /// Registry backend failures
    #[error(transparent)]
    Connector(#[from] ConnectorError),

    /// Upstream persistence failures
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Unrecoverable failures requiring process termination
    #[error("Fatal error: {0}")]
    Fatal(String),
}

#[derive(Debug, thiserror::Error)]
pub enum ConnectorError {
    /// No backend registered under the requested type tag
    #[error("Unknown registry type: {0}")]
    UnknownType(String),

    /// Operation issued before `init` or after `close`
    #[error("Registry connector {0} is not initialized")]
    NotInitialized(String),

    /// Registry endpoint cannot be reached
    #[error("Registry unreachable at {address}: {reason}")]
    Unreachable { address: String, reason: String },

    /// Backend rejected or failed the operation
    #[error("Registry operation {operation} failed: {reason}")]
    OperationFailed {
        operation: &'static str,
        reason: String,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Uniqueness of (handler id, url) would be violated
    #[error("Upstream {url} already exists for handler {handler_id}")]
    DuplicateUpstream { handler_id: String, url: String },

    /// Embedded database errors
    #[error(transparent)]
    SledError(#[from] sled::Error),

    /// Serialization failures for persisted records
    #[error(transparent)]
    BincodeError(#[from] bincode::Error),

    /// Disk I/O failures while opening the store
    #[error(transparent)]
    IoError(#[from] std::io::Error),

    /// Index and record trees disagree
    #[error("Data corruption detected at {location}")]
    DataCorruption { location: String },
}
