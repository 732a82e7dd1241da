//! Upstream persistence.
//!
//! The store is shared across all discovery clusters and must tolerate
//! concurrent insert/delete by distinct route handlers. Every implementation
//! enforces the (discovery_handler_id, url) uniqueness invariant itself.

mod adaptors;
mod upstream_store;


pub use adaptors::*;
pub use upstream_store::*;
