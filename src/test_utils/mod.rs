//! Shared fixtures for unit tests
mod common;
mod fixtures;

pub use common::*;
pub use fixtures::*;
