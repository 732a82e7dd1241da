mod mem_upstream_store;

pub use mem_upstream_store::*;
