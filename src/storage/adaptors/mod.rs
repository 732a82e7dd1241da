mod mem;
mod sled_adapter;

pub use mem::*;
pub use sled_adapter::*;
