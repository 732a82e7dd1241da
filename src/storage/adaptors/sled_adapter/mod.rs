mod sled_upstream_store;

pub use sled_upstream_store::*;

use crate::Result;
use crate::StorageError;

/// Opens the embedded upstream database under `sled_db_root_path/upstream`.
pub fn init_sled_upstream_db(
    sled_db_root_path: impl AsRef<std::path::Path> + std::fmt::Debug
) -> Result<sled::Db> {
    tracing::debug!("init_sled_upstream_db from path: {:?}", &sled_db_root_path);

    let path = sled_db_root_path.as_ref();
    let upstream_db_path = path.join("upstream");

    sled::Config::default()
        .path(&upstream_db_path)
        .cache_capacity(64 * 1024 * 1024) //64MB
        .flush_every_ms(Some(10))
        .use_compression(true)
        .compression_factor(1)
        .open()
        .map_err(|e| {
            tracing::warn!(
                "Try to open DB at this location: {:?} and failed: {:?}",
                upstream_db_path,
                e
            );
            StorageError::SledError(e).into()
        })
}
