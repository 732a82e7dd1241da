use std::collections::HashMap;

use parking_lot::RwLock;
use tracing::trace;

use crate::merge_mutable_columns;
use crate::sort_records;
use crate::PersistedUpstream;
use crate::Result;
use crate::StorageError;
use crate::UpstreamStore;

#[derive(Debug, Default)]
struct Inner {
    records: HashMap<String, PersistedUpstream>,
    // (handler_id, url) -> id
    url_index: HashMap<(String, String), String>,
}

/// In-memory upstream store
#[derive(Debug, Default)]
pub struct MemoryUpstreamStore {
    inner: RwLock<Inner>,
}

impl MemoryUpstreamStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.inner.read().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl UpstreamStore for MemoryUpstreamStore {
    fn select_by_handler_id(
        &self,
        handler_id: &str,
    ) -> Result<Vec<PersistedUpstream>> {
        let inner = self.inner.read();
        let mut records: Vec<PersistedUpstream> = inner
            .records
            .values()
            .filter(|r| r.discovery_handler_id == handler_id)
            .cloned()
            .collect();
        sort_records(&mut records);
        Ok(records)
    }

    fn insert(
        &self,
        record: PersistedUpstream,
    ) -> Result<()> {
        trace!(id = %record.id, url = %record.url, "insert upstream");

        let mut inner = self.inner.write();
        let key = (record.discovery_handler_id.clone(), record.url.clone());
        if inner.url_index.contains_key(&key) {
            return Err(StorageError::DuplicateUpstream {
                handler_id: key.0,
                url: key.1,
            }
            .into());
        }
        inner.url_index.insert(key, record.id.clone());
        inner.records.insert(record.id.clone(), record);
        Ok(())
    }

    fn delete_by_ids(
        &self,
        ids: &[String],
    ) -> Result<usize> {
        let mut inner = self.inner.write();
        let mut removed = 0;
        for id in ids {
            if let Some(record) = inner.records.remove(id) {
                inner
                    .url_index
                    .remove(&(record.discovery_handler_id, record.url));
                removed += 1;
            }
        }
        Ok(removed)
    }

    fn update_by_handler_and_url(
        &self,
        record: &PersistedUpstream,
    ) -> Result<bool> {
        let mut inner = self.inner.write();
        let key = (record.discovery_handler_id.clone(), record.url.clone());
        let Some(id) = inner.url_index.get(&key).cloned() else {
            return Ok(false);
        };
        match inner.records.get_mut(&id) {
            Some(existing) => {
                merge_mutable_columns(existing, record);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn delete_by_url(
        &self,
        handler_id: &str,
        url: &str,
    ) -> Result<usize> {
        let mut inner = self.inner.write();
        match inner
            .url_index
            .remove(&(handler_id.to_string(), url.to_string()))
        {
            Some(id) => Ok(inner.records.remove(&id).map_or(0, |_| 1)),
            None => Ok(0),
        }
    }
}
