use sled::transaction::abort;
use sled::transaction::TransactionError;
use sled::Transactional;
use sled::Tree;
use tracing::debug;
use tracing::trace;
use tracing::warn;

use crate::constants::UPSTREAM_TREE;
use crate::constants::UPSTREAM_URL_INDEX_TREE;
use crate::merge_mutable_columns;
use crate::sort_records;
use crate::PersistedUpstream;
use crate::Result;
use crate::StorageError;
use crate::UpstreamStore;

const INDEX_SEPARATOR: char = '\u{0}';

/// Sled-backed upstream store.
///
/// Records live in one tree keyed by id; a second tree maps
/// `handler_id \0 url` to the record id. Every write touching both trees runs
/// in one multi-tree transaction, so the index never points at a missing
/// record.
pub struct SledUpstreamStore {
    records: Tree,
    url_index: Tree,
}

impl std::fmt::Debug for SledUpstreamStore {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("SledUpstreamStore")
            .field("records_len", &self.records.len())
            .finish()
    }
}

impl SledUpstreamStore {
    pub fn new(db: &sled::Db) -> Result<Self> {
        let records = db.open_tree(UPSTREAM_TREE).map_err(StorageError::SledError)?;
        let url_index = db
            .open_tree(UPSTREAM_URL_INDEX_TREE)
            .map_err(StorageError::SledError)?;
        Ok(Self { records, url_index })
    }

    /// Number of persisted records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn flush(&self) -> Result<usize> {
        let a = self.records.flush().map_err(StorageError::SledError)?;
        let b = self.url_index.flush().map_err(StorageError::SledError)?;
        Ok(a + b)
    }

    fn index_key(
        handler_id: &str,
        url: &str,
    ) -> Vec<u8> {
        format!("{handler_id}{INDEX_SEPARATOR}{url}").into_bytes()
    }

    fn handler_prefix(handler_id: &str) -> Vec<u8> {
        format!("{handler_id}{INDEX_SEPARATOR}").into_bytes()
    }

    fn load(
        &self,
        id: &[u8],
    ) -> Result<Option<PersistedUpstream>> {
        match self.records.get(id).map_err(StorageError::SledError)? {
            Some(bytes) => {
                let record = bincode::deserialize::<PersistedUpstream>(&bytes)
                    .map_err(StorageError::BincodeError)?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    fn store(
        &self,
        record: &PersistedUpstream,
    ) -> Result<()> {
        let bytes = bincode::serialize(record).map_err(StorageError::BincodeError)?;
        self.records
            .insert(record.id.as_bytes(), bytes)
            .map_err(StorageError::SledError)?;
        Ok(())
    }
}

impl UpstreamStore for SledUpstreamStore {
    fn select_by_handler_id(
        &self,
        handler_id: &str,
    ) -> Result<Vec<PersistedUpstream>> {
        let mut records = Vec::new();
        for entry in self.url_index.scan_prefix(Self::handler_prefix(handler_id)) {
            let (key, id) = entry.map_err(StorageError::SledError)?;
            match self.load(&id)? {
                Some(record) => records.push(record),
                None => {
                    warn!(
                        "url index entry {:?} points at missing record {:?}",
                        String::from_utf8_lossy(&key),
                        String::from_utf8_lossy(&id)
                    );
                    return Err(StorageError::DataCorruption {
                        location: format!("{}:{}", UPSTREAM_URL_INDEX_TREE, handler_id),
                    }
                    .into());
                }
            }
        }
        sort_records(&mut records);
        Ok(records)
    }

    fn insert(
        &self,
        record: PersistedUpstream,
    ) -> Result<()> {
        trace!(id = %record.id, url = %record.url, "insert upstream");

        let key = Self::index_key(&record.discovery_handler_id, &record.url);
        let bytes = bincode::serialize(&record).map_err(StorageError::BincodeError)?;
        (&self.records, &self.url_index)
            .transaction(|(records, url_index)| {
                if url_index.get(key.as_slice())?.is_some() {
                    return abort(StorageError::DuplicateUpstream {
                        handler_id: record.discovery_handler_id.clone(),
                        url: record.url.clone(),
                    });
                }
                url_index.insert(key.as_slice(), record.id.as_bytes())?;
                records.insert(record.id.as_bytes(), bytes.as_slice())?;
                Ok(())
            })
            .map_err(from_transaction)
    }

    fn delete_by_ids(
        &self,
        ids: &[String],
    ) -> Result<usize> {
        let removed = (&self.records, &self.url_index)
            .transaction(|(records, url_index)| {
                let mut removed = 0;
                for id in ids {
                    let Some(bytes) = records.remove(id.as_bytes())? else {
                        continue;
                    };
                    let record = match bincode::deserialize::<PersistedUpstream>(&bytes) {
                        Ok(record) => record,
                        Err(e) => return abort(StorageError::BincodeError(e)),
                    };
                    let key = Self::index_key(&record.discovery_handler_id, &record.url);
                    // only drop the index entry if it still points at this record
                    if url_index.get(key.as_slice())?.as_deref() == Some(id.as_bytes()) {
                        url_index.remove(key.as_slice())?;
                    }
                    removed += 1;
                }
                Ok(removed)
            })
            .map_err(from_transaction)?;
        debug!("deleted {} of {} upstream records", removed, ids.len());
        Ok(removed)
    }

    fn update_by_handler_and_url(
        &self,
        record: &PersistedUpstream,
    ) -> Result<bool> {
        let key = Self::index_key(&record.discovery_handler_id, &record.url);
        let Some(id) = self.url_index.get(&key).map_err(StorageError::SledError)? else {
            return Ok(false);
        };
        let Some(mut existing) = self.load(&id)? else {
            return Ok(false);
        };
        merge_mutable_columns(&mut existing, record);
        self.store(&existing)?;
        Ok(true)
    }

    fn delete_by_url(
        &self,
        handler_id: &str,
        url: &str,
    ) -> Result<usize> {
        let key = Self::index_key(handler_id, url);
        (&self.records, &self.url_index)
            .transaction(|(records, url_index)| match url_index.remove(key.as_slice())? {
                Some(id) => Ok(records.remove(id)?.map_or(0, |_| 1)),
                None => Ok(0),
            })
            .map_err(from_transaction)
    }
}

fn from_transaction(e: TransactionError<StorageError>) -> crate::Error {
    match e {
        TransactionError::Abort(e) => e.into(),
        TransactionError::Storage(e) => StorageError::SledError(e).into(),
    }
}
