#[cfg(test)]
use mockall::automock;

use crate::PersistedUpstream;
use crate::Result;

#[cfg_attr(test, automock)]
pub trait UpstreamStore: Send + Sync + 'static {
    /// All records owned by `handler_id`, oldest first.
    fn select_by_handler_id(
        &self,
        handler_id: &str,
    ) -> Result<Vec<PersistedUpstream>>;

    /// Fails with `StorageError::DuplicateUpstream` when the handler already
    /// owns a record for the same url.
    fn insert(
        &self,
        record: PersistedUpstream,
    ) -> Result<()>;

    /// Returns the number of records removed. Unknown ids are skipped.
    fn delete_by_ids(
        &self,
        ids: &[String],
    ) -> Result<usize>;

    /// Overwrites weight, status, protocol, namespace, props and update time of
    /// the record matching (handler id, url). Returns false when none exists.
    fn update_by_handler_and_url(
        &self,
        record: &PersistedUpstream,
    ) -> Result<bool>;

    fn delete_by_url(
        &self,
        handler_id: &str,
        url: &str,
    ) -> Result<usize>;
}

/// Applies the mutable columns of `from` onto `into`, keeping identity and
/// creation time.
pub(crate) fn merge_mutable_columns(
    into: &mut PersistedUpstream,
    from: &PersistedUpstream,
) {
    into.namespace_id = from.namespace_id.clone();
    into.protocol = from.protocol.clone();
    into.status = from.status;
    into.weight = from.weight;
    into.props = from.props.clone();
    into.date_updated = from.date_updated;
}

pub(crate) fn sort_records(records: &mut [PersistedUpstream]) {
    records.sort_by(|a, b| {
        a.date_created
            .cmp(&b.date_created)
            .then_with(|| a.url.cmp(&b.url))
    });
}
