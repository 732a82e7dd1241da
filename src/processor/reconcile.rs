//! Pure diff step of a reconciliation pass.

use std::collections::HashSet;

use crate::DiscoveredInstance;
use crate::PersistedUpstream;
use crate::ProxySelector;
use crate::UpstreamData;

/// Store mutations computed by [`plan`].
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ReconcilePlan {
    /// Persisted records no longer reported live
    pub stale_ids: Vec<String>,
    /// Live candidates not persisted yet, in candidate order
    pub inserts: Vec<UpstreamData>,
}

impl ReconcilePlan {
    pub fn is_empty(&self) -> bool {
        self.stale_ids.is_empty() && self.inserts.is_empty()
    }
}

/// Translates live instances into candidates for `selector`. Later instances
/// with an already seen url are dropped.
pub fn candidates(
    instances: &[DiscoveredInstance],
    selector: &ProxySelector,
    protocol: &str,
) -> Vec<UpstreamData> {
    let mut seen = HashSet::with_capacity(instances.len());
    instances
        .iter()
        .map(|instance| UpstreamData::from_instance(instance, selector, protocol))
        .filter(|candidate| seen.insert(candidate.url.clone()))
        .collect()
}

/// Diffs by url only. Records present on both sides are left alone, even if
/// weight or status differ.
pub fn plan(
    persisted: &[PersistedUpstream],
    candidates: &[UpstreamData],
) -> ReconcilePlan {
    let live: HashSet<&str> = candidates.iter().map(|c| c.url.as_str()).collect();
    let stored: HashSet<&str> = persisted.iter().map(|r| r.url.as_str()).collect();

    ReconcilePlan {
        stale_ids: persisted
            .iter()
            .filter(|r| !live.contains(r.url.as_str()))
            .map(|r| r.id.clone())
            .collect(),
        inserts: candidates
            .iter()
            .filter(|c| !stored.contains(c.url.as_str()))
            .cloned()
            .collect(),
    }
}
