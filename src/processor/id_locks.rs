use std::collections::hash_map::DefaultHasher;
use std::hash::Hash;
use std::hash::Hasher;

use parking_lot::ReentrantMutex;
use parking_lot::ReentrantMutexGuard;

/// Striped per-discovery-id mutual exclusion.
///
/// Every operation touching one discovery id (registration, removal,
/// reconciliation, watch callbacks) holds that id's stripe for its whole
/// sequence. Stripes are re-entrant so a connector that fires a watch callback
/// synchronously inside `watch_instances` does not deadlock the caller.
/// Distinct ids only contend when they hash onto the same stripe.
pub struct IdLocks {
    stripes: Vec<ReentrantMutex<()>>,
}

impl std::fmt::Debug for IdLocks {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("IdLocks")
            .field("stripes", &self.stripes.len())
            .finish()
    }
}

impl IdLocks {
    /// `stripes` is clamped to at least one.
    pub fn new(stripes: usize) -> Self {
        let stripes = stripes.max(1);
        Self {
            stripes: (0..stripes).map(|_| ReentrantMutex::new(())).collect(),
        }
    }

    pub fn stripe_count(&self) -> usize {
        self.stripes.len()
    }

    pub fn stripe_of(
        &self,
        discovery_id: &str,
    ) -> usize {
        let mut hasher = DefaultHasher::new();
        discovery_id.hash(&mut hasher);
        (hasher.finish() % self.stripes.len() as u64) as usize
    }

    pub fn lock(
        &self,
        discovery_id: &str,
    ) -> ReentrantMutexGuard<'_, ()> {
        self.stripes[self.stripe_of(discovery_id)].lock()
    }
}

impl Default for IdLocks {
    fn default() -> Self {
        Self::new(crate::DEFAULT_LOCK_STRIPES)
    }
}
