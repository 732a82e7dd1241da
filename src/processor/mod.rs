//! Discovery processing: registration lifecycle, watch subscriptions and
//! reconciliation of live instances against persisted upstreams.

mod default_processor;
mod id_locks;
mod reconcile;
mod registration;


pub use default_processor::*;
pub use id_locks::*;
pub use reconcile::*;
pub use registration::*;

use crate::DiscoveryHandler;
use crate::DiscoveryRegistration;
use crate::ProxySelector;
use crate::Result;
use crate::UpstreamData;

/// Administrative entry points of the discovery core.
///
/// Operations on an unknown discovery id are logged no-ops. Every other
/// failure is returned to the caller unchanged.
pub trait DiscoveryProcessor: Send + Sync + 'static {
    /// At most one connector per registration id.
    fn create_discovery(
        &self,
        registration: &DiscoveryRegistration,
    ) -> Result<()>;

    fn remove_discovery(
        &self,
        registration: &DiscoveryRegistration,
    ) -> Result<()>;

    /// Subscribes the handler's watch key and announces the selector.
    fn create_proxy_selector(
        &self,
        handler: &DiscoveryHandler,
        selector: &ProxySelector,
    ) -> Result<()>;

    fn remove_proxy_selector(
        &self,
        handler: &DiscoveryHandler,
        selector: &ProxySelector,
    ) -> Result<()>;

    /// One reconciliation pass for the handler's route.
    fn fetch_all(
        &self,
        handler: &DiscoveryHandler,
        selector: &ProxySelector,
    ) -> Result<()>;

    fn remove_selector_upstream(
        &self,
        selector: &ProxySelector,
    );

    fn change_upstream(
        &self,
        selector: &ProxySelector,
        upstreams: Vec<UpstreamData>,
    );
}
