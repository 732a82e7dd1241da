//! Change-event publication.
//!
//! Producers hand events to an [`EventPublisher`] and return immediately;
//! delivery to the config-distribution side happens on the
//! [`EventDispatcher`] task.

mod dispatcher;
mod publisher;


pub use dispatcher::*;
#[cfg(test)]
use mockall::automock;
pub use publisher::*;

use crate::ChangeEvent;

#[cfg_attr(test, automock)]
pub trait EventPublisher: Send + Sync + 'static {
    /// Fire-and-forget. Must not block on downstream consumers.
    fn publish(
        &self,
        event: ChangeEvent,
    );
}

/// Downstream consumer fed by the [`EventDispatcher`].
pub trait ChangeEventSubscriber: Send + Sync + 'static {
    fn on_event(
        &self,
        event: &ChangeEvent,
    );
}
