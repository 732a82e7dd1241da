use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::trace;
use tracing::warn;

use super::EventPublisher;
use crate::metrics::EVENTS_DROPPED;
use crate::metrics::EVENTS_PUBLISHED;
use crate::ChangeEvent;

/// Publisher backed by a bounded channel drained by an `EventDispatcher`.
#[derive(Debug, Clone)]
pub struct ChannelEventPublisher {
    tx: mpsc::Sender<ChangeEvent>,
}

impl ChannelEventPublisher {
    pub(super) fn new(tx: mpsc::Sender<ChangeEvent>) -> Self {
        Self { tx }
    }
}

impl EventPublisher for ChannelEventPublisher {
    fn publish(
        &self,
        event: ChangeEvent,
    ) {
        let group = label(&event.group);
        let event_type = label(&event.event_type);

        match self.tx.try_send(event) {
            Ok(()) => {
                trace!(%group, %event_type, "change event queued");
                EVENTS_PUBLISHED.with_label_values(&[&group, &event_type]).inc();
            }
            Err(TrySendError::Full(event)) => {
                warn!(
                    %group,
                    %event_type,
                    records = event.payload.len(),
                    "change event queue full, dropping event"
                );
                EVENTS_DROPPED.inc();
            }
            Err(TrySendError::Closed(_)) => {
                warn!(%group, %event_type, "change event dispatcher stopped, dropping event");
                EVENTS_DROPPED.inc();
            }
        }
    }
}

fn label<T: serde::Serialize>(value: &T) -> String {
    serde_json::to_value(value)
        .ok()
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_default()
}
