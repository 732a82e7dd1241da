use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::sync::watch;
use tracing::debug;
use tracing::info;
use tracing::warn;

use super::ChangeEventSubscriber;
use super::ChannelEventPublisher;
use crate::ChangeEvent;

/// Creates a connected publisher/dispatcher pair. `capacity` is clamped to at
/// least one.
pub fn event_channel(capacity: usize) -> (ChannelEventPublisher, EventDispatcher) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (ChannelEventPublisher::new(tx), EventDispatcher::new(rx))
}

pub struct EventDispatcher {
    rx: mpsc::Receiver<ChangeEvent>,
    subscribers: Vec<Arc<dyn ChangeEventSubscriber>>,
}

impl EventDispatcher {
    fn new(rx: mpsc::Receiver<ChangeEvent>) -> Self {
        Self {
            rx,
            subscribers: Vec::new(),
        }
    }

    pub fn subscribe(
        &mut self,
        subscriber: Arc<dyn ChangeEventSubscriber>,
    ) {
        self.subscribers.push(subscriber);
    }

    /// Delivers events in publication order until every publisher is dropped
    /// or `shutdown` fires. Events already queued at shutdown are still
    /// delivered.
    pub async fn run(
        mut self,
        mut shutdown: watch::Receiver<()>,
    ) {
        info!(subscribers = self.subscribers.len(), "event dispatcher started");
        loop {
            tokio::select! {
                biased;
                event = self.rx.recv() => match event {
                    Some(event) => self.dispatch(&event),
                    None => {
                        debug!("all publishers dropped");
                        break;
                    }
                },
                _ = shutdown.changed() => {
                    self.rx.close();
                    while let Some(event) = self.rx.recv().await {
                        self.dispatch(&event);
                    }
                    break;
                }
            }
        }
        info!("event dispatcher stopped");
    }

    fn dispatch(
        &self,
        event: &ChangeEvent,
    ) {
        if self.subscribers.is_empty() {
            warn!(group = ?event.group, "no subscriber for change event");
        }
        for subscriber in &self.subscribers {
            subscriber.on_event(event);
        }
    }
}

/// Writes every event to the log as JSON.
#[derive(Debug, Default)]
pub struct LoggingSubscriber;

impl ChangeEventSubscriber for LoggingSubscriber {
    fn on_event(
        &self,
        event: &ChangeEvent,
    ) {
        match serde_json::to_string(event) {
            Ok(json) => info!(target: "discovery_sync::event", "{}", json),
            Err(e) => warn!("change event can not be serialized: {}", e),
        }
    }
}
