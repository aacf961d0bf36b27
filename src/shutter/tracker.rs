//! Current-device selection and its live position feed.
//!
//! Exactly one position subscription exists at a time. Switching devices
//! unsubscribes the previous position topic before the new one is subscribed,
//! and the whole sequence runs under the selection lock so concurrent selects
//! cannot interleave.
//!
//! A feedback message from the old topic that is already in flight when the
//! unsubscribe is issued can still update the display once. The local handler
//! is removed together with the unsubscribe, which bounds that window to
//! messages being dispatched at that very moment.

use super::presentation::Presentation;
use super::registry::DeviceRegistry;
use crate::discovery::Cover;
use crate::mqtt::bus::{Bus, MessageHandler};
use rumqttc::QoS;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info, warn};

pub struct SelectionTracker<B: Bus> {
    bus: Arc<B>,
    presentation: Arc<Presentation>,
    current: Mutex<Option<Cover>>,
}

impl<B: Bus> SelectionTracker<B> {
    pub fn new(bus: Arc<B>, presentation: Arc<Presentation>) -> Self {
        Self {
            bus,
            presentation,
            current: Mutex::new(None),
        }
    }

    pub fn current(&self) -> Option<Cover> {
        self.current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Makes `name` the current device. An unknown name leaves no device selected.
    pub fn select(&self, registry: &DeviceRegistry, name: &str) -> Option<Cover> {
        let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(previous) = current.take() {
            debug!("Leaving {} ({})", previous.name, previous.position_topic);
            if let Err(e) = self.bus.unsubscribe(&previous.position_topic) {
                warn!("Unsubscribe from {} failed: {}", previous.position_topic, e);
            }
        }
        self.presentation.clear_position();

        *current = registry.lookup(name);
        match current.as_ref() {
            Some(cover) => {
                info!("Selected {} (feedback on {})", cover.name, cover.position_topic);
                self.subscribe_feedback(cover);
            }
            None => info!("No cover named '{}', selection cleared", name),
        }

        current.clone()
    }

    /// Re-issues the position subscription of the current device, e.g. after a reconnect.
    pub fn resume(&self) {
        let current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(cover) = current.as_ref() {
            debug!("Resuming feedback for {}", cover.name);
            self.subscribe_feedback(cover);
        }
    }

    fn subscribe_feedback(&self, cover: &Cover) {
        let handler = feedback_handler(cover, self.presentation.clone());
        if let Err(e) = self
            .bus
            .subscribe(&cover.position_topic, QoS::AtMostOnce, handler)
        {
            warn!("Subscribe to {} failed: {}", cover.position_topic, e);
        }
    }
}

fn feedback_handler(cover: &Cover, presentation: Arc<Presentation>) -> MessageHandler {
    let position_open = cover.position_open;
    Arc::new(move |topic: &str, payload: &[u8]| {
        let text = format_position(payload, position_open);
        debug!("Position on {}: {}", topic, text);
        presentation.set_position(text);
    })
}

/// `"<raw payload> / <fully open value>"`
pub fn format_position(payload: &[u8], position_open: i64) -> String {
    format!("{} / {}", String::from_utf8_lossy(payload), position_open)
}
