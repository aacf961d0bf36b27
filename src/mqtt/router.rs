//! Topic filter to handler table for the live connection.

use super::bus::MessageHandler;
use rumqttc::mqttbytes::matches;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::debug;

#[derive(Default, Clone)]
pub struct HandlerRouter {
    routes: Arc<RwLock<HashMap<String, MessageHandler>>>,
}

impl HandlerRouter {
    /// Binds `handler` to `filter`. Returns true if a previous handler was replaced.
    pub fn insert(&self, filter: &str, handler: MessageHandler) -> bool {
        self.routes
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(filter.to_string(), handler)
            .is_some()
    }

    pub fn remove(&self, filter: &str) -> bool {
        self.routes
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(filter)
            .is_some()
    }

    #[cfg(test)]
    pub fn filters(&self) -> Vec<String> {
        self.routes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    /// Calls every handler whose filter matches `topic` and returns how many ran.
    ///
    /// Handlers run after the table lock is released, so a handler may itself
    /// subscribe or unsubscribe.
    pub fn dispatch(&self, topic: &str, payload: &[u8]) -> usize {
        let matching: Vec<MessageHandler> = self
            .routes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|(filter, _)| matches(topic, filter))
            .map(|(_, handler)| handler.clone())
            .collect();

        if matching.is_empty() {
            debug!("No handler for message on {}", topic);
        }
        for handler in &matching {
            handler(topic, payload);
        }
        matching.len()
    }
}
