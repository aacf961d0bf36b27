//! Publish/subscribe surface consumed by the shutter core.
//!
//! The core never talks to rumqttc directly. It only sees the [`Bus`] trait, which
//! the live connection ([`super::connection::MqttBus`]) implements on top of the
//! non-blocking request queue of `rumqttc::AsyncClient`. Every call returns
//! immediately, so intents can be issued from the UI thread and from message
//! callbacks alike.

use rumqttc::QoS;
use std::sync::Arc;

/// Callback invoked with `(topic, payload)` for every message on a subscribed filter.
pub type MessageHandler = Arc<dyn Fn(&str, &[u8]) + Send + Sync>;

#[derive(Debug, thiserror::Error)]
pub enum BusError {
    #[error("Not connected to a broker")]
    NotConnected,

    /// The client request queue rejected the call (full or closed)
    #[error("Bus request failed: {0}")]
    Request(String),

    #[error("Invalid topic: {0}")]
    InvalidTopic(String),
}

pub trait Bus: Send + Sync {
    fn is_connected(&self) -> bool;

    fn publish(&self, topic: &str, qos: QoS, retain: bool, payload: &str) -> Result<(), BusError>;

    /// Registers `handler` for `filter`, replacing any handler already bound to it.
    fn subscribe(&self, filter: &str, qos: QoS, handler: MessageHandler) -> Result<(), BusError>;

    /// Unsubscribing a filter without an active subscription is not an error.
    fn unsubscribe(&self, filter: &str) -> Result<(), BusError>;
}

#[cfg(test)]
pub mod testing {
    //! In-memory [`Bus`] that records every call in order.

    use super::{Bus, BusError, MessageHandler};
    use rumqttc::mqttbytes::matches as topic_matches;
    use rumqttc::QoS;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum BusCall {
        Publish {
            topic: String,
            qos: QoS,
            retain: bool,
            payload: String,
        },
        Subscribe {
            filter: String,
            qos: QoS,
        },
        Unsubscribe {
            filter: String,
        },
    }

    #[derive(Default)]
    pub struct RecordingBus {
        calls: Mutex<Vec<BusCall>>,
        handlers: Mutex<HashMap<String, MessageHandler>>,
    }

    impl RecordingBus {
        pub fn calls(&self) -> Vec<BusCall> {
            self.calls.lock().unwrap().clone()
        }

        pub fn publishes(&self) -> Vec<BusCall> {
            self.calls()
                .into_iter()
                .filter(|call| matches!(call, BusCall::Publish { .. }))
                .collect()
        }

        pub fn clear(&self) {
            self.calls.lock().unwrap().clear();
        }

        pub fn has_handler(&self, filter: &str) -> bool {
            self.handlers.lock().unwrap().contains_key(filter)
        }

        /// Feeds a message to every handler whose filter matches `topic`.
        pub fn deliver(&self, topic: &str, payload: &[u8]) -> usize {
            let matching: Vec<MessageHandler> = self
                .handlers
                .lock()
                .unwrap()
                .iter()
                .filter(|(filter, _)| topic_matches(topic, filter))
                .map(|(_, handler)| handler.clone())
                .collect();
            for handler in &matching {
                handler(topic, payload);
            }
            matching.len()
        }
    }

    impl Bus for RecordingBus {
        fn is_connected(&self) -> bool {
            true
        }

        fn publish(
            &self,
            topic: &str,
            qos: QoS,
            retain: bool,
            payload: &str,
        ) -> Result<(), BusError> {
            self.calls.lock().unwrap().push(BusCall::Publish {
                topic: topic.to_string(),
                qos,
                retain,
                payload: payload.to_string(),
            });
            Ok(())
        }

        fn subscribe(
            &self,
            filter: &str,
            qos: QoS,
            handler: MessageHandler,
        ) -> Result<(), BusError> {
            self.handlers
                .lock()
                .unwrap()
                .insert(filter.to_string(), handler);
            self.calls.lock().unwrap().push(BusCall::Subscribe {
                filter: filter.to_string(),
                qos,
            });
            Ok(())
        }

        fn unsubscribe(&self, filter: &str) -> Result<(), BusError> {
            self.handlers.lock().unwrap().remove(filter);
            self.calls.lock().unwrap().push(BusCall::Unsubscribe {
                filter: filter.to_string(),
            });
            Ok(())
        }
    }
}
