//! # Device Discovery
//!
//! Listens for device announcements published under the discovery convention
//! and hands every decoded device to a [`DeviceConsumer`].
//!
//! ## Topic Layout
//!
//! ```text
//! <prefix>/<component>/<object_id>/config
//! <prefix>/<component>/<node_id>/<object_id>/config
//! ```
//!
//! The payload is a JSON object describing the device. Abbreviated keys
//! (`cmd_t`, `pos_t`, ...) and the `~` base topic are understood.
//!
//! ## Error Channel
//!
//! Nothing that arrives on a discovery topic can stop the listener. Topics that
//! do not fit the layout, unsupported components and malformed payloads are
//! pushed to an unbounded error channel that the caller drains
//! (see [`spawn_error_drain`]).

pub mod device;
pub mod topic;

pub use device::{Cover, Device, DeviceId, DeviceKind};

use crate::mqtt::bus::{Bus, BusError, MessageHandler};
use rumqttc::QoS;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    #[error("Not a discovery config topic: {0}")]
    Topic(String),

    #[error("Unsupported component '{component}' announced on {topic}")]
    UnsupportedComponent { topic: String, component: String },

    #[error("Malformed announcement on {topic}: {source}")]
    Payload {
        topic: String,
        source: serde_json::Error,
    },

    #[error("Announcement on {topic} lacks '{field}'")]
    MissingField { topic: String, field: &'static str },
}

/// Receives every device the listener decodes, one call per announcement.
///
/// Called from the connection's callback context; implementations must not block.
pub trait DeviceConsumer: Send + Sync {
    fn consume(&self, device: Device, id: DeviceId);
}

#[derive(Debug, Clone)]
pub struct Discovery {
    prefix: String,
}

impl Discovery {
    pub fn new(prefix: impl Into<String>) -> Self {
        let prefix = prefix.into().trim_end_matches('/').to_string();
        Self { prefix }
    }

    /// Subscription filters covering both topic layouts.
    pub fn filters(&self) -> [String; 2] {
        [
            format!("{}/+/+/config", self.prefix),
            format!("{}/+/+/+/config", self.prefix),
        ]
    }

    /// Subscribes to the discovery filters. Calling it again replaces the handlers.
    pub fn start<B: Bus + ?Sized>(
        &self,
        bus: &B,
        consumer: Arc<dyn DeviceConsumer>,
        errors: mpsc::UnboundedSender<DiscoveryError>,
    ) -> Result<(), BusError> {
        let listener = self.clone();
        let handler: MessageHandler = Arc::new(move |topic: &str, payload: &[u8]| {
            match listener.parse_announcement(topic, payload) {
                Ok(Some((device, id))) => {
                    debug!("Discovered {} '{}' ({})", device.kind(), device.name(), id);
                    consumer.consume(device, id);
                }
                Ok(None) => debug!("Ignoring empty announcement on {}", topic),
                Err(e) => {
                    if errors.send(e).is_err() {
                        warn!("Discovery error on {} dropped, error channel closed", topic);
                    }
                }
            }
        });

        for filter in self.filters() {
            bus.subscribe(&filter, QoS::AtMostOnce, handler.clone())?;
        }
        info!("Discovery listening under '{}'", self.prefix);
        Ok(())
    }

    /// Decodes one announcement. An empty payload is a retraction and yields `None`.
    pub fn parse_announcement(
        &self,
        topic: &str,
        payload: &[u8],
    ) -> Result<Option<(Device, DeviceId)>, DiscoveryError> {
        let parsed = topic::parse_topic(&self.prefix, topic)?;
        if payload.iter().all(u8::is_ascii_whitespace) {
            return Ok(None);
        }

        let kind = DeviceKind::from_component(parsed.component).ok_or_else(|| {
            DiscoveryError::UnsupportedComponent {
                topic: topic.to_string(),
                component: parsed.component.to_string(),
            }
        })?;

        let mut value: Value =
            serde_json::from_slice(payload).map_err(|source| DiscoveryError::Payload {
                topic: topic.to_string(),
                source,
            })?;
        topic::expand_base_topic(&mut value);

        let device = Device::from_payload(kind, value, topic, parsed.object_id)?;
        let id = DeviceId {
            node_id: parsed.node_id.map(str::to_string),
            object_id: parsed.object_id.to_string(),
        };
        Ok(Some((device, id)))
    }
}

/// Logs discovery errors for the lifetime of the process.
pub fn spawn_error_drain(mut errors: mpsc::UnboundedReceiver<DiscoveryError>) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(e) = errors.recv().await {
            warn!("Discovery: {}", e);
        }
        debug!("Discovery error channel closed");
    })
}
