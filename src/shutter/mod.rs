//! # Shutter Core
//!
//! Protocol state behind the setup tool: which covers exist, which one is
//! selected, and how commands reach it.
//!
//! ```text
//! Discovery ──consume──► ShutterController ──upsert──► DeviceRegistry
//!                              │
//!          select(name) ───────┼──► SelectionTracker ──► position feed ──► Presentation
//!          move / send_raw ────┴──► CommandDispatcher ──► command topic
//! ```
//!
//! The controller is generic over [`Bus`] so the whole core runs against an
//! in-memory bus in tests. Front-ends only see the intents on
//! [`ShutterController`] and the read side in [`PresentationView`].

pub mod dispatcher;
pub mod presentation;
pub mod registry;
pub mod tracker;

pub use dispatcher::{CommandDispatcher, MoveCommand};
pub use presentation::{Presentation, PresentationView};
pub use registry::DeviceRegistry;
pub use tracker::SelectionTracker;

use crate::discovery::{Cover, Device, DeviceConsumer, DeviceId, Discovery, DiscoveryError};
use crate::mqtt::bus::Bus;
use crate::mqtt::connection::{ConnectionError, ConnectionState};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

pub struct ShutterController<B: Bus + 'static> {
    bus: Arc<B>,
    registry: DeviceRegistry,
    tracker: SelectionTracker<B>,
    dispatcher: CommandDispatcher<B>,
    presentation: Arc<Presentation>,
    discovery: Discovery,
    discovery_errors: mpsc::UnboundedSender<DiscoveryError>,
}

impl<B: Bus + 'static> ShutterController<B> {
    pub fn new(
        bus: Arc<B>,
        discovery: Discovery,
        discovery_errors: mpsc::UnboundedSender<DiscoveryError>,
    ) -> Arc<Self> {
        let presentation = Arc::new(Presentation::default());
        Arc::new(Self {
            tracker: SelectionTracker::new(bus.clone(), presentation.clone()),
            dispatcher: CommandDispatcher::new(bus.clone()),
            registry: DeviceRegistry::default(),
            bus,
            presentation,
            discovery,
            discovery_errors,
        })
    }

    pub fn view(&self) -> PresentationView {
        self.presentation.view()
    }

    pub fn registry(&self) -> &DeviceRegistry {
        &self.registry
    }

    pub fn select(&self, name: &str) -> Option<Cover> {
        self.tracker.select(&self.registry, name)
    }

    pub fn move_cover(&self, command: MoveCommand) -> bool {
        let current = self.tracker.current();
        self.dispatcher.move_cover(current.as_ref(), command)
    }

    pub fn send_raw(&self, payload: &str) -> bool {
        let current = self.tracker.current();
        self.dispatcher.send_raw(current.as_ref(), payload)
    }

    /// On-connect hook: status, discovery startup and the position feed of the
    /// current device.
    pub fn on_connected(self: &Arc<Self>) {
        self.presentation
            .set_status(ConnectionState::Connected.to_string());

        let consumer: Arc<dyn DeviceConsumer> = self.clone();
        if let Err(e) = self.discovery.start(
            self.bus.as_ref(),
            consumer,
            self.discovery_errors.clone(),
        ) {
            error!("Discovery could not start: {}", e);
        }

        self.tracker.resume();
    }

    pub fn report_connecting(&self) {
        self.presentation
            .set_status(ConnectionState::Connecting.to_string());
    }

    pub fn report_disconnected(&self) {
        self.presentation
            .set_status(ConnectionState::Disconnected.to_string());
    }

    pub fn report_connection_error(&self, error: &ConnectionError) {
        self.presentation
            .set_status(format!("Connection failed: {}", error));
    }

    fn absorb_cover(&self, cover: Cover, id: &DeviceId) {
        let name = cover.name.clone();
        if self.registry.upsert(cover) {
            info!("New cover '{}' ({})", name, id);
            self.presentation.append_device(&name);
        } else {
            debug!("Cover '{}' re-announced ({})", name, id);
        }
        self.presentation.request_refresh();
    }
}

impl<B: Bus + 'static> DeviceConsumer for ShutterController<B> {
    fn consume(&self, device: Device, id: DeviceId) {
        match device {
            Device::Cover(cover) => self.absorb_cover(cover, &id),
            other => debug!("Ignoring {} '{}' ({})", other.kind(), other.name(), id),
        }
    }
}
