//! Connect / disconnect intents and connection error routing.
//!
//! Owns the running [`BusConnection`] so that the front-end can start, restart
//! with new settings, or stop the connection without touching rumqttc.

use crate::config::BrokerConfig;
use crate::mqtt::connection::{
    BusConnection, ConnectionError, ConnectionState, MqttBus, OnConnect, Running,
};
use crate::shutter::ShutterController;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::runtime::Handle;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{info, warn};

pub struct Session {
    runtime: Handle,
    bus: Arc<MqttBus>,
    controller: Arc<ShutterController<MqttBus>>,
    connection: Mutex<Option<BusConnection<Running>>>,
    connection_errors: mpsc::UnboundedSender<ConnectionError>,
}

impl Session {
    pub fn new(
        runtime: Handle,
        bus: Arc<MqttBus>,
        controller: Arc<ShutterController<MqttBus>>,
        connection_errors: mpsc::UnboundedSender<ConnectionError>,
    ) -> Self {
        Self {
            runtime,
            bus,
            controller,
            connection: Mutex::new(None),
            connection_errors,
        }
    }

    pub fn controller(&self) -> &Arc<ShutterController<MqttBus>> {
        &self.controller
    }

    pub fn connection_state(&self) -> watch::Receiver<ConnectionState> {
        self.bus.state()
    }

    /// Starts a connection with `config`, replacing a running one.
    ///
    /// Invalid settings are returned directly; failures of individual connect
    /// attempts arrive on the connection error channel while the loop retries.
    pub fn connect(&self, config: &BrokerConfig) -> Result<(), ConnectionError> {
        let mut slot = self
            .connection
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let configured = BusConnection::create(config, self.bus.clone())?;
        if let Some(running) = slot.take() {
            info!("Replacing running connection");
            running.stop();
        }

        self.controller.report_connecting();
        let controller = self.controller.clone();
        let on_connect: OnConnect = Arc::new(move || controller.on_connected());

        let _guard = self.runtime.enter();
        *slot = Some(configured.start(on_connect, self.connection_errors.clone()));
        Ok(())
    }

    pub fn disconnect(&self) {
        let running = self
            .connection
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match running {
            Some(running) => {
                running.stop();
                self.controller.report_disconnected();
            }
            None => warn!("Disconnect requested without a connection"),
        }
    }

    pub fn is_running(&self) -> bool {
        self.connection
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|running| running.is_running())
    }
}

/// Shows every connection error in the status line and forwards it to the
/// front-end's error dialog.
pub fn spawn_connection_monitor(
    mut errors: mpsc::UnboundedReceiver<ConnectionError>,
    controller: Arc<ShutterController<MqttBus>>,
    dialog: mpsc::UnboundedSender<String>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(error) = errors.recv().await {
            controller.report_connection_error(&error);
            if dialog.send(error.to_string()).is_err() {
                warn!("Error dialog closed, dropping: {}", error);
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::Discovery;
    use std::time::Duration;

    fn session() -> (Session, mpsc::UnboundedReceiver<ConnectionError>) {
        let bus = MqttBus::new();
        let (discovery_tx, _discovery_rx) = mpsc::unbounded_channel();
        let controller =
            ShutterController::new(bus.clone(), Discovery::new("homeassistant"), discovery_tx);
        let (errors_tx, errors_rx) = mpsc::unbounded_channel();
        (
            Session::new(Handle::current(), bus, controller, errors_tx),
            errors_rx,
        )
    }

    #[tokio::test]
    async fn invalid_settings_fail_before_anything_starts() {
        let (session, _errors) = session();
        let config = BrokerConfig {
            url: "broker:notaport".to_string(),
            ..BrokerConfig::default()
        };

        assert!(matches!(
            session.connect(&config),
            Err(ConnectionError::Options(_))
        ));
        assert!(!session.is_running());
        assert_eq!(
            *session.connection_state().borrow(),
            ConnectionState::Disconnected
        );
    }

    #[tokio::test]
    async fn failed_attempts_reach_status_and_dialog() {
        let (session, errors) = session();
        let (dialog_tx, mut dialog_rx) = mpsc::unbounded_channel();
        let view = session.controller().view();
        let _monitor = spawn_connection_monitor(errors, session.controller().clone(), dialog_tx);
        let config = BrokerConfig {
            url: "127.0.0.1:1".to_string(),
            reconnect_delay_ms: 50,
            ..BrokerConfig::default()
        };

        session.connect(&config).unwrap();
        assert!(session.is_running());

        let message = tokio::time::timeout(Duration::from_secs(5), dialog_rx.recv())
            .await
            .expect("no error forwarded")
            .unwrap();
        assert!(view.status().starts_with("Connection failed: "));
        assert!(view.status().ends_with(&message));

        session.disconnect();
        assert!(!session.is_running());
        assert_eq!(
            *session.connection_state().borrow(),
            ConnectionState::Disconnected
        );
    }
}
