//! Broker connection lifecycle over rumqttc.
//!
//! # State Machine
//!
//! ```text
//! BusConnection<Configured> ──start──► BusConnection<Running> ──stop──► (dropped)
//! ```
//!
//! While running, the event loop task drives the observable [`ConnectionState`]:
//!
//! ```text
//! Disconnected ──► Connecting ──ConnAck──► Connected
//!                     ▲                        │
//!                     └──── poll error ◄───────┘
//! ```
//!
//! Every failed attempt is reported on the connection error channel before the
//! loop sleeps for the reconnect delay and polls again. Reconnecting itself is
//! rumqttc's job: polling the event loop after an error opens a new connection.

use super::bus::{Bus, BusError, MessageHandler};
use super::router::HandlerRouter;
use crate::config::BrokerConfig;
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS};
use statum::{machine, state};
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

const DEFAULT_PORT: u16 = 1883;
const DEFAULT_CLIENT_ID: &str = "shutter-setup";

#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "Disconnected"),
            ConnectionState::Connecting => write!(f, "Connecting..."),
            ConnectionState::Connected => write!(f, "Connected"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConnectionError {
    /// Broker settings could not be turned into connection options
    #[error("Invalid broker settings: {0}")]
    Options(String),

    /// Broker unreachable, authentication refused or protocol failure
    #[error("{0}")]
    Transport(String),
}

/// Hook run on the event loop task after every successful connect.
pub type OnConnect = Arc<dyn Fn() + Send + Sync>;

/// [`Bus`] implementation backed by the client of the currently running connection.
///
/// The bus outlives individual connections: handlers registered while
/// disconnected stay in the router and receive messages as soon as the
/// subscription is issued on the next connect.
pub struct MqttBus {
    client: RwLock<Option<AsyncClient>>,
    router: HandlerRouter,
    state: watch::Sender<ConnectionState>,
}

impl MqttBus {
    pub fn new() -> Arc<Self> {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Arc::new(Self {
            client: RwLock::new(None),
            router: HandlerRouter::default(),
            state,
        })
    }

    pub fn state(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    pub fn connection_state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    fn set_state(&self, state: ConnectionState) {
        let previous = self.state.send_replace(state);
        if previous != state {
            debug!("Connection state {:?} -> {:?}", previous, state);
        }
    }

    fn attach(&self, client: AsyncClient) {
        *self.client.write().unwrap_or_else(PoisonError::into_inner) = Some(client);
    }

    fn detach(&self) -> Option<AsyncClient> {
        self.client
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    fn connected_client(&self) -> Option<AsyncClient> {
        if !self.is_connected() {
            return None;
        }
        self.client
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Bus for MqttBus {
    fn is_connected(&self) -> bool {
        self.connection_state() == ConnectionState::Connected
    }

    fn publish(&self, topic: &str, qos: QoS, retain: bool, payload: &str) -> Result<(), BusError> {
        let client = self.connected_client().ok_or(BusError::NotConnected)?;
        client
            .try_publish(topic, qos, retain, payload.as_bytes().to_vec())
            .map_err(|e| BusError::Request(e.to_string()))
    }

    fn subscribe(&self, filter: &str, qos: QoS, handler: MessageHandler) -> Result<(), BusError> {
        if filter.is_empty() {
            return Err(BusError::InvalidTopic("empty topic filter".to_string()));
        }
        self.router.insert(filter, handler);
        match self.connected_client() {
            Some(client) => client
                .try_subscribe(filter, qos)
                .map_err(|e| BusError::Request(e.to_string())),
            None => {
                debug!("Subscription to {} deferred until connected", filter);
                Ok(())
            }
        }
    }

    fn unsubscribe(&self, filter: &str) -> Result<(), BusError> {
        self.router.remove(filter);
        match self.connected_client() {
            Some(client) => client
                .try_unsubscribe(filter)
                .map_err(|e| BusError::Request(e.to_string())),
            None => Ok(()),
        }
    }
}

#[state]
#[derive(Debug, Clone)]
pub enum ConnectionPhase {
    Configured,
    Running,
}

#[machine]
pub struct BusConnection<S: ConnectionPhase> {
    bus: Arc<MqttBus>,
    options: MqttOptions,
    request_capacity: usize,
    reconnect_delay: Duration,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl BusConnection<Configured> {
    pub fn create(config: &BrokerConfig, bus: Arc<MqttBus>) -> Result<Self, ConnectionError> {
        let options = mqtt_options(config)?;
        let (host, port) = options.broker_address();
        info!("Configured connection to {}:{}", host, port);

        Ok(Self::new(
            bus,
            options,
            config.request_capacity.max(1),
            Duration::from_millis(config.reconnect_delay_ms),
            CancellationToken::new(),
            None, // task
        ))
    }

    /// Spawns the event loop task. Must be called within a tokio runtime.
    pub fn start(
        mut self,
        on_connect: OnConnect,
        errors: mpsc::UnboundedSender<ConnectionError>,
    ) -> BusConnection<Running> {
        let (client, eventloop) = AsyncClient::new(self.options.clone(), self.request_capacity);
        self.bus.attach(client);
        self.bus.set_state(ConnectionState::Connecting);

        let task = tokio::spawn(run_event_loop(
            eventloop,
            self.bus.clone(),
            on_connect,
            errors,
            self.reconnect_delay,
            self.cancel.clone(),
        ));
        self.task = Some(task);

        info!("Connection task started");
        self.transition()
    }
}

impl BusConnection<Running> {
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Stops the event loop and leaves the bus disconnected.
    pub fn stop(self) {
        info!("Stopping connection");
        if let Some(client) = self.bus.detach() {
            if let Err(e) = client.try_disconnect() {
                debug!("Disconnect request not queued: {}", e);
            }
        }
        self.cancel.cancel();
        self.bus.set_state(ConnectionState::Disconnected);
    }
}

async fn run_event_loop(
    mut eventloop: EventLoop,
    bus: Arc<MqttBus>,
    on_connect: OnConnect,
    errors: mpsc::UnboundedSender<ConnectionError>,
    reconnect_delay: Duration,
    cancel: CancellationToken,
) {
    info!("Starting MQTT event loop");

    loop {
        let event = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            event = eventloop.poll() => event,
        };

        match event {
            Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                info!("Connected to broker (session present: {})", ack.session_present);
                bus.set_state(ConnectionState::Connected);
                on_connect();
            }
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                bus.router.dispatch(&publish.topic, &publish.payload);
            }
            Ok(Event::Incoming(Packet::Disconnect)) => {
                warn!("Broker closed the session");
                bus.set_state(ConnectionState::Connecting);
            }
            Ok(event) => debug!("MQTT event: {:?}", event),
            Err(e) => {
                if cancel.is_cancelled() {
                    break;
                }
                error!("Connection attempt failed: {}", e);
                bus.set_state(ConnectionState::Connecting);
                if errors.send(ConnectionError::Transport(e.to_string())).is_err() {
                    warn!("Connection error dropped, nobody is listening");
                }

                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(reconnect_delay) => {}
                }
            }
        }
    }

    info!("MQTT event loop stopped");
}

/// Splits a broker URL of the form `[tcp://|mqtt://]host[:port]`.
///
/// IPv6 hosts must be bracketed, as in `[::1]:1883`.
pub fn parse_broker_url(url: &str) -> Result<(String, u16), ConnectionError> {
    let trimmed = url.trim();
    let address = trimmed
        .strip_prefix("tcp://")
        .or_else(|| trimmed.strip_prefix("mqtt://"))
        .unwrap_or(trimmed);
    let invalid = |reason: &str| ConnectionError::Options(format!("{} in '{}'", reason, url));
    let parse_port = |port: &str| port.parse::<u16>().map_err(|_| invalid("invalid port"));

    let (host, port) = if let Some(bracketed) = address.strip_prefix('[') {
        let (host, rest) = bracketed
            .split_once(']')
            .ok_or_else(|| invalid("unclosed IPv6 bracket"))?;
        let port = match rest {
            "" => DEFAULT_PORT,
            rest => {
                let port = rest
                    .strip_prefix(':')
                    .ok_or_else(|| invalid("unexpected text after IPv6 host"))?;
                parse_port(port)?
            }
        };
        (host, port)
    } else {
        match address.split_once(':') {
            Some((_, rest)) if rest.contains(':') => {
                return Err(invalid("IPv6 host without brackets"));
            }
            Some((host, port)) => (host, parse_port(port)?),
            None => (address, DEFAULT_PORT),
        }
    };

    if host.is_empty() {
        return Err(invalid("missing broker host"));
    }
    Ok((host.to_string(), port))
}

pub fn mqtt_options(config: &BrokerConfig) -> Result<MqttOptions, ConnectionError> {
    let (host, port) = parse_broker_url(&config.url)?;
    let client_id = match config.client_id.trim() {
        "" => DEFAULT_CLIENT_ID,
        id => id,
    };

    let mut options = MqttOptions::new(client_id, host, port);
    options.set_keep_alive(Duration::from_secs(config.keep_alive_secs.max(5)));

    if !config.user.is_empty() {
        options.set_credentials(config.user.clone(), config.password.clone());
    } else if !config.password.is_empty() {
        warn!("Broker password set without a username, connecting anonymously");
    }

    Ok(options)
}
