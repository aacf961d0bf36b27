//! Motion commands for the current cover.

use crate::discovery::Cover;
use crate::mqtt::bus::Bus;
use rumqttc::QoS;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Relative motion step, encoded as a signed decimal delta.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveCommand {
    OpenFurther,
    Stop,
    CloseFurther,
}

impl MoveCommand {
    pub const STEP: i32 = 10;

    pub fn delta(self) -> i32 {
        match self {
            MoveCommand::OpenFurther => Self::STEP,
            MoveCommand::Stop => 0,
            MoveCommand::CloseFurther => -Self::STEP,
        }
    }

    pub fn payload(self) -> String {
        self.delta().to_string()
    }
}

impl fmt::Display for MoveCommand {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            MoveCommand::OpenFurther => write!(f, "Up"),
            MoveCommand::Stop => write!(f, "Stop"),
            MoveCommand::CloseFurther => write!(f, "Down"),
        }
    }
}

/// Publishes to the command topic of a cover at QoS 0, without retain.
pub struct CommandDispatcher<B: Bus> {
    bus: Arc<B>,
}

impl<B: Bus> CommandDispatcher<B> {
    pub fn new(bus: Arc<B>) -> Self {
        Self { bus }
    }

    /// Returns true if a publish was handed to the bus.
    pub fn move_cover(&self, target: Option<&Cover>, command: MoveCommand) -> bool {
        debug!("Move {} requested", command);
        self.send_raw(target, &command.payload())
    }

    /// Sends an operator-supplied payload unchanged. Without a target nothing is sent.
    pub fn send_raw(&self, target: Option<&Cover>, payload: &str) -> bool {
        let Some(cover) = target else {
            debug!("No cover selected, dropping command '{}'", payload);
            return false;
        };

        match self
            .bus
            .publish(&cover.command_topic, QoS::AtMostOnce, false, payload)
        {
            Ok(()) => {
                info!("Sent '{}' to {}", payload, cover.command_topic);
                true
            }
            Err(e) => {
                warn!("Command '{}' to {} not sent: {}", payload, cover.command_topic, e);
                false
            }
        }
    }
}
