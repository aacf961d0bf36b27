//! # MQTT Transport
//!
//! Everything between the shutter core and the broker.
//!
//! ```text
//! mqtt/
//! ├── bus.rs         - Bus trait the core is written against, topic filter matching
//! ├── router.rs      - filter -> handler table fed by incoming publishes
//! └── connection.rs  - connection state machine, event loop task, MqttBus
//! ```
//!
//! ## Callback Model
//!
//! rumqttc delivers all traffic through one event loop. The connection task
//! polls it and turns packets into callbacks: `ConnAck` runs the on-connect
//! hook, `Publish` runs the handlers whose filters match. The core therefore
//! sees the same multi-producer, callback-driven model whether it runs against
//! a broker or against the in-memory bus used in tests.
//!
//! ## Delivery
//!
//! All traffic uses QoS 0 (at most once). Commands are not confirmed and
//! nothing is queued while disconnected: publishing without a connection is
//! an error the caller logs and drops.

pub mod bus;
pub mod connection;
pub mod router;
