//! Announced device variants.
//!
//! Only [`Cover`] carries the fields the shutter core acts on. The other
//! variants are decoded leniently so that a well-formed announcement of any
//! supported kind reaches the consumer, which is free to ignore it.

use super::DiscoveryError;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::fmt;

/// Payload value of a fully open cover when the announcement does not say otherwise.
pub const DEFAULT_POSITION_OPEN: i64 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceKind {
    Cover,
    Switch,
    Sensor,
    DigitalInput,
    Hvac,
    Light,
}

impl DeviceKind {
    pub fn from_component(component: &str) -> Option<Self> {
        match component {
            "cover" => Some(DeviceKind::Cover),
            "switch" => Some(DeviceKind::Switch),
            "sensor" => Some(DeviceKind::Sensor),
            "binary_sensor" => Some(DeviceKind::DigitalInput),
            "climate" => Some(DeviceKind::Hvac),
            "light" => Some(DeviceKind::Light),
            _ => None,
        }
    }

    pub fn component(self) -> &'static str {
        match self {
            DeviceKind::Cover => "cover",
            DeviceKind::Switch => "switch",
            DeviceKind::Sensor => "sensor",
            DeviceKind::DigitalInput => "binary_sensor",
            DeviceKind::Hvac => "climate",
            DeviceKind::Light => "light",
        }
    }
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.component())
    }
}

/// Where an announcement came from within the discovery namespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeviceId {
    pub node_id: Option<String>,
    pub object_id: String,
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.node_id {
            Some(node_id) => write!(f, "{}/{}", node_id, self.object_id),
            None => write!(f, "{}", self.object_id),
        }
    }
}

/// Motorized shutter or blind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cover {
    pub name: String,
    /// Relative motion commands are published here
    pub command_topic: String,
    /// Live position feedback is read from here
    pub position_topic: String,
    /// Position payload of a fully open cover
    pub position_open: i64,
}

#[derive(Deserialize)]
struct CoverPayload {
    #[serde(default)]
    name: String,
    #[serde(default, alias = "cmd_t")]
    command_topic: Option<String>,
    #[serde(default, alias = "pos_t")]
    position_topic: Option<String>,
    #[serde(default, alias = "pos_open")]
    position_open: Option<i64>,
}

impl CoverPayload {
    fn into_cover(self, topic: &str) -> Result<Cover, DiscoveryError> {
        let missing = |field| DiscoveryError::MissingField {
            topic: topic.to_string(),
            field,
        };
        Ok(Cover {
            name: self.name,
            command_topic: self
                .command_topic
                .filter(|t| !t.is_empty())
                .ok_or_else(|| missing("command_topic"))?,
            position_topic: self
                .position_topic
                .filter(|t| !t.is_empty())
                .ok_or_else(|| missing("position_topic"))?,
            position_open: self.position_open.unwrap_or(DEFAULT_POSITION_OPEN),
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Switch {
    pub name: String,
    #[serde(alias = "cmd_t")]
    pub command_topic: Option<String>,
    #[serde(alias = "stat_t")]
    pub state_topic: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Sensor {
    pub name: String,
    #[serde(alias = "stat_t")]
    pub state_topic: Option<String>,
    #[serde(alias = "unit_of_meas")]
    pub unit_of_measurement: Option<String>,
    #[serde(alias = "dev_cla")]
    pub device_class: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DigitalInput {
    pub name: String,
    #[serde(alias = "stat_t")]
    pub state_topic: Option<String>,
    #[serde(alias = "dev_cla")]
    pub device_class: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Hvac {
    pub name: String,
    #[serde(alias = "mode_cmd_t")]
    pub mode_command_topic: Option<String>,
    #[serde(alias = "mode_stat_t")]
    pub mode_state_topic: Option<String>,
    #[serde(alias = "temp_cmd_t")]
    pub temperature_command_topic: Option<String>,
    #[serde(alias = "curr_temp_t")]
    pub current_temperature_topic: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Light {
    pub name: String,
    #[serde(alias = "cmd_t")]
    pub command_topic: Option<String>,
    #[serde(alias = "stat_t")]
    pub state_topic: Option<String>,
    #[serde(alias = "bri_cmd_t")]
    pub brightness_command_topic: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Device {
    Cover(Cover),
    Switch(Switch),
    Sensor(Sensor),
    DigitalInput(DigitalInput),
    Hvac(Hvac),
    Light(Light),
}

impl Device {
    /// Decodes an announcement payload of the given kind.
    ///
    /// A missing or null `name` falls back to the object id of the announcement.
    pub fn from_payload(
        kind: DeviceKind,
        mut payload: Value,
        topic: &str,
        object_id: &str,
    ) -> Result<Self, DiscoveryError> {
        if let Some(object) = payload.as_object_mut() {
            if object.get("name").is_some_and(Value::is_null) {
                object.remove("name");
            }
        }

        let mut device = match kind {
            DeviceKind::Cover => {
                Device::Cover(decode::<CoverPayload>(topic, payload)?.into_cover(topic)?)
            }
            DeviceKind::Switch => Device::Switch(decode(topic, payload)?),
            DeviceKind::Sensor => Device::Sensor(decode(topic, payload)?),
            DeviceKind::DigitalInput => Device::DigitalInput(decode(topic, payload)?),
            DeviceKind::Hvac => Device::Hvac(decode(topic, payload)?),
            DeviceKind::Light => Device::Light(decode(topic, payload)?),
        };

        let name = device.name_mut();
        if name.trim().is_empty() {
            *name = object_id.to_string();
        }
        Ok(device)
    }

    pub fn kind(&self) -> DeviceKind {
        match self {
            Device::Cover(_) => DeviceKind::Cover,
            Device::Switch(_) => DeviceKind::Switch,
            Device::Sensor(_) => DeviceKind::Sensor,
            Device::DigitalInput(_) => DeviceKind::DigitalInput,
            Device::Hvac(_) => DeviceKind::Hvac,
            Device::Light(_) => DeviceKind::Light,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Device::Cover(d) => &d.name,
            Device::Switch(d) => &d.name,
            Device::Sensor(d) => &d.name,
            Device::DigitalInput(d) => &d.name,
            Device::Hvac(d) => &d.name,
            Device::Light(d) => &d.name,
        }
    }

    fn name_mut(&mut self) -> &mut String {
        match self {
            Device::Cover(d) => &mut d.name,
            Device::Switch(d) => &mut d.name,
            Device::Sensor(d) => &mut d.name,
            Device::DigitalInput(d) => &mut d.name,
            Device::Hvac(d) => &mut d.name,
            Device::Light(d) => &mut d.name,
        }
    }
}

fn decode<T: DeserializeOwned>(topic: &str, payload: Value) -> Result<T, DiscoveryError> {
    serde_json::from_value(payload).map_err(|source| DiscoveryError::Payload {
        topic: topic.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const TOPIC: &str = "homeassistant/cover/kitchen/config";

    #[test]
    fn cover_accepts_full_and_abbreviated_keys() {
        let full = Device::from_payload(
            DeviceKind::Cover,
            json!({
                "name": "Kitchen",
                "command_topic": "kitchen/set",
                "position_topic": "kitchen/position",
                "position_open": 255
            }),
            TOPIC,
            "kitchen",
        )
        .unwrap();
        let abbreviated = Device::from_payload(
            DeviceKind::Cover,
            json!({
                "name": "Kitchen",
                "cmd_t": "kitchen/set",
                "pos_t": "kitchen/position",
                "pos_open": 255
            }),
            TOPIC,
            "kitchen",
        )
        .unwrap();

        let expected = Device::Cover(Cover {
            name: "Kitchen".to_string(),
            command_topic: "kitchen/set".to_string(),
            position_topic: "kitchen/position".to_string(),
            position_open: 255,
        });
        assert_eq!(full, expected);
        assert_eq!(abbreviated, expected);
    }

    #[test]
    fn cover_defaults_open_position_and_name() {
        let device = Device::from_payload(
            DeviceKind::Cover,
            json!({ "name": null, "cmd_t": "k/set", "pos_t": "k/pos" }),
            TOPIC,
            "kitchen",
        )
        .unwrap();

        let Device::Cover(cover) = device else {
            panic!("expected a cover");
        };
        assert_eq!(cover.name, "kitchen");
        assert_eq!(cover.position_open, DEFAULT_POSITION_OPEN);
    }

    #[test]
    fn cover_without_position_topic_is_rejected() {
        let result = Device::from_payload(
            DeviceKind::Cover,
            json!({ "name": "Kitchen", "cmd_t": "k/set" }),
            TOPIC,
            "kitchen",
        );
        assert!(matches!(
            result,
            Err(DiscoveryError::MissingField {
                field: "position_topic",
                ..
            })
        ));
    }

    #[test]
    fn wrongly_typed_field_is_a_payload_error() {
        let result = Device::from_payload(
            DeviceKind::Cover,
            json!({ "cmd_t": "k/set", "pos_t": "k/pos", "pos_open": "full" }),
            TOPIC,
            "kitchen",
        );
        assert!(matches!(result, Err(DiscoveryError::Payload { .. })));
    }

    #[test]
    fn other_kinds_decode_leniently() {
        let light = Device::from_payload(
            DeviceKind::Light,
            json!({ "cmd_t": "hall/light/set", "bri_cmd_t": "hall/light/bri", "extra": true }),
            "homeassistant/light/hall/config",
            "hall",
        )
        .unwrap();
        assert_eq!(light.kind(), DeviceKind::Light);
        assert_eq!(light.name(), "hall");

        let sensor = Device::from_payload(
            DeviceKind::Sensor,
            json!({ "name": "Temp", "stat_t": "t/state", "unit_of_meas": "°C" }),
            "homeassistant/sensor/t/config",
            "t",
        )
        .unwrap();
        assert_eq!(
            sensor,
            Device::Sensor(Sensor {
                name: "Temp".to_string(),
                state_topic: Some("t/state".to_string()),
                unit_of_measurement: Some("°C".to_string()),
                device_class: None,
            })
        );
    }

    #[test]
    fn component_names_round_trip_through_kind() {
        for component in ["cover", "switch", "sensor", "binary_sensor", "climate", "light"] {
            let kind = DeviceKind::from_component(component).unwrap();
            assert_eq!(kind.component(), component);
        }
        assert_eq!(DeviceKind::from_component("vacuum"), None);
    }

    #[test]
    fn device_id_display_includes_node_when_present() {
        let with_node = DeviceId {
            node_id: Some("shelly".to_string()),
            object_id: "kitchen".to_string(),
        };
        let without_node = DeviceId {
            node_id: None,
            object_id: "kitchen".to_string(),
        };
        assert_eq!(with_node.to_string(), "shelly/kitchen");
        assert_eq!(without_node.to_string(), "kitchen");
    }
}
