//! The entity model: named, independently publishable units of device state.
//!
//! Three capabilities exist — sensors (read only), selects (closed value
//! set, settable) and switches (boolean, settable). Every entity registers
//! itself with the discovery consumer, publishes retained state so late
//! joiners see the last known value immediately, and — for the settable
//! kinds — validates inbound commands against its own legal values before
//! anything reaches the device.

use crate::error::{Error, Result as ProtocolResult};
use crate::home_assistant as ha;
use crate::mqtt;
use crate::prelude::*;

/// Identity of the physical device, established once at startup and shared
/// read-only by every entity's registration payload and topic.
#[derive(Clone, Debug)]
pub struct Device {
    pub serial_number: String,
    pub manufacturer: String,
    pub model: String,
    pub name: String,
}

impl Device {
    /// Topic segment identifying this device, e.g. `inverter_96332309100452`.
    pub fn id(&self) -> String {
        format!("{}_{}", self.name, self.serial_number)
    }
}

// Class {{{

/// Measurement classification, mapped onto the discovery payload's
/// `device_class`/`unit_of_measurement` pair. `Percent` is deliberately
/// classless (plain `%` unit); `None` is a text value.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Class {
    Voltage,
    Current,
    Frequency,
    Power,
    ApparentPower,
    Energy,
    Percent,
    Temperature,
    Battery,
    None,
}

impl Class {
    pub fn device_class(self) -> Option<&'static str> {
        match self {
            Class::Voltage => Some("voltage"),
            Class::Current => Some("current"),
            Class::Frequency => Some("frequency"),
            Class::Power => Some("power"),
            Class::ApparentPower => Some("apparent_power"),
            Class::Energy => Some("energy"),
            Class::Temperature => Some("temperature"),
            Class::Battery => Some("battery"),
            Class::Percent | Class::None => None,
        }
    }

    pub fn unit(self) -> Option<&'static str> {
        match self {
            Class::Voltage => Some("V"),
            Class::Current => Some("A"),
            Class::Frequency => Some("Hz"),
            Class::Power => Some("W"),
            Class::ApparentPower => Some("VA"),
            Class::Energy => Some("kWh"),
            Class::Percent | Class::Battery => Some("%"),
            Class::Temperature => Some("°C"),
            Class::None => None,
        }
    }
}

// }}}

// Publisher {{{

/// Shared handle entities publish through: the MQTT channel plus the
/// discovery prefix and device identity every topic derives from.
#[derive(Clone)]
pub struct Publisher {
    device: Arc<Device>,
    prefix: String,
    to_mqtt: mqtt::Sender,
}

impl Publisher {
    pub fn new(device: Arc<Device>, prefix: &str, to_mqtt: mqtt::Sender) -> Self {
        Self {
            device,
            prefix: prefix.to_string(),
            to_mqtt,
        }
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    fn topic_root(&self, component: &str, name: &str) -> String {
        format!("{}/{}/{}/{}", self.prefix, component, self.device.id(), name)
    }

    fn send(&self, message: mqtt::Message) {
        if self
            .to_mqtt
            .send(mqtt::ChannelData::Message(message))
            .is_err()
        {
            debug!("no mqtt receiver, dropping publish");
        }
    }

    fn publish_config(&self, root: &str, registration: &ha::Registration) -> Result<()> {
        self.send(mqtt::Message {
            topic: format!("{}/config", root),
            payload: serde_json::to_string(registration)?,
            retain: true,
            qos: mqtt::QoS::AtLeastOnce,
        });
        Ok(())
    }

    // Always retained: the consumer may (re)create an entity well after the
    // value was published, and must still see it straight away.
    fn publish_state(&self, root: &str, payload: String) {
        self.send(mqtt::Message {
            topic: format!("{}/state", root),
            payload,
            retain: true,
            qos: mqtt::QoS::AtMostOnce,
        });
    }
}

// }}}

// Sensor {{{

/// A read-only measurement or text value.
pub struct Sensor<V> {
    name: &'static str,
    class: Class,
    icon: Option<&'static str>,
    value: Option<V>,
    publisher: Publisher,
}

impl<V: std::fmt::Display> Sensor<V> {
    pub fn new(publisher: &Publisher, name: &'static str, class: Class) -> Self {
        Self {
            name,
            class,
            icon: None,
            value: None,
            publisher: publisher.clone(),
        }
    }

    pub fn with_icon(mut self, icon: &'static str) -> Self {
        self.icon = Some(icon);
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn value(&self) -> Option<&V> {
        self.value.as_ref()
    }

    fn topic_root(&self) -> String {
        self.publisher.topic_root("sensor", self.name)
    }

    pub fn state_topic(&self) -> String {
        format!("{}/state", self.topic_root())
    }

    pub fn register(&self) -> Result<()> {
        let registration = ha::Registration::new(self.publisher.device(), self.name, self.state_topic())
            .classed(self.class)
            .icon(self.icon);
        self.publisher.publish_config(&self.topic_root(), &registration)
    }

    pub fn update(&mut self, value: V) {
        let state = value.to_string();
        info!("{}: {}", self.name, state);
        self.value = Some(value);
        self.publisher.publish_state(&self.topic_root(), state);
    }
}

// }}}

// Select {{{

/// A value usable in a `Select`: displayable, and parseable back from the
/// display form the consumer sends on the command topic.
pub trait SelectValue: std::fmt::Display + Copy + PartialEq {
    fn from_display(s: &str) -> ProtocolResult<Self>;
}

/// A settable value restricted to a closed set of legal options.
pub struct Select<V> {
    name: &'static str,
    options: Vec<V>,
    icon: Option<&'static str>,
    value: Option<V>,
    publisher: Publisher,
}

impl<V: SelectValue> Select<V> {
    pub fn new(publisher: &Publisher, name: &'static str, options: Vec<V>) -> Self {
        Self {
            name,
            options,
            icon: None,
            value: None,
            publisher: publisher.clone(),
        }
    }

    pub fn with_icon(mut self, icon: &'static str) -> Self {
        self.icon = Some(icon);
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn value(&self) -> Option<&V> {
        self.value.as_ref()
    }

    fn topic_root(&self) -> String {
        self.publisher.topic_root("select", self.name)
    }

    pub fn state_topic(&self) -> String {
        format!("{}/state", self.topic_root())
    }

    pub fn command_topic(&self) -> String {
        format!("{}/command", self.topic_root())
    }

    pub fn register(&self) -> Result<()> {
        let options = self.options.iter().map(|o| o.to_string()).collect();
        let registration =
            ha::Registration::new(self.publisher.device(), self.name, self.state_topic())
                .icon(self.icon)
                .select(self.command_topic(), options);
        self.publisher.publish_config(&self.topic_root(), &registration)
    }

    pub fn update(&mut self, value: V) {
        let state = value.to_string();
        info!("{}: {}", self.name, state);
        self.value = Some(value);
        self.publisher.publish_state(&self.topic_root(), state);
    }

    /// Validate an inbound payload against the closed option set. Pure: no
    /// device write, no state change. The caller applies the returned value
    /// to the device and republishes only if that succeeds.
    pub fn command(&self, payload: &str) -> ProtocolResult<V> {
        let value = V::from_display(payload.trim())?;
        if self.options.contains(&value) {
            Ok(value)
        } else {
            Err(Error::UnknownEnumerationValue {
                kind: self.name,
                value: payload.to_string(),
            })
        }
    }
}

// }}}

// Switch {{{

pub const PAYLOAD_ON: &str = "ON";
pub const PAYLOAD_OFF: &str = "OFF";

/// A settable boolean.
pub struct Switch {
    name: &'static str,
    icon: Option<&'static str>,
    value: Option<bool>,
    publisher: Publisher,
}

impl Switch {
    pub fn new(publisher: &Publisher, name: &'static str) -> Self {
        Self {
            name,
            icon: None,
            value: None,
            publisher: publisher.clone(),
        }
    }

    pub fn with_icon(mut self, icon: &'static str) -> Self {
        self.icon = Some(icon);
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn value(&self) -> Option<bool> {
        self.value
    }

    fn topic_root(&self) -> String {
        self.publisher.topic_root("switch", self.name)
    }

    pub fn state_topic(&self) -> String {
        format!("{}/state", self.topic_root())
    }

    pub fn command_topic(&self) -> String {
        format!("{}/command", self.topic_root())
    }

    pub fn register(&self) -> Result<()> {
        let registration =
            ha::Registration::new(self.publisher.device(), self.name, self.state_topic())
                .icon(self.icon)
                .switch(self.command_topic());
        self.publisher.publish_config(&self.topic_root(), &registration)
    }

    pub fn update(&mut self, on: bool) {
        let state = if on { PAYLOAD_ON } else { PAYLOAD_OFF };
        info!("{}: {}", self.name, state);
        self.value = Some(on);
        self.publisher.publish_state(&self.topic_root(), state.to_string());
    }

    /// Validate an inbound payload as one of the advertised boolean tokens.
    pub fn command(&self, payload: &str) -> ProtocolResult<bool> {
        match payload.trim() {
            PAYLOAD_ON => Ok(true),
            PAYLOAD_OFF => Ok(false),
            other => Err(Error::UnknownEnumerationValue {
                kind: self.name,
                value: other.to_string(),
            }),
        }
    }
}

// }}}
