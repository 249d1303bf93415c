//! Home Assistant MQTT discovery payloads.
//!
//! The field set follows the discovery convention and must stay compatible
//! with it field-for-field; the consumer persists these retained documents
//! and recreates entities from them on every restart.

use crate::entity::{Class, Device, PAYLOAD_OFF, PAYLOAD_ON};

use serde::Serialize;

/// The `device` block shared by every entity of one inverter. The consumer
/// groups entities carrying the same `ids` under one device.
#[derive(Clone, Debug, Serialize)]
pub struct DeviceInfo<'a> {
    pub ids: &'a str,
    pub mf: &'a str,
    pub mdl: &'a str,
    pub name: &'a str,
}

#[derive(Clone, Debug, Serialize)]
pub struct Registration<'a> {
    pub device: DeviceInfo<'a>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_class: Option<&'static str>,
    // Present whenever device_class is: tells the consumer the value is
    // numeric and chartable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_class: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    pub name: String,
    pub state_topic: String,
    pub unique_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit_of_measurement: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command_topic: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload_on: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload_off: Option<&'static str>,
}

impl<'a> Registration<'a> {
    pub fn new(device: &'a Device, entity_name: &str, state_topic: String) -> Self {
        Self {
            device: DeviceInfo {
                ids: &device.serial_number,
                mf: &device.manufacturer,
                mdl: &device.model,
                name: &device.name,
            },
            device_class: None,
            state_class: None,
            icon: None,
            // Internal names use underscores; the consumer-facing one gets
            // spaces.
            name: entity_name.replace('_', " "),
            state_topic,
            unique_id: format!("{}_{}", device.serial_number, entity_name),
            unit_of_measurement: None,
            command_topic: None,
            options: None,
            payload_on: None,
            payload_off: None,
        }
    }

    pub fn classed(mut self, class: Class) -> Self {
        self.device_class = class.device_class();
        if self.device_class.is_some() {
            self.state_class = Some("measurement");
        }
        self.unit_of_measurement = class.unit();
        self
    }

    pub fn icon(mut self, icon: Option<&str>) -> Self {
        self.icon = icon.map(|i| format!("mdi:{}", i));
        self
    }

    pub fn select(mut self, command_topic: String, options: Vec<String>) -> Self {
        self.command_topic = Some(command_topic);
        self.options = Some(options);
        self
    }

    pub fn switch(mut self, command_topic: String) -> Self {
        self.command_topic = Some(command_topic);
        self.payload_on = Some(PAYLOAD_ON);
        self.payload_off = Some(PAYLOAD_OFF);
        self
    }
}
