use crate::mqtt;
use crate::pi18::adapter::names;

/// An inbound control request, decoded from an MQTT command topic. The
/// payload travels unparsed; the entity that owns the setting validates it
/// against its own legal values.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    SetBatteryType(String),
    SetInputVoltageRange(String),
    SetOutputSourcePriority(String),
    SetChargerPriority(String),
    SetSolarPowerPriority(String),
    SetChargeStopVoltage(String),
    SetBacklight(String),
    SetLoadConnection(String),
}

impl Command {
    /// Decode `<prefix>/<component>/<device-id>/<entity>/command` topics.
    /// Anything that isn't a command topic for an entity we control is None.
    pub fn try_from_message(message: &mqtt::Message) -> Option<Command> {
        use Command::*;

        let parts: Vec<&str> = message.topic.split('/').collect();
        let [_prefix, component, _device, entity, "command"] = parts[..] else {
            return None;
        };

        let payload = message.payload.clone();
        match (component, entity) {
            ("select", names::BATTERY_TYPE) => Some(SetBatteryType(payload)),
            ("select", names::INPUT_VOLTAGE_RANGE) => Some(SetInputVoltageRange(payload)),
            ("select", names::OUTPUT_SOURCE_PRIORITY) => Some(SetOutputSourcePriority(payload)),
            ("select", names::CHARGER_PRIORITY) => Some(SetChargerPriority(payload)),
            ("select", names::SOLAR_POWER_PRIORITY) => Some(SetSolarPowerPriority(payload)),
            ("select", names::CHARGE_STOP_VOLTAGE) => Some(SetChargeStopVoltage(payload)),
            ("switch", names::BACKLIGHT) => Some(SetBacklight(payload)),
            ("switch", names::LOAD_CONNECTION) => Some(SetLoadConnection(payload)),
            _ => None,
        }
    }
}
