mod common;
use common::*;

use pi18_bridge::entity::{Class, Publisher, Select, Sensor, Switch};
use pi18_bridge::error::Error;
use pi18_bridge::pi18::types::{charge_stop_options, BatteryType, DeciVolts};
use pi18_bridge::prelude::*;

use serde_json::json;

fn setup() -> (Publisher, broadcast::Receiver<mqtt::ChannelData>) {
    common_setup();
    let (tx, rx) = broadcast::channel(64);
    (Factory::publisher(tx), rx)
}

#[test]
fn sensor_registration_payload() {
    let (publisher, mut rx) = setup();

    let sensor = Sensor::<f64>::new(&publisher, "Grid_voltage", Class::Voltage);
    sensor.register().unwrap();

    let messages = drain(&mut rx);
    assert_eq!(messages.len(), 1);
    let message = &messages[0];

    assert_eq!(
        message.topic,
        "homeassistant/sensor/inverter_96332309100452/Grid_voltage/config"
    );
    assert!(message.retain);

    let payload: serde_json::Value = serde_json::from_str(&message.payload).unwrap();
    assert_eq!(
        payload,
        json!({
            "device": {
                "ids": "96332309100452",
                "mf": "MPP Solar",
                "mdl": "PI18",
                "name": "inverter",
            },
            "device_class": "voltage",
            "state_class": "measurement",
            "name": "Grid voltage",
            "state_topic": "homeassistant/sensor/inverter_96332309100452/Grid_voltage/state",
            "unique_id": "96332309100452_Grid_voltage",
            "unit_of_measurement": "V",
        })
    );
}

#[test]
fn classless_sensor_omits_measurement_fields() {
    let (publisher, mut rx) = setup();

    let sensor = Sensor::<String>::new(&publisher, "Mode", Class::None);
    sensor.register().unwrap();

    let payload: serde_json::Value =
        serde_json::from_str(&drain(&mut rx)[0].payload).unwrap();
    assert_eq!(
        payload,
        json!({
            "device": {
                "ids": "96332309100452",
                "mf": "MPP Solar",
                "mdl": "PI18",
                "name": "inverter",
            },
            "name": "Mode",
            "state_topic": "homeassistant/sensor/inverter_96332309100452/Mode/state",
            "unique_id": "96332309100452_Mode",
        })
    );
}

#[test]
fn percent_sensor_keeps_unit_but_no_class() {
    let (publisher, mut rx) = setup();

    Sensor::<i64>::new(&publisher, "Output_load_percent", Class::Percent)
        .register()
        .unwrap();

    let payload: serde_json::Value =
        serde_json::from_str(&drain(&mut rx)[0].payload).unwrap();
    assert!(payload.get("device_class").is_none());
    assert!(payload.get("state_class").is_none());
    assert_eq!(payload["unit_of_measurement"], "%");
}

#[test]
fn select_registration_advertises_options_and_command_topic() {
    let (publisher, mut rx) = setup();

    let select = Select::new(&publisher, "Battery_type", BatteryType::ALL.to_vec());
    select.register().unwrap();

    let payload: serde_json::Value =
        serde_json::from_str(&drain(&mut rx)[0].payload).unwrap();
    assert_eq!(
        payload["command_topic"],
        "homeassistant/select/inverter_96332309100452/Battery_type/command"
    );
    assert_eq!(
        payload["options"],
        json!(["AGM", "Flooded", "User-defined"])
    );
    assert_eq!(payload["name"], "Battery type");
}

#[test]
fn switch_registration_advertises_boolean_payloads() {
    let (publisher, mut rx) = setup();

    Switch::new(&publisher, "Load_connection").register().unwrap();

    let payload: serde_json::Value =
        serde_json::from_str(&drain(&mut rx)[0].payload).unwrap();
    assert_eq!(payload["payload_on"], "ON");
    assert_eq!(payload["payload_off"], "OFF");
    assert_eq!(
        payload["command_topic"],
        "homeassistant/switch/inverter_96332309100452/Load_connection/command"
    );
}

#[test]
fn update_publishes_retained_state() {
    let (publisher, mut rx) = setup();

    let mut sensor = Sensor::new(&publisher, "Grid_voltage", Class::Voltage);
    sensor.update(230.0);

    let messages = drain(&mut rx);
    assert_eq!(messages.len(), 1);
    assert_eq!(
        messages[0].topic,
        "homeassistant/sensor/inverter_96332309100452/Grid_voltage/state"
    );
    assert_eq!(messages[0].payload, "230");
    assert!(messages[0].retain);
    assert_eq!(sensor.value(), Some(&230.0));
}

#[test]
fn update_with_unchanged_value_still_republishes() {
    // Retained delivery is the contract for late joiners; an unchanged value
    // is not a reason to skip the publish.
    let (publisher, mut rx) = setup();

    let mut sensor = Sensor::new(&publisher, "Grid_voltage", Class::Voltage);
    sensor.update(230.0);
    sensor.update(230.0);

    let messages = drain(&mut rx);
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0], messages[1]);
}

#[test]
fn select_command_accepts_only_constructed_options() {
    let (publisher, mut rx) = setup();

    let select = Select::new(
        &publisher,
        "Battery_type",
        vec![BatteryType::Agm, BatteryType::Flooded],
    );

    assert_eq!(select.command("AGM").unwrap(), BatteryType::Agm);
    assert_eq!(select.command(" Flooded ").unwrap(), BatteryType::Flooded);

    // A real enum value outside this select's constructed subset.
    assert!(matches!(
        select.command("User-defined"),
        Err(Error::UnknownEnumerationValue { .. })
    ));
    // Not a value at all.
    assert!(matches!(
        select.command("Lithium"),
        Err(Error::UnknownEnumerationValue { .. })
    ));

    // Validation is pure: nothing was published.
    assert!(drain(&mut rx).is_empty());
}

#[test]
fn switch_command_accepts_only_advertised_tokens() {
    let (publisher, mut rx) = setup();

    let switch = Switch::new(&publisher, "Backlight");
    assert!(switch.command("ON").unwrap());
    assert!(!switch.command("OFF").unwrap());

    for bogus in ["on", "1", "true", "enable", ""] {
        assert!(matches!(
            switch.command(bogus),
            Err(Error::UnknownEnumerationValue { .. })
        ));
    }

    assert!(drain(&mut rx).is_empty());
}

#[test]
fn switch_update_publishes_advertised_tokens() {
    let (publisher, mut rx) = setup();

    let mut switch = Switch::new(&publisher, "Backlight");
    switch.update(true);
    switch.update(false);

    let messages = drain(&mut rx);
    assert_eq!(messages[0].payload, "ON");
    assert_eq!(messages[1].payload, "OFF");
}

fn charge_stop_select(publisher: &Publisher, nominal: u16) -> Select<DeciVolts> {
    let options = charge_stop_options(nominal).unwrap();
    Select::new(
        publisher,
        "Battery_stop_charging_voltage_with_grid",
        options.iter().map(|&v| DeciVolts(v)).collect(),
    )
}

#[test]
fn charge_stop_variants_enforce_their_own_lists() {
    let (publisher, _rx) = setup();

    let v12 = charge_stop_select(&publisher, 12);
    let v24 = charge_stop_select(&publisher, 24);
    let v48 = charge_stop_select(&publisher, 48);

    // The formatting contract is shared; the legal values are not.
    assert_eq!(v12.command("12.5").unwrap(), DeciVolts(125));
    assert_eq!(v24.command("26.5").unwrap(), DeciVolts(265));
    assert_eq!(v48.command("48").unwrap(), DeciVolts(480));
    assert_eq!(v48.command("0").unwrap(), DeciVolts(0));

    assert!(v12.command("48").is_err());
    assert!(v24.command("12.5").is_err());
    assert!(v48.command("26.5").is_err());
}

#[test]
fn charge_stop_truncation_boundary_is_rejected_not_rounded() {
    let (publisher, _rx) = setup();

    let v12 = charge_stop_select(&publisher, 12);

    // 12.96 truncates to 12.9 (129 tenths), which is not a legal step; had
    // the conversion rounded to 13.0 (130) it would have been accepted.
    assert!(matches!(
        v12.command("12.96"),
        Err(Error::UnknownEnumerationValue { .. })
    ));
    assert_eq!(v12.command("13.0").unwrap(), DeciVolts(130));
}

#[test]
fn select_state_uses_shared_formatting() {
    let (publisher, mut rx) = setup();

    let mut select = charge_stop_select(&publisher, 48);
    select.update(DeciVolts(0));
    select.update(DeciVolts(540));

    let messages = drain(&mut rx);
    assert_eq!(messages[0].payload, "0");
    assert_eq!(messages[1].payload, "54");
}
