mod common;
use common::*;

use pi18_bridge::entity::SelectValue;
use pi18_bridge::error::Error;
use pi18_bridge::pi18::types::{
    charge_stop_options, fault_description, BatteryType, ChargerPriority, DeciVolts, DeviceMode,
    InputVoltageRange, MachineType, OutputMode, OutputSourcePriority, SolarPowerPriority, Topology,
};

/// Wire and display mappings must be total and bidirectional on the valid
/// domain for every enumeration.
macro_rules! round_trip {
    ($name:ident, $type:ty) => {
        #[test]
        fn $name() {
            common_setup();

            for &value in <$type>::ALL {
                assert_eq!(<$type>::from_wire(i64::from(value.wire())).unwrap(), value);
                assert_eq!(<$type>::from_display(&value.to_string()).unwrap(), value);
            }

            let next_code = i64::from(<$type>::ALL.last().unwrap().wire()) + 1;
            assert!(matches!(
                <$type>::from_wire(next_code),
                Err(Error::UnknownEnumerationValue { .. })
            ));
            assert!(matches!(
                <$type>::from_wire(-1),
                Err(Error::UnknownEnumerationValue { .. })
            ));
            assert!(matches!(
                <$type>::from_display("definitely not a value"),
                Err(Error::UnknownEnumerationValue { .. })
            ));
        }
    };
}

round_trip!(device_mode_round_trips, DeviceMode);
round_trip!(battery_type_round_trips, BatteryType);
round_trip!(charger_priority_round_trips, ChargerPriority);
round_trip!(output_source_priority_round_trips, OutputSourcePriority);
round_trip!(input_voltage_range_round_trips, InputVoltageRange);
round_trip!(machine_type_round_trips, MachineType);
round_trip!(topology_round_trips, Topology);
round_trip!(output_mode_round_trips, OutputMode);
round_trip!(solar_power_priority_round_trips, SolarPowerPriority);

#[test]
fn wire_codes_match_protocol() {
    // Spot checks against the protocol document.
    assert_eq!(BatteryType::Agm.wire(), 0);
    assert_eq!(BatteryType::User.wire(), 2);
    assert_eq!(ChargerPriority::OnlySolar.wire(), 2);
    assert_eq!(MachineType::OffGrid.wire(), 0);
    assert_eq!(DeviceMode::from_wire(4).unwrap(), DeviceMode::Fault);
}

#[test]
fn display_strings_match_protocol() {
    assert_eq!(BatteryType::User.to_string(), "User-defined");
    assert_eq!(ChargerPriority::SolarAndUtility.to_string(), "Solar+Utility");
    assert_eq!(
        OutputSourcePriority::SolarBatteryUtility.to_string(),
        "Solar->Battery->Utility"
    );
    assert_eq!(InputVoltageRange::Ups.to_string(), "UPS (170-280V)");
}

#[test]
fn decivolts_formats_one_decimal_fixed_point() {
    assert_eq!(DeciVolts(0).to_string(), "0");
    assert_eq!(DeciVolts(480).to_string(), "48");
    assert_eq!(DeciVolts(485).to_string(), "48.5");
    assert_eq!(DeciVolts(123).to_string(), "12.3");
}

#[test]
fn decivolts_parses_display_values() {
    assert_eq!(DeciVolts::from_display("0").unwrap(), DeciVolts(0));
    assert_eq!(DeciVolts::from_display("48").unwrap(), DeciVolts(480));
    assert_eq!(DeciVolts::from_display("48.5").unwrap(), DeciVolts(485));
    assert_eq!(DeciVolts::from_display(" 12.3 ").unwrap(), DeciVolts(123));
}

#[test]
fn decivolts_truncates_instead_of_rounding() {
    // Boundary case: the conversion to tenths truncates, as the hardware
    // expects. 12.96 is 129, not 130.
    assert_eq!(DeciVolts::from_display("12.96").unwrap(), DeciVolts(129));
}

#[test]
fn decivolts_rejects_garbage() {
    assert!(matches!(
        DeciVolts::from_display("abc"),
        Err(Error::UnknownEnumerationValue { .. })
    ));
    assert!(matches!(
        DeciVolts::from_display("-5"),
        Err(Error::UnknownEnumerationValue { .. })
    ));
    assert!(matches!(
        DeciVolts::from_display(""),
        Err(Error::UnknownEnumerationValue { .. })
    ));
}

#[test]
fn charge_stop_options_vary_by_nominal_voltage() {
    let v12 = charge_stop_options(12).unwrap();
    let v24 = charge_stop_options(24).unwrap();
    let v48 = charge_stop_options(48).unwrap();

    assert_eq!(v12.len(), 12);
    assert_eq!(v24.len(), 12);
    assert_eq!(v48.len(), 12);

    // Zero (disabled) is always legal; the rest are per-variant.
    assert!(v12.contains(&0) && v24.contains(&0) && v48.contains(&0));
    assert!(v12.contains(&145) && !v24.contains(&145));
    assert!(v24.contains(&290) && !v48.contains(&290));
    assert!(v48.contains(&580));

    assert!(matches!(
        charge_stop_options(36),
        Err(Error::UnknownEnumerationValue { .. })
    ));
}

#[test]
fn charge_stop_option_displays_survive_the_parse_round_trip() {
    // Every advertised option must come back unchanged when the consumer
    // echoes its display form on the command topic.
    for nominal in [12, 24, 48] {
        for &tenths in charge_stop_options(nominal).unwrap() {
            let value = DeciVolts(tenths);
            assert_eq!(DeciVolts::from_display(&value.to_string()).unwrap(), value);
        }
    }
}

#[test]
fn fault_descriptions_are_a_closed_table() {
    assert_eq!(fault_description(1).unwrap(), "Fan is locked");
    assert_eq!(fault_description(86).unwrap(), "Parallel output setting different");

    assert!(matches!(fault_description(0), Err(Error::UnknownFaultCode(0))));
    assert!(matches!(
        fault_description(10),
        Err(Error::UnknownFaultCode(10))
    ));
    assert!(matches!(
        fault_description(99),
        Err(Error::UnknownFaultCode(99))
    ));
}
