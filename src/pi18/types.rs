use crate::entity::SelectValue;
use crate::error::{Error, Result};
use num_enum::{IntoPrimitive, TryFromPrimitive};

/// Declares one protocol enumeration: the wire code each variant travels as,
/// and the display string shown at the MQTT boundary. Both mappings are
/// total on the listed variants and error on anything else.
macro_rules! wire_enum {
    (
        $(#[$meta:meta])*
        $name:ident ($kind:literal) {
            $( $variant:ident = $code:literal => $display:literal, )+
        }
    ) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, Eq, PartialEq, IntoPrimitive, TryFromPrimitive)]
        #[repr(u8)]
        pub enum $name {
            $( $variant = $code, )+
        }

        impl $name {
            pub const KIND: &'static str = $kind;
            pub const ALL: &'static [$name] = &[ $( $name::$variant, )+ ];

            /// Decode the protocol's integer code.
            pub fn from_wire(value: i64) -> Result<Self> {
                u8::try_from(value)
                    .ok()
                    .and_then(|v| Self::try_from_primitive(v).ok())
                    .ok_or(Error::UnknownEnumerationValue {
                        kind: Self::KIND,
                        value: value.to_string(),
                    })
            }

            /// The integer code sent in set commands.
            pub fn wire(self) -> u8 {
                self.into()
            }

            pub fn as_str(self) -> &'static str {
                match self {
                    $( $name::$variant => $display, )+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl SelectValue for $name {
            /// Inverse of `Display`, for values arriving from the MQTT side.
            fn from_display(s: &str) -> Result<Self> {
                Self::ALL
                    .iter()
                    .copied()
                    .find(|v| v.as_str() == s)
                    .ok_or_else(|| Error::UnknownEnumerationValue {
                        kind: Self::KIND,
                        value: s.to_string(),
                    })
            }
        }
    };
}

wire_enum! {
    /// Working mode reported by `^P006MOD`.
    DeviceMode("device mode") {
        PowerOn = 0 => "Power on",
        Standby = 1 => "Standby",
        Bypass = 2 => "Bypass",
        Battery = 3 => "Battery",
        Fault = 4 => "Fault",
        Hybrid = 5 => "Hybrid",
    }
}

wire_enum! {
    BatteryType("battery type") {
        Agm = 0 => "AGM",
        Flooded = 1 => "Flooded",
        User = 2 => "User-defined",
    }
}

wire_enum! {
    ChargerPriority("charger priority") {
        SolarFirst = 0 => "Solar",
        SolarAndUtility = 1 => "Solar+Utility",
        OnlySolar = 2 => "Solar only",
    }
}

wire_enum! {
    OutputSourcePriority("output source priority") {
        SolarUtilityBattery = 0 => "Solar->Utility->Battery",
        SolarBatteryUtility = 1 => "Solar->Battery->Utility",
    }
}

wire_enum! {
    InputVoltageRange("input voltage range") {
        Appliance = 0 => "Appliance (90-280V)",
        Ups = 1 => "UPS (170-280V)",
    }
}

wire_enum! {
    MachineType("machine type") {
        OffGrid = 0 => "Off-grid",
        GridTie = 1 => "Grid-tie",
    }
}

wire_enum! {
    Topology("topology") {
        Transformerless = 0 => "Transformerless",
        Transformer = 1 => "Transformer",
    }
}

wire_enum! {
    OutputMode("output mode") {
        Single = 0 => "Single",
        Parallel = 1 => "Parallel",
        Phase1Of3 = 2 => "Phase 1 of 3",
        Phase2Of3 = 3 => "Phase 2 of 3",
        Phase3Of3 = 4 => "Phase 3 of 3",
    }
}

wire_enum! {
    SolarPowerPriority("solar power priority") {
        BatteryLoadUtility = 0 => "Battery->Load->Utility",
        LoadBatteryUtility = 1 => "Load->Battery->Utility",
    }
}

// DeciVolts {{{

/// A voltage in tenths of a volt, as the battery-threshold commands carry it.
///
/// Shared formatting for the charge-stop voltage family: one-decimal fixed
/// point with the trailing `.0` dropped, and zero (the "disabled" setting)
/// rendered as plain `"0"`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct DeciVolts(pub u16);

impl DeciVolts {
    pub fn volts(self) -> f64 {
        f64::from(self.0) / 10.0
    }
}

impl std::fmt::Display for DeciVolts {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.0 == 0 {
            return f.write_str("0");
        }
        let whole = self.0 / 10;
        match self.0 % 10 {
            0 => write!(f, "{}", whole),
            rest => write!(f, "{}.{}", whole, rest),
        }
    }
}

impl SelectValue for DeciVolts {
    fn from_display(s: &str) -> Result<Self> {
        let volts: f32 = s
            .trim()
            .parse()
            .map_err(|_| Error::UnknownEnumerationValue {
                kind: "voltage",
                value: s.to_string(),
            })?;
        if !volts.is_finite() || !(0.0..=6553.5).contains(&volts) {
            return Err(Error::UnknownEnumerationValue {
                kind: "voltage",
                value: s.to_string(),
            });
        }
        // The panel truncates rather than rounds when converting to tenths;
        // 12.96 becomes 129, not 130.
        Ok(Self((volts * 10.0) as u16))
    }
}

/// Legal charge-stop voltages depend on the nominal DC bus voltage; each
/// variant is its own closed list. Values are tenths of a volt, zero meaning
/// "disabled".
pub fn charge_stop_options(nominal_volts: u16) -> Result<&'static [u16]> {
    match nominal_volts {
        12 => Ok(&[0, 120, 123, 125, 128, 130, 133, 135, 138, 140, 143, 145]),
        24 => Ok(&[0, 240, 245, 250, 255, 260, 265, 270, 275, 280, 285, 290]),
        48 => Ok(&[0, 480, 490, 500, 510, 520, 530, 540, 550, 560, 570, 580]),
        other => Err(Error::UnknownEnumerationValue {
            kind: "nominal battery voltage",
            value: other.to_string(),
        }),
    }
}

// }}}

// Faults and warnings {{{

/// Fault codes from the `^P005FWS` telegram. The table is closed: an
/// unlisted code is a hard error, because operators must not silently lose
/// fault visibility.
pub fn fault_description(code: u16) -> Result<&'static str> {
    let description = match code {
        1 => "Fan is locked",
        2 => "Over temperature",
        3 => "Battery voltage is too high",
        4 => "Battery voltage is too low",
        5 => "Output short circuited or Over temperature",
        6 => "Output voltage is too high",
        7 => "Over load time out",
        8 => "Bus voltage is too high",
        9 => "Bus soft start failed",
        11 => "Main relay failed",
        51 => "Over current inverter",
        52 => "Bus soft start failed",
        53 => "Inverter soft start failed",
        54 => "Self-test failed",
        55 => "Over DC voltage on output of inverter",
        56 => "Battery connection is open",
        57 => "Current sensor failed",
        58 => "Output voltage is too low",
        60 => "Inverter negative power",
        71 => "Parallel version different",
        72 => "Output circuit failed",
        80 => "CAN communication failed",
        81 => "Parallel host line lost",
        82 => "Parallel synchronized signal lost",
        83 => "Parallel battery voltage detect different",
        84 => "Parallel Line voltage or frequency detect different",
        85 => "Parallel Line input current unbalanced",
        86 => "Parallel output setting different",
        _ => return Err(Error::UnknownFaultCode(code)),
    };
    Ok(description)
}

/// Descriptions for the sixteen independent warning flags following the
/// fault code, in telegram order.
pub const WARNING_DESCRIPTIONS: [&str; 16] = [
    "Line fail",
    "Output circuit short",
    "Inverter over temperature",
    "Fan lock",
    "Battery voltage high",
    "Battery low",
    "Battery under",
    "Over load",
    "Eeprom fail",
    "Power limit",
    "PV1 voltage high",
    "PV2 voltage high",
    "MPPT1 overload warning",
    "MPPT2 overload warning",
    "Battery too low to charge for SCC1",
    "Battery too low to charge for SCC2",
];

// }}}
