//! Positional parsing of PI18 response telegrams.
//!
//! Telegrams are comma-delimited runs of fixed-width decimal fields. Field
//! hardware deviates from the written protocol (extra trailing fields,
//! response lengths that disagree with the declared ones), so the contract
//! here is: parse the documented fields, ignore any surplus, and fail hard
//! on a shortfall rather than guessing.

use crate::error::{Error, Result};

use super::types::{
    BatteryType, ChargerPriority, DeciVolts, DeviceMode, InputVoltageRange, MachineType,
    OutputMode, OutputSourcePriority, SolarPowerPriority, Topology, fault_description,
    WARNING_DESCRIPTIONS,
};

use nom::bytes::complete::take_while_m_n;
use nom::character::complete::char;
use nom::combinator::opt;

// Generic field parser {{{

#[derive(Clone, Copy, Debug)]
enum Scale {
    Unit,
    Div10,
}

/// One documented field: how many digits it may carry and the decimal scale
/// applied after the integer parse.
#[derive(Clone, Copy, Debug)]
pub struct FieldSpec {
    max_digits: usize,
    scale: Scale,
}

pub const fn int(max_digits: usize) -> FieldSpec {
    FieldSpec {
        max_digits,
        scale: Scale::Unit,
    }
}

pub const fn div10(max_digits: usize) -> FieldSpec {
    FieldSpec {
        max_digits,
        scale: Scale::Div10,
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum FieldValue {
    Int(i64),
    Tenths(f64),
}

/// An ordered list of decoded fields, indexed the way the telegram documents
/// them.
#[derive(Clone, Debug)]
pub struct Fields(Vec<FieldValue>);

fn signed_field(max_digits: usize) -> impl Fn(&str) -> nom::IResult<&str, i64> {
    move |input| {
        let (input, sign) = opt(char('-'))(input)?;
        let (input, digits) =
            take_while_m_n(1, max_digits, |c: char| c.is_ascii_digit())(input)?;
        match digits.parse::<i64>() {
            Ok(value) => Ok((input, if sign.is_some() { -value } else { value })),
            Err(_) => Err(nom::Err::Failure(nom::error::Error::new(
                input,
                nom::error::ErrorKind::Digit,
            ))),
        }
    }
}

impl Fields {
    /// Parse `spec.len()` comma-separated fields from `raw`. Anything after
    /// the last documented field is ignored; anything missing is
    /// `Error::MalformedTelegram`.
    pub fn parse(raw: &str, spec: &[FieldSpec]) -> Result<Self> {
        let malformed = || Error::MalformedTelegram(raw.to_string());

        let mut rest = raw;
        let mut values = Vec::with_capacity(spec.len());
        for (index, field) in spec.iter().enumerate() {
            if index > 0 {
                let (after, _) = char::<_, nom::error::Error<&str>>(',')(rest)
                    .map_err(|_| malformed())?;
                rest = after;
            }
            let (after, value) = signed_field(field.max_digits)(rest).map_err(|_| malformed())?;
            rest = after;
            values.push(match field.scale {
                Scale::Unit => FieldValue::Int(value),
                Scale::Div10 => FieldValue::Tenths(value as f64 / 10.0),
            });
        }

        Ok(Self(values))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn int(&self, index: usize) -> Result<i64> {
        match self.0.get(index) {
            Some(FieldValue::Int(v)) => Ok(*v),
            _ => Err(Error::MalformedTelegram(format!(
                "no integer field at index {}",
                index
            ))),
        }
    }

    pub fn tenths(&self, index: usize) -> Result<f64> {
        match self.0.get(index) {
            Some(FieldValue::Tenths(v)) => Ok(*v),
            _ => Err(Error::MalformedTelegram(format!(
                "no scaled field at index {}",
                index
            ))),
        }
    }

    pub fn flag(&self, index: usize) -> Result<bool> {
        Ok(self.int(index)? != 0)
    }

    fn decivolts(&self, index: usize) -> Result<DeciVolts> {
        let value = self.int(index)?;
        u16::try_from(value)
            .map(DeciVolts)
            .map_err(|_| Error::MalformedTelegram(format!("voltage field out of range: {}", value)))
    }
}

// }}}

// General status (^P005GS) {{{

/// `AAAA,BBB,CCCC,DDD,EEEE,FFFF,GGG,HHH,III,JJJ,KKK,LLL,MMM,NNN,OOO,PPP,QQQQ,RRRR,SSSS,TTTT,U,V,W,X,Y,Z,a,b`
const GENERAL_STATUS: [FieldSpec; 28] = [
    div10(4), // grid voltage
    div10(3), // grid frequency
    div10(4), // AC output voltage
    div10(3), // AC output frequency
    int(4),   // AC output apparent power
    int(4),   // AC output active power
    int(3),   // output load percent
    div10(3), // battery voltage
    div10(3), // battery voltage from SCC
    div10(3), // battery voltage from SCC2
    int(3),   // battery discharge current
    int(3),   // battery charging current
    int(3),   // battery capacity
    int(3),   // inverter heat sink temperature
    int(3),   // MPPT1 charger temperature
    int(3),   // MPPT2 charger temperature
    int(4),   // PV1 input power
    int(4),   // PV2 input power
    div10(4), // PV1 input voltage
    div10(4), // PV2 input voltage
    int(1),   // setting value configuration state
    int(1),   // MPPT1 charger status
    int(1),   // MPPT2 charger status
    int(1),   // load connection
    int(1),   // battery power direction
    int(1),   // DC/AC power direction
    int(1),   // line power direction
    int(1),   // local parallel ID
];

#[derive(Clone, Debug, PartialEq)]
pub struct GeneralStatus {
    pub grid_voltage: f64,
    pub grid_frequency: f64,
    pub ac_output_voltage: f64,
    pub ac_output_frequency: f64,
    pub ac_output_apparent_power: i64,
    pub ac_output_active_power: i64,
    pub output_load_percent: i64,
    pub battery_voltage: f64,
    pub battery_voltage_scc: f64,
    pub battery_voltage_scc2: f64,
    pub battery_discharge_current: i64,
    pub battery_charging_current: i64,
    pub battery_capacity: i64,
    pub heat_sink_temperature: i64,
    pub mppt1_charger_temperature: i64,
    pub mppt2_charger_temperature: i64,
    pub pv1_input_power: i64,
    pub pv2_input_power: i64,
    pub pv1_input_voltage: f64,
    pub pv2_input_voltage: f64,
    pub configuration_changed: bool,
    pub mppt1_charger_status: i64,
    pub mppt2_charger_status: i64,
    pub load_connected: bool,
    pub battery_power_direction: i64,
    pub dc_ac_power_direction: i64,
    pub line_power_direction: i64,
    pub local_parallel_id: i64,
}

impl GeneralStatus {
    pub fn parse(raw: &str) -> Result<Self> {
        let f = Fields::parse(raw, &GENERAL_STATUS)?;
        Ok(Self {
            grid_voltage: f.tenths(0)?,
            grid_frequency: f.tenths(1)?,
            ac_output_voltage: f.tenths(2)?,
            ac_output_frequency: f.tenths(3)?,
            ac_output_apparent_power: f.int(4)?,
            ac_output_active_power: f.int(5)?,
            output_load_percent: f.int(6)?,
            battery_voltage: f.tenths(7)?,
            battery_voltage_scc: f.tenths(8)?,
            battery_voltage_scc2: f.tenths(9)?,
            battery_discharge_current: f.int(10)?,
            battery_charging_current: f.int(11)?,
            battery_capacity: f.int(12)?,
            heat_sink_temperature: f.int(13)?,
            mppt1_charger_temperature: f.int(14)?,
            mppt2_charger_temperature: f.int(15)?,
            pv1_input_power: f.int(16)?,
            pv2_input_power: f.int(17)?,
            pv1_input_voltage: f.tenths(18)?,
            pv2_input_voltage: f.tenths(19)?,
            configuration_changed: f.flag(20)?,
            mppt1_charger_status: f.int(21)?,
            mppt2_charger_status: f.int(22)?,
            load_connected: f.flag(23)?,
            battery_power_direction: f.int(24)?,
            dc_ac_power_direction: f.int(25)?,
            line_power_direction: f.int(26)?,
            local_parallel_id: f.int(27)?,
        })
    }
}

// }}}

// Rated information (^P007PIRI) {{{

/// `AAAA,BBB,CCCC,DDD,EEE,FFFF,GGGG,HHH,III,JJJ,KKK,LLL,MMM,N,OO,PPP,Q,R,S,T,U,V,W,Z,a`
///
/// Some units append an undocumented extra field; the parser ignores it.
const RATED_INFORMATION: [FieldSpec; 25] = [
    div10(4), // grid rating voltage
    div10(3), // grid rating current
    div10(4), // AC output rating voltage
    div10(3), // AC output rating frequency
    div10(3), // AC output rating current
    int(4),   // AC output rating apparent power
    int(4),   // AC output rating active power
    int(3),   // battery nominal voltage, 0.1V
    int(3),   // battery re-charge voltage, 0.1V
    int(3),   // battery re-discharge voltage, 0.1V
    div10(3), // battery under voltage
    div10(3), // battery bulk voltage
    div10(3), // battery float voltage
    int(1),   // battery type
    int(3),   // max AC charging current
    int(3),   // max charging current
    int(1),   // input voltage range
    int(1),   // output source priority
    int(1),   // charger source priority
    int(1),   // parallel max number
    int(1),   // machine type
    int(1),   // topology
    int(1),   // output mode
    int(1),   // solar power priority
    int(1),   // MPPT strings
];

#[derive(Clone, Debug, PartialEq)]
pub struct RatedInformation {
    pub grid_rating_voltage: f64,
    pub grid_rating_current: f64,
    pub ac_output_rating_voltage: f64,
    pub ac_output_rating_frequency: f64,
    pub ac_output_rating_current: f64,
    pub ac_output_rating_apparent_power: i64,
    pub ac_output_rating_active_power: i64,
    pub battery_nominal_voltage: DeciVolts,
    pub battery_recharge_voltage: DeciVolts,
    pub battery_redischarge_voltage: DeciVolts,
    pub battery_under_voltage: f64,
    pub battery_bulk_voltage: f64,
    pub battery_float_voltage: f64,
    pub battery_type: BatteryType,
    pub max_ac_charging_current: i64,
    pub max_charging_current: i64,
    pub input_voltage_range: InputVoltageRange,
    pub output_source_priority: OutputSourcePriority,
    pub charger_source_priority: ChargerPriority,
    pub parallel_max_number: i64,
    pub machine_type: MachineType,
    pub topology: Topology,
    pub output_mode: OutputMode,
    pub solar_power_priority: SolarPowerPriority,
    pub mppt_strings: i64,
}

impl RatedInformation {
    pub fn parse(raw: &str) -> Result<Self> {
        let f = Fields::parse(raw, &RATED_INFORMATION)?;
        Ok(Self {
            grid_rating_voltage: f.tenths(0)?,
            grid_rating_current: f.tenths(1)?,
            ac_output_rating_voltage: f.tenths(2)?,
            ac_output_rating_frequency: f.tenths(3)?,
            ac_output_rating_current: f.tenths(4)?,
            ac_output_rating_apparent_power: f.int(5)?,
            ac_output_rating_active_power: f.int(6)?,
            battery_nominal_voltage: f.decivolts(7)?,
            battery_recharge_voltage: f.decivolts(8)?,
            battery_redischarge_voltage: f.decivolts(9)?,
            battery_under_voltage: f.tenths(10)?,
            battery_bulk_voltage: f.tenths(11)?,
            battery_float_voltage: f.tenths(12)?,
            battery_type: BatteryType::from_wire(f.int(13)?)?,
            max_ac_charging_current: f.int(14)?,
            max_charging_current: f.int(15)?,
            input_voltage_range: InputVoltageRange::from_wire(f.int(16)?)?,
            output_source_priority: OutputSourcePriority::from_wire(f.int(17)?)?,
            charger_source_priority: ChargerPriority::from_wire(f.int(18)?)?,
            parallel_max_number: f.int(19)?,
            machine_type: MachineType::from_wire(f.int(20)?)?,
            topology: Topology::from_wire(f.int(21)?)?,
            output_mode: OutputMode::from_wire(f.int(22)?)?,
            solar_power_priority: SolarPowerPriority::from_wire(f.int(23)?)?,
            mppt_strings: f.int(24)?,
        })
    }
}

// }}}

// Fault and warning status (^P005FWS) {{{

const FAULT_WARNING: [FieldSpec; 17] = [
    int(2),
    int(1),
    int(1),
    int(1),
    int(1),
    int(1),
    int(1),
    int(1),
    int(1),
    int(1),
    int(1),
    int(1),
    int(1),
    int(1),
    int(1),
    int(1),
    int(1),
];

/// One mutually-exclusive fault code (zero when none) plus sixteen
/// independent warning flags.
#[derive(Clone, Debug, PartialEq)]
pub struct FaultWarningStatus {
    pub fault_code: u16,
    pub flags: [bool; 16],
}

impl FaultWarningStatus {
    pub fn parse(raw: &str) -> Result<Self> {
        let f = Fields::parse(raw, &FAULT_WARNING)?;
        let fault_code = u16::try_from(f.int(0)?)
            .map_err(|_| Error::MalformedTelegram(raw.to_string()))?;
        let mut flags = [false; 16];
        for (index, flag) in flags.iter_mut().enumerate() {
            *flag = f.flag(index + 1)?;
        }
        Ok(Self { fault_code, flags })
    }

    /// Human-readable descriptions of everything currently asserted.
    /// An unrecognized fault code is a hard error, not a blank line.
    pub fn descriptions(&self) -> Result<Vec<&'static str>> {
        let mut result = Vec::new();
        if self.fault_code != 0 {
            result.push(fault_description(self.fault_code)?);
        }
        for (index, set) in self.flags.iter().enumerate() {
            if *set {
                result.push(WARNING_DESCRIPTIONS[index]);
            }
        }
        Ok(result)
    }
}

// }}}

// Flag status (^P007FLAG) {{{

const FLAG_STATUS: [FieldSpec; 9] = [
    int(1),
    int(1),
    int(1),
    int(1),
    int(1),
    int(1),
    int(1),
    int(1),
    int(1),
];

#[derive(Clone, Debug, PartialEq)]
pub struct FlagStatus {
    pub buzzer: bool,
    pub overload_bypass: bool,
    pub lcd_escape_to_default: bool,
    pub overload_restart: bool,
    pub over_temperature_restart: bool,
    pub backlight: bool,
    pub alarm_on_primary_source_interrupt: bool,
    pub fault_code_record: bool,
}

impl FlagStatus {
    pub fn parse(raw: &str) -> Result<Self> {
        let f = Fields::parse(raw, &FLAG_STATUS)?;
        Ok(Self {
            buzzer: f.flag(0)?,
            overload_bypass: f.flag(1)?,
            lcd_escape_to_default: f.flag(2)?,
            overload_restart: f.flag(3)?,
            over_temperature_restart: f.flag(4)?,
            backlight: f.flag(5)?,
            alarm_on_primary_source_interrupt: f.flag(6)?,
            fault_code_record: f.flag(7)?,
        })
    }
}

// }}}

/// `^P006MOD` carries a single two-digit mode token.
pub fn parse_working_mode(raw: &str) -> Result<DeviceMode> {
    let f = Fields::parse(raw, &[int(2)])?;
    DeviceMode::from_wire(f.int(0)?)
}

/// `^P005ET` carries a single eight-digit kWh counter.
pub fn parse_total_energy(raw: &str) -> Result<i64> {
    let f = Fields::parse(raw, &[int(8)])?;
    f.int(0)
}

/// `^P005ID` replies with 22 characters: a two-digit self-declared length
/// followed by up to 20 characters of serial number and padding.
pub fn decode_serial_number(raw: &str) -> Result<String> {
    if raw.len() != 22 || !raw.is_ascii() {
        return Err(Error::MalformedSerialNumber(raw.to_string()));
    }
    let declared: usize = raw[..2]
        .parse()
        .map_err(|_| Error::MalformedSerialNumber(raw.to_string()))?;
    if !(1..=20).contains(&declared) {
        return Err(Error::MalformedSerialNumber(raw.to_string()));
    }
    Ok(raw[2..2 + declared].to_string())
}
