//! Orchestration of the PI18 command set: sequences the transaction engine,
//! the telegram parser and the enumeration codecs into named operations, and
//! owns one entity per exposed reading or setting.

use crate::command::Command;
use crate::entity::{Class, Device, Publisher, Select, Sensor, Switch};
use crate::mqtt;
use crate::prelude::*;

use super::telegram::{self, FaultWarningStatus, FlagStatus, GeneralStatus, RatedInformation};
use super::transaction::{Transaction, Transport};
use super::types::{
    charge_stop_options, BatteryType, ChargerPriority, DeciVolts, DeviceMode, InputVoltageRange,
    MachineType, OutputSourcePriority, SolarPowerPriority,
};

/// Names of the settable entities, shared with the command-topic decoder.
pub mod names {
    pub const BATTERY_TYPE: &str = "Battery_type";
    pub const INPUT_VOLTAGE_RANGE: &str = "Ac_input_voltage_range";
    pub const OUTPUT_SOURCE_PRIORITY: &str = "Output_source_priority";
    pub const CHARGER_PRIORITY: &str = "Charger_source_priority";
    pub const SOLAR_POWER_PRIORITY: &str = "Solar_power_priority";
    pub const CHARGE_STOP_VOLTAGE: &str = "Battery_stop_charging_voltage_with_grid";
    pub const BACKLIGHT: &str = "Backlight";
    pub const LOAD_CONNECTION: &str = "Load_connection";
}

pub struct Adapter<T> {
    transaction: Transaction<T>,
    publisher: Publisher,

    // Ratings and settings, fed by ^P007PIRI.
    battery_nominal_voltage: Sensor<f64>,
    battery_stop_discharging_voltage: Sensor<f64>,
    battery_under_voltage: Sensor<f64>,
    battery_bulk_voltage: Sensor<f64>,
    battery_float_voltage: Sensor<f64>,
    machine_type: Sensor<MachineType>,
    battery_type: Select<BatteryType>,
    input_voltage_range: Select<InputVoltageRange>,
    output_source_priority: Select<OutputSourcePriority>,
    charger_priority: Select<ChargerPriority>,
    solar_power_priority: Select<SolarPowerPriority>,
    // Created on the first ratings read, once the nominal bus voltage is
    // known; its legal values depend on it.
    charge_stop_voltage: Option<Select<DeciVolts>>,
    // The set command writes recharge and re-discharge voltage together, so
    // the last seen recharge value is kept for pairing.
    last_recharge_voltage: Option<DeciVolts>,

    // Instant metrics, fed by ^P005GS and friends.
    grid_voltage: Sensor<f64>,
    grid_frequency: Sensor<f64>,
    output_voltage: Sensor<f64>,
    output_frequency: Sensor<f64>,
    output_apparent_power: Sensor<i64>,
    output_active_power: Sensor<i64>,
    output_load_percent: Sensor<i64>,
    battery_voltage: Sensor<f64>,
    battery_voltage_scc: Sensor<f64>,
    battery_voltage_scc2: Sensor<f64>,
    battery_discharge_current: Sensor<i64>,
    battery_charge_current: Sensor<i64>,
    battery_capacity: Sensor<i64>,
    heatsink_temperature: Sensor<i64>,
    mppt1_charger_temperature: Sensor<i64>,
    mppt2_charger_temperature: Sensor<i64>,
    pv_watts: Sensor<i64>,
    pv2_watts: Sensor<i64>,
    pv_voltage: Sensor<f64>,
    pv2_voltage: Sensor<f64>,
    total_energy: Sensor<i64>,
    mode: Sensor<DeviceMode>,
    warnings: Sensor<String>,

    backlight: Switch,
    load_connection: Switch,
}

impl<T: Transport> Adapter<T> {
    /// Connect to the device: verify the protocol family, read the serial
    /// number, register every fixed entity, then run the first full refresh.
    pub async fn connect(
        mut transaction: Transaction<T>,
        config: &Config,
        to_mqtt: mqtt::Sender,
    ) -> Result<Self> {
        transaction.execute("^P005PI", "^D00518").await?;

        let raw = transaction.execute("^P005ID", "^D025").await?;
        let serial_number = telegram::decode_serial_number(&raw)?;

        let device = Arc::new(Device {
            serial_number,
            manufacturer: config.device().manufacturer().to_string(),
            model: config.device().model().to_string(),
            name: config.device().name().to_string(),
        });
        info!(
            "connected to {} {}, serial number {}",
            device.manufacturer, device.model, device.serial_number
        );

        let p = Publisher::new(device, config.mqtt().discovery_prefix(), to_mqtt);

        let mut adapter = Self {
            battery_nominal_voltage: Sensor::new(&p, "Battery_nominal_voltage", Class::Voltage),
            battery_stop_discharging_voltage: Sensor::new(
                &p,
                "Battery_stop_discharging_voltage_with_grid",
                Class::Voltage,
            ),
            battery_under_voltage: Sensor::new(&p, "Battery_under_voltage", Class::Voltage),
            battery_bulk_voltage: Sensor::new(&p, "Battery_bulk_voltage", Class::Voltage),
            battery_float_voltage: Sensor::new(&p, "Battery_float_voltage", Class::Voltage),
            machine_type: Sensor::new(&p, "Machine_type", Class::None),
            battery_type: Select::new(&p, names::BATTERY_TYPE, BatteryType::ALL.to_vec()),
            input_voltage_range: Select::new(
                &p,
                names::INPUT_VOLTAGE_RANGE,
                InputVoltageRange::ALL.to_vec(),
            ),
            output_source_priority: Select::new(
                &p,
                names::OUTPUT_SOURCE_PRIORITY,
                OutputSourcePriority::ALL.to_vec(),
            ),
            charger_priority: Select::new(
                &p,
                names::CHARGER_PRIORITY,
                ChargerPriority::ALL.to_vec(),
            ),
            solar_power_priority: Select::new(
                &p,
                names::SOLAR_POWER_PRIORITY,
                SolarPowerPriority::ALL.to_vec(),
            ),
            charge_stop_voltage: None,
            last_recharge_voltage: None,

            grid_voltage: Sensor::new(&p, "Grid_voltage", Class::Voltage),
            grid_frequency: Sensor::new(&p, "Grid_frequency", Class::Frequency),
            output_voltage: Sensor::new(&p, "Output_voltage", Class::Voltage),
            output_frequency: Sensor::new(&p, "Output_frequency", Class::Frequency),
            output_apparent_power: Sensor::new(&p, "Output_apparent_power", Class::ApparentPower),
            output_active_power: Sensor::new(&p, "Output_active_power", Class::Power),
            output_load_percent: Sensor::new(&p, "Output_load_percent", Class::Percent),
            battery_voltage: Sensor::new(&p, "Battery_voltage", Class::Voltage),
            battery_voltage_scc: Sensor::new(&p, "Battery_voltage_from_SCC", Class::Voltage),
            battery_voltage_scc2: Sensor::new(&p, "Battery_voltage_from_SCC2", Class::Voltage),
            battery_discharge_current: Sensor::new(
                &p,
                "Battery_discharge_current",
                Class::Current,
            ),
            battery_charge_current: Sensor::new(&p, "Battery_charge_current", Class::Current),
            battery_capacity: Sensor::new(&p, "Battery_capacity", Class::Battery),
            heatsink_temperature: Sensor::new(&p, "Heatsink_temperature", Class::Temperature),
            mppt1_charger_temperature: Sensor::new(
                &p,
                "Mppt1_charger_temperature",
                Class::Temperature,
            ),
            mppt2_charger_temperature: Sensor::new(
                &p,
                "Mppt2_charger_temperature",
                Class::Temperature,
            ),
            pv_watts: Sensor::new(&p, "Pv_watts", Class::Power).with_icon("solar-power"),
            pv2_watts: Sensor::new(&p, "Pv2_watts", Class::Power).with_icon("solar-power"),
            pv_voltage: Sensor::new(&p, "Pv_voltage", Class::Voltage),
            pv2_voltage: Sensor::new(&p, "Pv2_voltage", Class::Voltage),
            total_energy: Sensor::new(&p, "Pv_total_generated_energy", Class::Energy)
                .with_icon("solar-power"),
            mode: Sensor::new(&p, "Mode", Class::None),
            warnings: Sensor::new(&p, "Warnings", Class::None).with_icon("alert"),

            backlight: Switch::new(&p, names::BACKLIGHT),
            load_connection: Switch::new(&p, names::LOAD_CONNECTION),

            publisher: p,
            transaction,
        };

        adapter.register_entities()?;
        adapter.refresh().await?;

        Ok(adapter)
    }

    /// Registration is idempotent; the consumer keeps the retained payloads,
    /// so re-issuing them on every start is the expected lifecycle.
    fn register_entities(&self) -> Result<()> {
        self.battery_nominal_voltage.register()?;
        self.battery_stop_discharging_voltage.register()?;
        self.battery_under_voltage.register()?;
        self.battery_bulk_voltage.register()?;
        self.battery_float_voltage.register()?;
        self.machine_type.register()?;
        self.battery_type.register()?;
        self.input_voltage_range.register()?;
        self.output_source_priority.register()?;
        self.charger_priority.register()?;
        self.solar_power_priority.register()?;

        self.grid_voltage.register()?;
        self.grid_frequency.register()?;
        self.output_voltage.register()?;
        self.output_frequency.register()?;
        self.output_apparent_power.register()?;
        self.output_active_power.register()?;
        self.output_load_percent.register()?;
        self.battery_voltage.register()?;
        self.battery_voltage_scc.register()?;
        self.battery_voltage_scc2.register()?;
        self.battery_discharge_current.register()?;
        self.battery_charge_current.register()?;
        self.battery_capacity.register()?;
        self.heatsink_temperature.register()?;
        self.mppt1_charger_temperature.register()?;
        self.mppt2_charger_temperature.register()?;
        self.pv_watts.register()?;
        self.pv2_watts.register()?;
        self.pv_voltage.register()?;
        self.pv2_voltage.register()?;
        self.total_energy.register()?;
        self.mode.register()?;
        self.warnings.register()?;

        self.backlight.register()?;
        self.load_connection.register()?;

        Ok(())
    }

    /// One full poll: ratings/settings, then instant status.
    pub async fn refresh(&mut self) -> Result<()> {
        self.refresh_ratings().await?;
        self.refresh_status().await?;
        Ok(())
    }

    pub async fn refresh_ratings(&mut self) -> Result<()> {
        // The declared reply length is 85, but real units answer 89, so only
        // "^D0" is checked and the remaining length digits are skipped here.
        let raw = self.transaction.execute("^P007PIRI", "^D0").await?;
        let payload = raw
            .get(2..)
            .ok_or_else(|| crate::error::Error::MalformedTelegram(raw.clone()))?;
        let rated = RatedInformation::parse(payload)?;

        self.battery_nominal_voltage
            .update(rated.battery_nominal_voltage.volts());
        self.battery_stop_discharging_voltage
            .update(rated.battery_recharge_voltage.volts());
        self.battery_under_voltage
            .update(rated.battery_under_voltage);
        self.battery_bulk_voltage.update(rated.battery_bulk_voltage);
        self.battery_float_voltage
            .update(rated.battery_float_voltage);
        self.battery_type.update(rated.battery_type);
        self.input_voltage_range.update(rated.input_voltage_range);
        self.output_source_priority
            .update(rated.output_source_priority);
        self.charger_priority.update(rated.charger_source_priority);
        self.machine_type.update(rated.machine_type);
        self.solar_power_priority.update(rated.solar_power_priority);

        if self.charge_stop_voltage.is_none() {
            let options = charge_stop_options(rated.battery_nominal_voltage.0 / 10)?;
            let select = Select::new(
                &self.publisher,
                names::CHARGE_STOP_VOLTAGE,
                options.iter().map(|&v| DeciVolts(v)).collect(),
            );
            select.register()?;
            self.charge_stop_voltage = Some(select);
        }
        if let Some(select) = self.charge_stop_voltage.as_mut() {
            select.update(rated.battery_redischarge_voltage);
        }
        self.last_recharge_voltage = Some(rated.battery_recharge_voltage);

        Ok(())
    }

    pub async fn refresh_status(&mut self) -> Result<()> {
        let raw = self.transaction.execute("^P005GS", "^D106").await?;
        let status = GeneralStatus::parse(&raw)?;

        self.grid_voltage.update(status.grid_voltage);
        self.grid_frequency.update(status.grid_frequency);
        self.output_voltage.update(status.ac_output_voltage);
        self.output_frequency.update(status.ac_output_frequency);
        self.output_apparent_power
            .update(status.ac_output_apparent_power);
        self.output_active_power
            .update(status.ac_output_active_power);
        self.output_load_percent.update(status.output_load_percent);
        self.battery_voltage.update(status.battery_voltage);
        self.battery_voltage_scc.update(status.battery_voltage_scc);
        self.battery_voltage_scc2
            .update(status.battery_voltage_scc2);
        self.battery_discharge_current
            .update(status.battery_discharge_current);
        self.battery_charge_current
            .update(status.battery_charging_current);
        self.battery_capacity.update(status.battery_capacity);
        self.heatsink_temperature
            .update(status.heat_sink_temperature);
        self.mppt1_charger_temperature
            .update(status.mppt1_charger_temperature);
        self.mppt2_charger_temperature
            .update(status.mppt2_charger_temperature);
        self.pv_watts.update(status.pv1_input_power);
        self.pv2_watts.update(status.pv2_input_power);
        self.pv_voltage.update(status.pv1_input_voltage);
        self.pv2_voltage.update(status.pv2_input_voltage);
        self.load_connection.update(status.load_connected);

        self.refresh_mode().await?;
        self.refresh_flags().await?;
        self.refresh_warnings().await?;

        Ok(())
    }

    async fn refresh_mode(&mut self) -> Result<()> {
        let raw = self.transaction.execute("^P006MOD", "^D005").await?;
        self.mode.update(telegram::parse_working_mode(&raw)?);
        Ok(())
    }

    async fn refresh_flags(&mut self) -> Result<()> {
        let raw = self.transaction.execute("^P007FLAG", "^D020").await?;
        let flags = FlagStatus::parse(&raw)?;
        self.backlight.update(flags.backlight);
        Ok(())
    }

    async fn refresh_warnings(&mut self) -> Result<()> {
        // Same length disagreement as PIRI; check "^D0" only.
        let raw = self.transaction.execute("^P005FWS", "^D0").await?;
        let payload = raw
            .get(2..)
            .ok_or_else(|| crate::error::Error::MalformedTelegram(raw.clone()))?;
        let status = FaultWarningStatus::parse(payload)?;
        self.warnings.update(status.descriptions()?.join("\n"));
        Ok(())
    }

    /// `^P005ET`. Implemented but kept out of the poll cycle: some units
    /// intermittently answer this query with a corrupt integrity trailer.
    /// TODO: put this back into refresh() once the corruption is root-caused.
    pub async fn total_generated_energy(&mut self) -> Result<i64> {
        let raw = self.transaction.execute("^P005ET", "^D011").await?;
        let value = telegram::parse_total_energy(&raw)?;
        self.total_energy.update(value);
        Ok(value)
    }

    // Setters. Each returns whether the inverter accepted the command;
    // transport and protocol faults still propagate as errors.

    pub async fn set_battery_type(&mut self, value: BatteryType) -> Result<bool> {
        let accepted = self
            .transaction
            .send_command(&format!("^S007PBT{}", value.wire()))
            .await?;
        Ok(accepted)
    }

    pub async fn set_input_voltage_range(&mut self, value: InputVoltageRange) -> Result<bool> {
        let accepted = self
            .transaction
            .send_command(&format!("^S007PGR{}", value.wire()))
            .await?;
        Ok(accepted)
    }

    pub async fn set_output_source_priority(
        &mut self,
        value: OutputSourcePriority,
    ) -> Result<bool> {
        let accepted = self
            .transaction
            .send_command(&format!("^S007POP{}", value.wire()))
            .await?;
        Ok(accepted)
    }

    pub async fn set_charger_priority(&mut self, value: ChargerPriority) -> Result<bool> {
        // The leading 0 addresses the single (non-parallel) machine.
        let accepted = self
            .transaction
            .send_command(&format!("^S009PCP0,{}", value.wire()))
            .await?;
        Ok(accepted)
    }

    pub async fn set_solar_power_priority(&mut self, value: SolarPowerPriority) -> Result<bool> {
        let accepted = self
            .transaction
            .send_command(&format!("^S007PSP{}", value.wire()))
            .await?;
        Ok(accepted)
    }

    pub async fn set_backlight(&mut self, on: bool) -> Result<bool> {
        let flag = if on { "E" } else { "D" };
        let accepted = self
            .transaction
            .send_command(&format!("^S006P{}F", flag))
            .await?;
        Ok(accepted)
    }

    pub async fn set_load_connection(&mut self, on: bool) -> Result<bool> {
        let flag = if on { "1" } else { "0" };
        let accepted = self
            .transaction
            .send_command(&format!("^S007LON{}", flag))
            .await?;
        Ok(accepted)
    }

    /// Recharge and re-discharge voltage share one set command, so both are
    /// written together.
    pub async fn set_battery_charge_voltages(
        &mut self,
        recharge: DeciVolts,
        redischarge: DeciVolts,
    ) -> Result<bool> {
        let accepted = self
            .transaction
            .send_command(&format!("^S014BUCD{:03},{:03}", recharge.0, redischarge.0))
            .await?;
        Ok(accepted)
    }

    /// Apply an inbound control request. The owning entity validates the
    /// payload against its closed value set before anything touches the
    /// device; entity state republishes only when the device accepts.
    pub async fn handle_command(&mut self, command: Command) -> Result<()> {
        match command {
            Command::SetBatteryType(payload) => {
                let value = self.battery_type.command(&payload)?;
                if self.set_battery_type(value).await? {
                    self.battery_type.update(value);
                } else {
                    warn!("inverter rejected battery type {}", value);
                }
            }
            Command::SetInputVoltageRange(payload) => {
                let value = self.input_voltage_range.command(&payload)?;
                if self.set_input_voltage_range(value).await? {
                    self.input_voltage_range.update(value);
                } else {
                    warn!("inverter rejected input voltage range {}", value);
                }
            }
            Command::SetOutputSourcePriority(payload) => {
                let value = self.output_source_priority.command(&payload)?;
                if self.set_output_source_priority(value).await? {
                    self.output_source_priority.update(value);
                } else {
                    warn!("inverter rejected output source priority {}", value);
                }
            }
            Command::SetChargerPriority(payload) => {
                let value = self.charger_priority.command(&payload)?;
                if self.set_charger_priority(value).await? {
                    self.charger_priority.update(value);
                } else {
                    warn!("inverter rejected charger priority {}", value);
                }
            }
            Command::SetSolarPowerPriority(payload) => {
                let value = self.solar_power_priority.command(&payload)?;
                if self.set_solar_power_priority(value).await? {
                    self.solar_power_priority.update(value);
                } else {
                    warn!("inverter rejected solar power priority {}", value);
                }
            }
            Command::SetChargeStopVoltage(payload) => {
                let (value, recharge) = match (
                    self.charge_stop_voltage.as_ref(),
                    self.last_recharge_voltage,
                ) {
                    (Some(select), Some(recharge)) => (select.command(&payload)?, recharge),
                    _ => bail!("charge stop voltage not initialised yet"),
                };
                if self.set_battery_charge_voltages(recharge, value).await? {
                    if let Some(select) = self.charge_stop_voltage.as_mut() {
                        select.update(value);
                    }
                } else {
                    warn!("inverter rejected charge stop voltage {}", value);
                }
            }
            Command::SetBacklight(payload) => {
                let on = self.backlight.command(&payload)?;
                if self.set_backlight(on).await? {
                    self.backlight.update(on);
                } else {
                    warn!("inverter rejected backlight change");
                }
            }
            Command::SetLoadConnection(payload) => {
                let on = self.load_connection.command(&payload)?;
                if self.set_load_connection(on).await? {
                    self.load_connection.update(on);
                } else {
                    warn!("inverter rejected load connection change");
                }
            }
        }

        Ok(())
    }
}
