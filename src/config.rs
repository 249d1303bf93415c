use anyhow::{anyhow, bail, Result};
use log::info;
use serde::Deserialize;

#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub device: Device,
    pub serial: Serial,
    pub mqtt: Mqtt,

    /// Seconds between status polls.
    #[serde(default = "Config::default_poll_interval")]
    pub poll_interval: u64,

    #[serde(default = "Config::default_loglevel")]
    pub loglevel: String,
}

// Device {{{
#[derive(Clone, Debug, Deserialize)]
pub struct Device {
    #[serde(default = "Config::default_device_name")]
    pub name: String,

    #[serde(default = "Config::default_manufacturer")]
    pub manufacturer: String,

    #[serde(default = "Config::default_model")]
    pub model: String,
}

impl Default for Device {
    fn default() -> Self {
        Self {
            name: Config::default_device_name(),
            manufacturer: Config::default_manufacturer(),
            model: Config::default_model(),
        }
    }
}

impl Device {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn manufacturer(&self) -> &str {
        &self.manufacturer
    }

    pub fn model(&self) -> &str {
        &self.model
    }
} // }}}

// Serial {{{
#[derive(Clone, Debug, Deserialize)]
pub struct Serial {
    pub port: String,

    #[serde(default = "Config::default_baud")]
    pub baud: u32,

    #[serde(default = "Config::default_read_timeout_ms")]
    pub read_timeout_ms: u64,
}

impl Serial {
    pub fn port(&self) -> &str {
        &self.port
    }

    pub fn baud(&self) -> u32 {
        self.baud
    }

    pub fn read_timeout_ms(&self) -> u64 {
        self.read_timeout_ms
    }
} // }}}

// Mqtt {{{
#[derive(Clone, Debug, Deserialize)]
pub struct Mqtt {
    #[serde(default = "Config::default_enabled")]
    pub enabled: bool,

    pub host: String,
    #[serde(default = "Config::default_mqtt_port")]
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,

    #[serde(default = "Config::default_mqtt_namespace")]
    pub namespace: String,

    #[serde(default = "Config::default_discovery_prefix")]
    pub discovery_prefix: String,
}

impl Mqtt {
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    pub fn password(&self) -> Option<&str> {
        self.password.as_deref()
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn discovery_prefix(&self) -> &str {
        &self.discovery_prefix
    }
} // }}}

impl Config {
    pub fn new(file: String) -> Result<Self> {
        let content = std::fs::read_to_string(&file)
            .map_err(|err| anyhow!("error reading {}: {}", file, err))?;

        let config: Self = serde_yaml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    pub fn serial(&self) -> &Serial {
        &self.serial
    }

    pub fn mqtt(&self) -> &Mqtt {
        &self.mqtt
    }

    pub fn poll_interval(&self) -> u64 {
        self.poll_interval
    }

    pub fn loglevel(&self) -> &str {
        &self.loglevel
    }

    /// Called once the logger is up; `new()` itself stays quiet.
    pub fn log_summary(&self) {
        info!("Configuration loaded:");
        info!("  Device: {} ({} {})", self.device.name, self.device.manufacturer, self.device.model);
        info!("  Serial: {} @ {} baud", self.serial.port, self.serial.baud);
        info!("  MQTT: {}", if self.mqtt.enabled { "enabled" } else { "disabled" });
        if self.mqtt.enabled {
            info!("    Host: {}", self.mqtt.host);
            info!("    Port: {}", self.mqtt.port);
            info!("    Namespace: {}", self.mqtt.namespace);
            info!("    Discovery prefix: {}", self.mqtt.discovery_prefix);
        }
        info!("  Poll interval: {}s", self.poll_interval);
        info!("  Log level: {}", self.loglevel);
    }

    fn validate(&self) -> Result<()> {
        if self.serial.port.is_empty() {
            bail!("serial.port cannot be empty");
        }
        if self.serial.baud == 0 {
            bail!("serial.baud must be non-zero");
        }

        if self.mqtt.enabled {
            if self.mqtt.port == 0 {
                bail!("mqtt.port must be between 1 and 65535");
            }
            if self.mqtt.host.is_empty() {
                bail!("mqtt.host cannot be empty");
            }
        }

        if self.poll_interval == 0 {
            bail!("poll_interval must be at least 1 second");
        }

        Ok(())
    }

    fn default_device_name() -> String {
        "inverter".to_string()
    }

    fn default_manufacturer() -> String {
        "MPP Solar".to_string()
    }

    fn default_model() -> String {
        "PI18".to_string()
    }

    fn default_baud() -> u32 {
        2400
    }

    fn default_read_timeout_ms() -> u64 {
        5000
    }

    fn default_mqtt_port() -> u16 {
        1883
    }

    fn default_mqtt_namespace() -> String {
        "pi18".to_string()
    }

    fn default_discovery_prefix() -> String {
        "homeassistant".to_string()
    }

    fn default_enabled() -> bool {
        true
    }

    fn default_poll_interval() -> u64 {
        30
    }

    fn default_loglevel() -> String {
        "info".to_string()
    }
}
