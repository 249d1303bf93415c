// Module declarations for the application's core components
pub mod channels;       // Inter-component communication channels
pub mod command;        // Inbound MQTT command decoding
pub mod config;         // Configuration management
pub mod coordinator;    // Poll loop and command dispatch
pub mod entity;         // Sensor/select/switch entity model
pub mod error;          // Protocol error taxonomy
pub mod home_assistant; // Home Assistant discovery payloads
pub mod mqtt;           // MQTT client and messaging
pub mod options;        // Command line options parsing
pub mod pi18;           // PI18 inverter protocol implementation
pub mod prelude;        // Common imports and types
pub mod serial;         // Serial port transport

// Get the package version from Cargo.toml
const CARGO_PKG_VERSION: &str = env!("CARGO_PKG_VERSION");

use crate::coordinator::Coordinator;
use crate::mqtt::Mqtt;
use crate::prelude::*;

/// Main application entry point: wires channels, the MQTT client and the
/// coordinator together and runs until the shutdown signal fires.
pub async fn app(mut shutdown_rx: broadcast::Receiver<()>) -> Result<()> {
    let options = Options::new();
    let config = Arc::new(Config::new(options.config_file)?);

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config.loglevel()),
    )
    .format(|buf, record| {
        use std::io::Write;
        writeln!(
            buf,
            "[{} {} {}] {}",
            chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.3f"),
            record.level(),
            record.module_path().unwrap_or(""),
            record.args()
        )
    })
    .write_style(env_logger::WriteStyle::Never)
    .init();

    info!("pi18-bridge {} starting", CARGO_PKG_VERSION);
    config.log_summary();

    let channels = Channels::new();

    let mqtt = Mqtt::new(config.clone(), channels.clone());
    let mqtt_clone = mqtt.clone();
    let mqtt_handle = tokio::spawn(async move {
        if let Err(e) = mqtt_clone.start().await {
            error!("mqtt task failed: {:#}", e);
        }
    });

    let coordinator = Coordinator::new(config.clone(), channels.clone());
    let coordinator_clone = coordinator.clone();
    let coordinator_handle = tokio::spawn(async move {
        if let Err(e) = coordinator_clone.start().await {
            error!("coordinator task failed: {:#}", e);
        }
    });

    let _ = shutdown_rx.recv().await;
    info!("shutdown signal received, stopping components...");

    coordinator.stop();
    mqtt.stop();

    if let Err(e) = coordinator_handle.await {
        error!("error waiting for coordinator task: {}", e);
    }
    if let Err(e) = mqtt_handle.await {
        error!("error waiting for mqtt task: {}", e);
    }

    info!("shutdown complete");
    Ok(())
}
