//! The single task that owns the serial line and the adapter.
//!
//! Two activity sources mutate entity state: the poll tick and inbound MQTT
//! commands. Funnelling both through this one loop serializes them — only
//! one transaction is ever in flight (the wire has no request ids to tell
//! overlapping exchanges apart), and no entity sees interleaved mutations.

use crate::pi18::adapter::Adapter;
use crate::pi18::transaction::{Transaction, Transport};
use crate::prelude::*;
use crate::serial::SerialPort;

use tokio::time::MissedTickBehavior;

#[derive(Clone)]
pub struct Coordinator {
    config: Arc<Config>,
    channels: Channels,
}

impl Coordinator {
    pub fn new(config: Arc<Config>, channels: Channels) -> Self {
        Self { config, channels }
    }

    pub async fn start(&self) -> Result<()> {
        let port = SerialPort::open(self.config.serial())?;
        let transaction = Transaction::new(port);

        let mut adapter =
            Adapter::connect(transaction, &self.config, self.channels.to_mqtt.clone()).await?;

        self.run(&mut adapter).await
    }

    pub fn stop(&self) {
        let _ = self.channels.from_mqtt.send(mqtt::ChannelData::Shutdown);
    }

    async fn run<T: Transport>(&self, adapter: &mut Adapter<T>) -> Result<()> {
        let mut from_mqtt = self.channels.from_mqtt.subscribe();
        let mut poll =
            tokio::time::interval(std::time::Duration::from_secs(self.config.poll_interval()));
        // The first refresh already ran in connect(); no need to hurry.
        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);
        poll.tick().await;

        loop {
            tokio::select! {
                _ = poll.tick() => {
                    if let Err(e) = adapter.refresh().await {
                        error!("poll failed: {:#}", e);
                    }
                }
                message = from_mqtt.recv() => match message {
                    Ok(mqtt::ChannelData::Message(message)) => {
                        if let Some(command) = Command::try_from_message(&message) {
                            info!("processing {:?}", command);
                            if let Err(e) = adapter.handle_command(command).await {
                                error!("command failed: {:#}", e);
                            }
                        }
                    }
                    Ok(mqtt::ChannelData::Shutdown) => {
                        info!("coordinator shutting down");
                        break;
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!("coordinator lagged, dropped {} mqtt messages", n);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
            }
        }

        Ok(())
    }
}
