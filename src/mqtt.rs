use crate::prelude::*;

use rumqttc::{AsyncClient, Event, EventLoop, Incoming, LastWill, MqttOptions, Publish};

pub use rumqttc::QoS;

// Message {{{
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub topic: String,
    pub payload: String,
    pub retain: bool,
    pub qos: QoS,
}
// }}}

#[derive(Debug, Clone, PartialEq)]
pub enum ChannelData {
    Message(Message),
    Shutdown,
}

pub type Sender = broadcast::Sender<ChannelData>;

#[derive(Clone)]
pub struct Mqtt {
    config: Arc<Config>,
    channels: Channels,
}

impl Mqtt {
    pub fn new(config: Arc<Config>, channels: Channels) -> Self {
        Self { config, channels }
    }

    pub async fn start(&self) -> Result<()> {
        let c = self.config.mqtt();

        if !c.enabled() {
            info!("mqtt disabled, skipping");
            return Ok(());
        }

        let mut options = MqttOptions::new("pi18-bridge", c.host(), c.port());

        let will = LastWill {
            topic: self.lwt_topic(),
            message: bytes::Bytes::from("offline"),
            qos: QoS::AtLeastOnce,
            retain: true,
        };
        options.set_last_will(will);

        options.set_keep_alive(std::time::Duration::from_secs(60));
        if let (Some(u), Some(p)) = (c.username(), c.password()) {
            options.set_credentials(u, p);
        }

        info!("initializing mqtt at {}:{}", c.host(), c.port());

        let (client, eventloop) = AsyncClient::new(options, 10);

        futures::try_join!(
            self.setup(client.clone()),
            self.receiver(eventloop),
            self.sender(client)
        )?;

        Ok(())
    }

    pub fn stop(&self) {
        let _ = self.channels.to_mqtt.send(ChannelData::Shutdown);
    }

    async fn setup(&self, client: AsyncClient) -> Result<()> {
        client
            .publish(self.lwt_topic(), QoS::AtLeastOnce, true, "online")
            .await?;

        // The device id in command topics embeds the serial number, which is
        // only known once the coordinator has talked to the inverter, so the
        // subscription uses wildcards.
        for component in ["select", "switch"] {
            client
                .subscribe(
                    format!(
                        "{}/{}/+/+/command",
                        self.config.mqtt().discovery_prefix(),
                        component
                    ),
                    QoS::AtMostOnce,
                )
                .await?;
        }

        Ok(())
    }

    // mqtt -> coordinator
    async fn receiver(&self, mut eventloop: EventLoop) -> Result<()> {
        let mut shutdown = self.channels.to_mqtt.subscribe();

        loop {
            tokio::select! {
                event = eventloop.poll() => match event {
                    Ok(Event::Incoming(Incoming::Publish(publish))) => {
                        self.handle_message(publish)?;
                    }
                    Err(e) => {
                        error!("{}", e);
                        info!("reconnecting in 5s");
                        tokio::time::sleep(std::time::Duration::from_secs(5)).await;
                    }
                    _ => {} // keepalives etc
                },
                message = shutdown.recv() => {
                    if matches!(message, Ok(ChannelData::Shutdown)) {
                        break;
                    }
                }
            }
        }

        info!("mqtt receiver loop exiting");
        Ok(())
    }

    fn handle_message(&self, publish: Publish) -> Result<()> {
        let message = Message {
            topic: publish.topic,
            payload: String::from_utf8(publish.payload.to_vec())?,
            retain: publish.retain,
            qos: QoS::AtMostOnce,
        };
        debug!("RX: {:?}", message);

        if self
            .channels
            .from_mqtt
            .send(ChannelData::Message(message))
            .is_err()
        {
            bail!("send(from_mqtt) failed - channel closed?");
        }

        Ok(())
    }

    // coordinator -> mqtt
    async fn sender(&self, client: AsyncClient) -> Result<()> {
        use ChannelData::*;

        let mut receiver = self.channels.to_mqtt.subscribe();

        loop {
            match receiver.recv().await {
                Ok(Shutdown) => {
                    info!("mqtt sender received shutdown signal");
                    let _ = client.disconnect().await;
                    break;
                }
                Ok(Message(message)) => {
                    debug!("publishing: {} = {}", message.topic, message.payload);
                    if let Err(err) = client
                        .publish(
                            &message.topic,
                            message.qos,
                            message.retain,
                            message.payload.into_bytes(),
                        )
                        .await
                    {
                        error!("mqtt publish to {} failed: {:?}", message.topic, err);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("mqtt sender lagged, dropped {} messages", n);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }

        info!("mqtt sender loop exiting");
        Ok(())
    }

    fn lwt_topic(&self) -> String {
        format!("{}/LWT", self.config.mqtt().namespace())
    }
}
