#![allow(dead_code)]

use pi18_bridge::config;
use pi18_bridge::entity::{Device, Publisher};
use pi18_bridge::mqtt;
use pi18_bridge::pi18::crc;
use pi18_bridge::pi18::transaction::Transport;
use pi18_bridge::prelude::*;

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

pub fn common_setup() {
    let _ = env_logger::builder().is_test(true).try_init();
}

// FakeTransport {{{

#[derive(Default)]
struct FakeTransportInner {
    written: Vec<Vec<u8>>,
    responses: VecDeque<Result<Vec<u8>, std::io::ErrorKind>>,
}

/// Transport whose responses are scripted in advance. Clones share state, so
/// tests keep one handle while the transaction engine owns the other.
#[derive(Clone, Default)]
pub struct FakeTransport {
    inner: Arc<Mutex<FakeTransportInner>>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a reply frame exactly as given (no checksum appended).
    pub fn push_raw(&self, frame: impl Into<Vec<u8>>) {
        self.inner
            .lock()
            .unwrap()
            .responses
            .push_back(Ok(frame.into()));
    }

    /// Queue a reply with a valid checksum trailer appended.
    pub fn push_reply(&self, text: &str) {
        let mut frame = text.as_bytes().to_vec();
        frame.extend_from_slice(&crc::checksum(text.as_bytes()));
        self.push_raw(frame);
    }

    pub fn push_error(&self, kind: std::io::ErrorKind) {
        self.inner.lock().unwrap().responses.push_back(Err(kind));
    }

    pub fn written(&self) -> Vec<Vec<u8>> {
        self.inner.lock().unwrap().written.clone()
    }

    pub fn written_count(&self) -> usize {
        self.inner.lock().unwrap().written.len()
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn write(&mut self, bytes: &[u8]) -> std::io::Result<()> {
        self.inner.lock().unwrap().written.push(bytes.to_vec());
        Ok(())
    }

    async fn read_until_delimiter(&mut self) -> std::io::Result<Vec<u8>> {
        match self.inner.lock().unwrap().responses.pop_front() {
            Some(Ok(frame)) => Ok(frame),
            Some(Err(kind)) => Err(std::io::Error::new(kind, "scripted transport error")),
            None => Err(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "no scripted response",
            )),
        }
    }
}

// }}}

// Factory {{{

pub struct Factory;

impl Factory {
    pub fn config() -> Config {
        Config {
            device: config::Device {
                name: "inverter".to_string(),
                manufacturer: "MPP Solar".to_string(),
                model: "PI18".to_string(),
            },
            serial: config::Serial {
                port: "/dev/ttyUSB0".to_string(),
                baud: 2400,
                read_timeout_ms: 100,
            },
            mqtt: config::Mqtt {
                enabled: true,
                host: "localhost".to_string(),
                port: 1883,
                username: None,
                password: None,
                namespace: "pi18".to_string(),
                discovery_prefix: "homeassistant".to_string(),
            },
            poll_interval: 30,
            loglevel: "info".to_string(),
        }
    }

    pub fn device() -> Device {
        Device {
            serial_number: "96332309100452".to_string(),
            manufacturer: "MPP Solar".to_string(),
            model: "PI18".to_string(),
            name: "inverter".to_string(),
        }
    }

    pub fn publisher(to_mqtt: mqtt::Sender) -> Publisher {
        Publisher::new(Arc::new(Self::device()), "homeassistant", to_mqtt)
    }
}

// }}}

/// Drain every message currently sitting in a broadcast receiver.
pub fn drain(receiver: &mut broadcast::Receiver<mqtt::ChannelData>) -> Vec<mqtt::Message> {
    let mut result = Vec::new();
    while let Ok(data) = receiver.try_recv() {
        if let mqtt::ChannelData::Message(message) = data {
            result.push(message);
        }
    }
    result
}
