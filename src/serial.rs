use crate::config;
use crate::pi18::transaction::{Transport, DELIMITER};
use crate::prelude::*;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, ReadHalf, WriteHalf};
use tokio_serial::{SerialPortBuilderExt, SerialStream};

/// The inverter's serial line, framed on the protocol delimiter. The read
/// timeout lives here: a transaction either completes or fails within it.
pub struct SerialPort {
    reader: BufReader<ReadHalf<SerialStream>>,
    writer: WriteHalf<SerialStream>,
    read_timeout: Duration,
}

impl SerialPort {
    pub fn open(config: &config::Serial) -> Result<Self> {
        info!("opening {} at {} baud", config.port(), config.baud());

        let stream = tokio_serial::new(config.port(), config.baud())
            .open_native_async()
            .map_err(|err| anyhow!("error opening {}: {}", config.port(), err))?;

        let (reader, writer) = tokio::io::split(stream);

        Ok(Self {
            reader: BufReader::new(reader),
            writer,
            read_timeout: Duration::from_millis(config.read_timeout_ms()),
        })
    }
}

#[async_trait]
impl Transport for SerialPort {
    async fn write(&mut self, bytes: &[u8]) -> std::io::Result<()> {
        self.writer.write_all(bytes).await?;
        self.writer.flush().await
    }

    async fn read_until_delimiter(&mut self) -> std::io::Result<Vec<u8>> {
        let mut frame = Vec::new();

        let read = tokio::time::timeout(
            self.read_timeout,
            self.reader.read_until(DELIMITER, &mut frame),
        )
        .await
        .map_err(|_| {
            std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                "timed out waiting for response",
            )
        })??;

        if read == 0 || frame.last() != Some(&DELIMITER) {
            return Err(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "serial port closed mid-frame",
            ));
        }

        frame.pop();
        Ok(frame)
    }
}
