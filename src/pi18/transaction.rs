//! One command/response round trip against the inverter.
//!
//! The protocol has no request identifiers, so overlapping exchanges cannot
//! be told apart; a transaction must run to completion (or failure) before
//! the next one starts. Exclusive access to the transport enforces that
//! here, and the single coordinator task enforces it process-wide.

use crate::error::{Error, Result};

use super::crc;

use async_trait::async_trait;

/// Byte-level transport the transaction engine drives. Implemented by the
/// serial port in production and by scripted fakes in tests. Read timeouts
/// belong to the implementation; a transaction never blocks past them.
#[async_trait]
pub trait Transport: Send {
    async fn write(&mut self, bytes: &[u8]) -> std::io::Result<()>;

    /// Read one frame, up to and excluding the `\r` delimiter.
    async fn read_until_delimiter(&mut self) -> std::io::Result<Vec<u8>>;
}

/// Every frame on the wire ends with this.
pub const DELIMITER: u8 = b'\r';

/// Prefix the inverter answers set commands with when it accepts them.
pub const ACCEPTED: &str = "^1";

pub struct Transaction<T> {
    transport: T,
    use_crc: bool,
}

impl<T: Transport> Transaction<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            use_crc: true,
        }
    }

    /// Some protocol revisions run without integrity trailers.
    pub fn without_crc(transport: T) -> Self {
        Self {
            transport,
            use_crc: false,
        }
    }

    /// The exact bytes a command puts on the wire.
    pub fn frame(&self, command: &str) -> Vec<u8> {
        let mut out = Vec::with_capacity(command.len() + 3);
        out.extend_from_slice(command.as_bytes());
        if self.use_crc {
            out.extend_from_slice(&crc::checksum(command.as_bytes()));
        }
        out.push(DELIMITER);
        out
    }

    /// Execute one exchange: write the framed command, read the reply,
    /// verify its integrity trailer and `expected_prefix`, and return the
    /// payload following the prefix.
    ///
    /// A prefix or integrity mismatch is `Error::UnexpectedResponse` with
    /// the raw reply attached; no retry happens here.
    pub async fn execute(&mut self, command: &str, expected_prefix: &str) -> Result<String> {
        let frame = self.frame(command);
        self.transport.write(&frame).await?;

        let mut raw = self.transport.read_until_delimiter().await?;
        if self.use_crc {
            if raw.len() < 2 {
                return Err(unexpected(expected_prefix, &raw));
            }
            let body_len = raw.len() - 2;
            if !crc::verify(&raw[..body_len], &raw[body_len..]) {
                return Err(unexpected(expected_prefix, &raw));
            }
            raw.truncate(body_len);
        }

        let response = String::from_utf8_lossy(&raw).into_owned();
        match response.strip_prefix(expected_prefix) {
            Some(payload) => Ok(payload.to_string()),
            None => Err(Error::UnexpectedResponse {
                expected: expected_prefix.to_string(),
                response,
            }),
        }
    }

    /// Issue a set command and report whether the inverter accepted it.
    /// Only the not-accepted reply becomes `false`; transport faults still
    /// propagate as errors.
    pub async fn send_command(&mut self, command: &str) -> Result<bool> {
        match self.execute(command, ACCEPTED).await {
            Ok(_) => Ok(true),
            Err(Error::UnexpectedResponse { .. }) => Ok(false),
            Err(other) => Err(other),
        }
    }
}

fn unexpected(expected: &str, raw: &[u8]) -> Error {
    Error::UnexpectedResponse {
        expected: expected.to_string(),
        response: String::from_utf8_lossy(raw).into_owned(),
    }
}
