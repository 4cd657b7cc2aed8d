//! Client side of the serial-radio channel.
//!
//! The server acts as a client toward nearby devices: it opens a candidate
//! port, writes one request envelope, and (for probes) reads one
//! line-terminated reply. Every operation is a full open/write/read/close
//! cycle. Ports are never held between operations, so a scan rewrite or a
//! competing session never finds a port busy longer than one exchange.

use std::io::{BufRead, BufReader, Write};
use std::time::Duration;

use serde_json::json;
use thiserror::Error;

use pumpgrid_core::protocol::messages::{api, DeviceSnPayload};
use pumpgrid_core::{Envelope, ProtocolError};

use crate::infrastructure::storage::config::RadioConfig;

/// Per-port radio failures. Callers decide the fallback policy: probes skip
/// the port, broadcasts abort.
#[derive(Debug, Error)]
pub enum RadioError {
    #[error("failed to open {port}: {source}")]
    Open {
        port: String,
        #[source]
        source: serialport::Error,
    },

    #[error("I/O on {port}: {source}")]
    Io {
        port: String,
        #[source]
        source: std::io::Error,
    },

    #[error("unreadable reply from {port}: {source}")]
    BadReply {
        port: String,
        #[source]
        source: ProtocolError,
    },

    #[error("device on {port} refused the request")]
    Refused { port: String },
}

/// The seam between sessions and serial hardware.
pub trait RadioLink: Send + Sync {
    /// Asks the device behind `port` for its serial number.
    ///
    /// # Errors
    ///
    /// Any open/write/read failure, an undecodable reply, or a reply with
    /// the failure flag set.
    fn probe_serial(&self, port: &str) -> Result<String, RadioError>;

    /// Writes one command envelope to `port`, fire-and-forget.
    ///
    /// # Errors
    ///
    /// Any open or write failure.
    fn send_command(&self, port: &str, command: &Envelope) -> Result<(), RadioError>;
}

/// The USB serial implementation.
pub struct UsbRadio {
    baud: u32,
    io_timeout: Duration,
    settle: Duration,
}

impl UsbRadio {
    pub fn new(config: &RadioConfig) -> Self {
        Self {
            baud: config.baud,
            io_timeout: config.io_timeout(),
            settle: config.settle(),
        }
    }

    fn open(&self, port: &str) -> Result<Box<dyn serialport::SerialPort>, RadioError> {
        serialport::new(port, self.baud)
            .timeout(self.io_timeout)
            .open()
            .map_err(|source| RadioError::Open {
                port: port.to_string(),
                source,
            })
    }
}

impl RadioLink for UsbRadio {
    fn probe_serial(&self, port: &str) -> Result<String, RadioError> {
        let mut link = self.open(port)?;

        let probe = Envelope::request(api::GET_DEVICE_SN, json!({}));
        link.write_all(&probe.to_bytes()).map_err(|source| RadioError::Io {
            port: port.to_string(),
            source,
        })?;

        // Give the device time to compose its reply before the read.
        std::thread::sleep(self.settle);

        let mut reader = BufReader::new(link);
        let mut line = String::new();
        reader.read_line(&mut line).map_err(|source| RadioError::Io {
            port: port.to_string(),
            source,
        })?;

        parse_probe_reply(port, line.as_bytes())
        // the port handle drops (and closes) here
    }

    fn send_command(&self, port: &str, command: &Envelope) -> Result<(), RadioError> {
        let mut link = self.open(port)?;

        link.write_all(&command.to_bytes())
            .map_err(|source| RadioError::Io {
                port: port.to_string(),
                source,
            })?;

        // Let the bytes drain before the close drops DTR.
        std::thread::sleep(self.settle);
        Ok(())
    }
}

/// Decodes a probe reply line into the device serial it carries.
fn parse_probe_reply(port: &str, line: &[u8]) -> Result<String, RadioError> {
    let envelope = Envelope::from_bytes(line).map_err(|source| RadioError::BadReply {
        port: port.to_string(),
        source,
    })?;

    if !envelope.result {
        return Err(RadioError::Refused {
            port: port.to_string(),
        });
    }

    let payload: DeviceSnPayload =
        serde_json::from_value(envelope.data.clone()).map_err(|source| RadioError::BadReply {
            port: port.to_string(),
            source: ProtocolError::InvalidPayload {
                api: api::GET_DEVICE_SN.to_string(),
                source,
            },
        })?;

    Ok(payload.device_serial)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_probe_reply_extracts_device_serial() {
        // Arrange: a well-formed, newline-terminated device reply.
        let line = b"{\"Api\":\"\",\"Result\":1,\"Data\":{\"DeviceSerial\":\"EDGE07\"}}\n";

        // Act
        let serial = parse_probe_reply("/dev/ttyACM0", line).expect("parse");

        // Assert
        assert_eq!(serial, "EDGE07");
    }

    #[test]
    fn test_parse_probe_reply_rejects_failure_flag() {
        let line = br#"{"Api":"","Result":0,"Data":{}}"#;
        let result = parse_probe_reply("/dev/ttyACM0", line);
        assert!(matches!(result, Err(RadioError::Refused { .. })));
    }

    #[test]
    fn test_parse_probe_reply_rejects_reply_without_serial() {
        let line = br#"{"Api":"","Result":1,"Data":{}}"#;
        let result = parse_probe_reply("/dev/ttyACM0", line);
        assert!(matches!(result, Err(RadioError::BadReply { .. })));
    }

    #[test]
    fn test_parse_probe_reply_rejects_line_noise() {
        let result = parse_probe_reply("/dev/ttyACM0", b"\xFF\xFEboot garbage");
        assert!(matches!(result, Err(RadioError::BadReply { .. })));
    }

    #[test]
    fn test_probe_on_missing_port_is_an_open_error() {
        // Arrange
        let radio = UsbRadio::new(&RadioConfig::default());

        // Act
        let result = radio.probe_serial("/dev/pumpgrid-test-no-such-port");

        // Assert
        assert!(matches!(result, Err(RadioError::Open { .. })));
    }

    #[test]
    fn test_send_command_on_missing_port_is_an_open_error() {
        let radio = UsbRadio::new(&RadioConfig::default());
        let command = Envelope::request(api::RESET_WIFI, json!({}));
        let result = radio.send_command("/dev/pumpgrid-test-no-such-port", &command);
        assert!(matches!(result, Err(RadioError::Open { .. })));
    }
}
