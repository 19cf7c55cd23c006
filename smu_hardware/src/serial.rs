//! Serial SCPI transport.
//!
//! Newline-terminated commands at a fixed baud rate, one outstanding query
//! at a time. There is no per-command timeout beyond the port's own read
//! timeout; a hung instrument blocks the caller, which is the documented
//! behavior of the pacing loop above it.

use crate::error::{LinkError, Result};
use smu_traits::InstrumentLink;
use std::io::{Read, Write};
use std::time::Duration;

const READ_TIMEOUT: Duration = Duration::from_secs(10);

pub struct SerialInstrument {
    port: Box<dyn serialport::SerialPort>,
}

impl SerialInstrument {
    /// Open a serial device (e.g. `/dev/ttyS0`, `COM3`) at the given baud.
    pub fn open(path: &str, baud: u32) -> Result<Self> {
        let port = serialport::new(path, baud)
            .timeout(READ_TIMEOUT)
            .open()
            .map_err(|e| LinkError::Port(e.to_string()))?;
        tracing::info!(path, baud, "serial instrument opened");
        Ok(Self { port })
    }

    fn send(&mut self, command: &str) -> Result<()> {
        self.port.write_all(command.as_bytes())?;
        self.port.write_all(b"\n")?;
        Ok(())
    }

    /// Read one newline-terminated reply, stripping the terminator.
    fn read_reply(&mut self) -> Result<String> {
        let mut buf = Vec::new();
        let mut byte = [0u8; 1];
        loop {
            match self.port.read(&mut byte) {
                Ok(0) => break,
                Ok(_) => {
                    if byte[0] == b'\n' {
                        break;
                    }
                    buf.push(byte[0]);
                }
                Err(e) if e.kind() == std::io::ErrorKind::TimedOut => {
                    return Err(LinkError::Timeout);
                }
                Err(e) => return Err(e.into()),
            }
        }
        let line = String::from_utf8(buf).map_err(|_| LinkError::BadReply)?;
        Ok(line.trim_end_matches('\r').to_string())
    }
}

impl InstrumentLink for SerialInstrument {
    fn connected(&self) -> bool {
        true
    }

    fn write(&mut self, command: &str) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.send(command)?;
        Ok(())
    }

    fn query(
        &mut self,
        command: &str,
    ) -> std::result::Result<String, Box<dyn std::error::Error + Send + Sync>> {
        self.send(command)?;
        Ok(self.read_reply()?)
    }
}
