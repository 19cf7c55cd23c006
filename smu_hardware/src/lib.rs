pub mod error;

#[cfg(feature = "hardware")]
pub mod serial;
#[cfg(feature = "hardware")]
pub use serial::SerialInstrument;

use smu_traits::InstrumentLink;

/// In-memory instrument for offline work and demos.
///
/// Accepts the full command vocabulary, tracks the output relay and the
/// last programmed voltage, and answers the status queries the way a real
/// source does.
#[derive(Debug, Default)]
pub struct SimulatedInstrument {
    output_on: bool,
    last_volts: f64,
    writes: usize,
}

impl SimulatedInstrument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_volts(&self) -> f64 {
        self.last_volts
    }

    pub fn output_enabled(&self) -> bool {
        self.output_on
    }

    pub fn writes(&self) -> usize {
        self.writes
    }
}

impl InstrumentLink for SimulatedInstrument {
    fn connected(&self) -> bool {
        true
    }

    fn write(&mut self, command: &str) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        tracing::debug!(command, "scpi write (simulated)");
        self.writes += 1;
        if let Some(volts) = command.strip_prefix("SOUR:VOLT ") {
            if let Ok(v) = volts.trim().parse::<f64>() {
                self.last_volts = v;
            }
        } else if command == "OUTP ON" {
            self.output_on = true;
        } else if command == "OUTP OFF" {
            self.output_on = false;
        }
        Ok(())
    }

    fn query(
        &mut self,
        command: &str,
    ) -> Result<String, Box<dyn std::error::Error + Send + Sync>> {
        tracing::debug!(command, "scpi query (simulated)");
        let reply = match command {
            "OUTP?" => {
                if self.output_on {
                    "1"
                } else {
                    "0"
                }
            }
            "*OPC?" => "1",
            _ => "",
        };
        Ok(reply.to_string())
    }
}

/// Placeholder for a device that never connected. `connected` stays false,
/// so runs against it take the simulated path and never call write/query.
#[derive(Debug, Default, Clone, Copy)]
pub struct OfflineInstrument;

impl InstrumentLink for OfflineInstrument {
    fn connected(&self) -> bool {
        false
    }

    fn write(&mut self, _command: &str) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        Err(Box::new(std::io::Error::other("no instrument attached")))
    }

    fn query(
        &mut self,
        _command: &str,
    ) -> Result<String, Box<dyn std::error::Error + Send + Sync>> {
        Err(Box::new(std::io::Error::other("no instrument attached")))
    }
}
