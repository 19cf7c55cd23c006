//! SCPI command vocabulary for the source instrument.
//!
//! The strings are exact and the init order matters to the device; keep the
//! whole vocabulary in one place so no call site improvises a command.

pub const RESET: &str = "*RST";
pub const CLEAR_STATUS: &str = "*CLS";
pub const SOURCE_FUNCTION_VOLTAGE: &str = "SOUR:FUNC VOLT";
pub const VOLTAGE_MODE_FIXED: &str = "SOUR:VOLT:MODE FIXED";
pub const OUTPUT_ON: &str = "OUTP ON";
pub const OUTPUT_OFF: &str = "OUTP OFF";
/// Non-fatal probe of the output relay state.
pub const OUTPUT_STATE_QUERY: &str = "OUTP?";
/// Blocks until the device reports all buffered commands processed.
pub const OPERATION_COMPLETE_QUERY: &str = "*OPC?";

/// Per-sample set-voltage command, always 4 decimal places.
pub fn set_voltage(volts: f64) -> String {
    format!("SOUR:VOLT {volts:.4}")
}

pub fn voltage_range(volts: f64) -> String {
    format!("SOUR:VOLT:RANG {volts}")
}

pub fn current_protection(amps: f64) -> String {
    format!("SENS:CURR:PROT {amps}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_voltage_uses_four_decimals() {
        assert_eq!(set_voltage(1.0), "SOUR:VOLT 1.0000");
        assert_eq!(set_voltage(-1.23456), "SOUR:VOLT -1.2346");
        assert_eq!(set_voltage(0.00006), "SOUR:VOLT 0.0001");
    }

    #[test]
    fn range_and_protection_render_bare_numbers() {
        assert_eq!(voltage_range(20.0), "SOUR:VOLT:RANG 20");
        assert_eq!(current_protection(0.1), "SENS:CURR:PROT 0.1");
    }
}
