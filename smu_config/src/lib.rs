#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schemas and table loading for the waveform sequencer.
//!
//! - `Config` and sub-structs are deserialized from TOML and validated.
//! - The custom-waveform CSV loader reads the raw (time, voltage) cell text;
//!   non-numeric rows are filtered later by the generator, so the loader
//!   stays permissive on purpose.
//! - `parse` holds the lenient field parsers: free-form text inputs fall
//!   back to documented defaults instead of aborting a run.

use serde::Deserialize;

/// Seed values mirrored from the operator-facing input fields.
pub mod defaults {
    pub const AMPLITUDE_V: f64 = 1.0;
    pub const FREQUENCY_HZ: f64 = 1.0;
    pub const PHASE_DEG: f64 = 0.0;
    pub const OFFSET_V: f64 = 0.0;
    pub const DUTY_PERCENT: f64 = 50.0;
    pub const RESOLUTION_V: f64 = 0.001;
    pub const REPEAT_COUNT: u32 = 1;
    pub const STEADY_VOLTS: f64 = 0.0;
}

/// Lenient numeric parsing for operator-entered fields.
///
/// Empty, non-numeric, or non-finite text yields the supplied default, so a
/// typo in one field degrades to a documented value instead of killing the
/// run request.
pub mod parse {
    pub fn f64_or(text: &str, default: f64) -> f64 {
        match text.trim().parse::<f64>() {
            Ok(v) if v.is_finite() => v,
            _ => default,
        }
    }

    pub fn u32_or(text: &str, default: u32) -> u32 {
        text.trim().parse::<u32>().unwrap_or(default)
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Instruments {
    /// Resource string of the first device (e.g. "GPIB0::24::INSTR")
    pub first: String,
    /// Resource string of the second device (e.g. "ASRL4::INSTR")
    pub second: String,
    /// Serial baud rate for ASRL resources
    pub baud: u32,
}

impl Default for Instruments {
    fn default() -> Self {
        Self {
            first: "GPIB0::24::INSTR".into(),
            second: "ASRL4::INSTR".into(),
            baud: 9600,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct Source {
    /// Source voltage range programmed during init (V)
    pub voltage_range_v: f64,
    /// Current-protection (compliance) limit programmed during init (A)
    pub current_limit_a: f64,
}

impl Default for Source {
    fn default() -> Self {
        Self {
            voltage_range_v: 20.0,
            current_limit_a: 0.1,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct Timing {
    /// Pacing delay between set-voltage writes (ms)
    pub sample_interval_ms: u64,
    /// Poll interval while a run is paused (ms)
    pub pause_poll_ms: u64,
    /// Settle wait after output enable during init (ms)
    pub init_settle_ms: u64,
    /// Settle wait between the first device finishing and the second starting (ms)
    pub handoff_settle_ms: u64,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            sample_interval_ms: 20,
            pause_poll_ms: 50,
            init_settle_ms: 100,
            handoff_settle_ms: 120,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct Run {
    /// Quantization granularity for set-voltage writes (V)
    pub resolution_v: f64,
    /// Number of full passes over the sample sequence
    pub repeat_count: u32,
}

impl Default for Run {
    fn default() -> Self {
        Self {
            resolution_v: defaults::RESOLUTION_V,
            repeat_count: defaults::REPEAT_COUNT,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum WaveKind {
    #[default]
    Sine,
    Cosine,
    Square,
    Sawtooth,
    Custom,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Waveform {
    pub kind: WaveKind,
    pub amplitude_v: f64,
    pub frequency_hz: f64,
    pub phase_deg: f64,
    pub offset_v: f64,
    /// Square only: fraction of the period spent high (percent)
    pub duty_percent: f64,
    /// Square only: begin the cycle in the high state
    pub starts_high: bool,
}

impl Default for Waveform {
    fn default() -> Self {
        Self {
            kind: WaveKind::Sine,
            amplitude_v: defaults::AMPLITUDE_V,
            frequency_hz: defaults::FREQUENCY_HZ,
            phase_deg: defaults::PHASE_DEG,
            offset_v: defaults::OFFSET_V,
            duty_percent: defaults::DUTY_PERCENT,
            starts_high: true,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub instruments: Instruments,
    pub source: Source,
    pub timing: Timing,
    pub run: Run,
    pub waveform: Waveform,
    pub logging: Logging,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

impl Config {
    pub fn validate(&self) -> eyre::Result<()> {
        if self.instruments.baud == 0 {
            eyre::bail!("instruments.baud must be > 0");
        }

        if !(self.source.voltage_range_v.is_finite() && self.source.voltage_range_v > 0.0) {
            eyre::bail!("source.voltage_range_v must be finite and > 0");
        }
        if !(self.source.current_limit_a.is_finite() && self.source.current_limit_a > 0.0) {
            eyre::bail!("source.current_limit_a must be finite and > 0");
        }

        if self.timing.pause_poll_ms == 0 {
            eyre::bail!("timing.pause_poll_ms must be >= 1");
        }
        if self.timing.handoff_settle_ms > 60_000 {
            eyre::bail!("timing.handoff_settle_ms is unreasonably large (>60s)");
        }

        if !(self.run.resolution_v.is_finite() && self.run.resolution_v > 0.0) {
            eyre::bail!("run.resolution_v must be finite and > 0");
        }
        if self.run.repeat_count == 0 {
            eyre::bail!("run.repeat_count must be >= 1");
        }

        if !(self.waveform.frequency_hz.is_finite() && self.waveform.frequency_hz > 0.0) {
            eyre::bail!("waveform.frequency_hz must be finite and > 0");
        }
        if !(0.0..=100.0).contains(&self.waveform.duty_percent) {
            eyre::bail!("waveform.duty_percent must be in [0, 100]");
        }

        Ok(())
    }
}

/// Load a custom-waveform table: one `time,voltage` pair per CSV record.
///
/// Cells are returned as raw text. Rows that do not parse as two finite
/// numbers are dropped downstream by the generator, so short or malformed
/// records are padded here rather than rejected.
pub fn load_custom_table_csv(path: &std::path::Path) -> eyre::Result<Vec<(String, String)>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .map_err(|e| eyre::eyre!("open custom table CSV {:?}: {}", path, e))?;

    let mut rows = Vec::new();
    for rec in rdr.records() {
        let rec = rec.map_err(|e| eyre::eyre!("read custom table CSV {:?}: {}", path, e))?;
        let time = rec.get(0).unwrap_or("").to_string();
        let volts = rec.get(1).unwrap_or("").to_string();
        rows.push((time, volts));
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lenient_parse_falls_back() {
        assert_eq!(parse::f64_or("2.5", 1.0), 2.5);
        assert_eq!(parse::f64_or("", 1.0), 1.0);
        assert_eq!(parse::f64_or("abc", 1.0), 1.0);
        assert_eq!(parse::f64_or("inf", 1.0), 1.0);
        assert_eq!(parse::u32_or("3", 1), 3);
        assert_eq!(parse::u32_or("-2", 1), 1);
    }

    #[test]
    fn defaults_mirror_input_seeds() {
        let cfg = Config::default();
        assert_eq!(cfg.waveform.amplitude_v, 1.0);
        assert_eq!(cfg.waveform.frequency_hz, 1.0);
        assert_eq!(cfg.run.resolution_v, 0.001);
        assert_eq!(cfg.run.repeat_count, 1);
        assert!(cfg.validate().is_ok());
    }
}
