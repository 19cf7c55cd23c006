//! CLI argument definitions and shared statics.

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::OnceLock;

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();
/// Whether the user asked for JSON output (controls the outcome line).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(name = "smu", version, about = "Dual-SMU waveform sequencer CLI")]
pub struct Cli {
    /// Path to config TOML (typed)
    #[arg(long, value_name = "FILE", default_value = "etc/smu_config.toml")]
    pub config: PathBuf,

    /// Print outcomes as JSON lines
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace)
    #[arg(long = "log-level", value_name = "LEVEL", default_value = "info")]
    pub log_level: String,

    /// Use in-memory simulated instruments instead of opening real links
    #[arg(long, action = ArgAction::SetTrue)]
    pub simulate: bool,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum WaveArg {
    Sine,
    Cosine,
    Square,
    Sawtooth,
    Custom,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum DeviceArg {
    First,
    Second,
}

impl DeviceArg {
    pub fn name(self) -> &'static str {
        match self {
            Self::First => "first",
            Self::Second => "second",
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum OrderArg {
    /// First device runs, then the second
    FirstThenSecond,
    /// Second device runs, then the first
    SecondThenFirst,
}

/// Waveform and run overrides shared by the drive subcommands; anything
/// omitted falls back to the `[waveform]`/`[run]` config sections.
#[derive(Args, Debug, Clone, Default)]
pub struct WaveOpts {
    /// Waveform kind
    #[arg(long, value_enum)]
    pub waveform: Option<WaveArg>,

    /// Amplitude (V)
    #[arg(long, value_name = "VOLTS")]
    pub amplitude: Option<f64>,

    /// Frequency (Hz)
    #[arg(long, value_name = "HZ")]
    pub frequency: Option<f64>,

    /// Phase (deg)
    #[arg(long, value_name = "DEG")]
    pub phase: Option<f64>,

    /// Offset (V)
    #[arg(long, value_name = "VOLTS")]
    pub offset: Option<f64>,

    /// Square wave duty cycle (%)
    #[arg(long, value_name = "PERCENT")]
    pub duty: Option<f64>,

    /// Square wave begins the cycle in the low state
    #[arg(long, action = ArgAction::SetTrue)]
    pub start_low: bool,

    /// CSV file with time,voltage rows for a custom waveform
    #[arg(long, value_name = "FILE")]
    pub table: Option<PathBuf>,

    /// Voltage resolution (V)
    #[arg(long, value_name = "VOLTS")]
    pub resolution: Option<f64>,

    /// Repeat count for the full sequence
    #[arg(long, value_name = "N")]
    pub repeat: Option<u32>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the preview sample sequence and the total duration
    Preview {
        #[command(flatten)]
        wave: WaveOpts,
    },
    /// Drive one instrument through the waveform
    Run {
        #[command(flatten)]
        wave: WaveOpts,
        /// Which instrument to drive
        #[arg(long, value_enum, default_value = "first")]
        device: DeviceArg,
    },
    /// Configure one instrument and hold a fixed voltage
    Steady {
        /// Voltage to hold (free text; non-numeric falls back to the default)
        #[arg(long, value_name = "VOLTS")]
        volts: Option<String>,
        /// Which instrument to drive
        #[arg(long, value_enum, default_value = "first")]
        device: DeviceArg,
    },
    /// Replay the waveform against an already-configured instrument
    Pulse {
        #[command(flatten)]
        wave: WaveOpts,
        /// Which instrument to drive
        #[arg(long, value_enum, default_value = "first")]
        device: DeviceArg,
    },
    /// Run both instruments strictly in sequence
    Sequence {
        #[command(flatten)]
        wave: WaveOpts,
        /// Which device starts
        #[arg(long, value_enum, default_value = "first-then-second")]
        order: OrderArg,
    },
}
