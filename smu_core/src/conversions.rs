//! `From` implementations bridging `smu_config` types to `smu_core` types.
//!
//! These keep the CLI free of field-by-field mapping.

use crate::controller::{RunConfig, SourceProfile, TimingCfg};
use crate::waveform::{WaveformKind, WaveformParams};
use std::time::Duration;

// ── WaveformKind ─────────────────────────────────────────────────────────────

impl From<smu_config::WaveKind> for WaveformKind {
    fn from(k: smu_config::WaveKind) -> Self {
        match k {
            smu_config::WaveKind::Sine => Self::Sine,
            smu_config::WaveKind::Cosine => Self::Cosine,
            smu_config::WaveKind::Square => Self::Square,
            smu_config::WaveKind::Sawtooth => Self::Sawtooth,
            smu_config::WaveKind::Custom => Self::Custom,
        }
    }
}

// ── WaveformParams ───────────────────────────────────────────────────────────

impl From<&smu_config::Waveform> for WaveformParams {
    fn from(w: &smu_config::Waveform) -> Self {
        Self {
            kind: w.kind.into(),
            amplitude_v: w.amplitude_v,
            frequency_hz: w.frequency_hz,
            phase_deg: w.phase_deg,
            offset_v: w.offset_v,
            duty_percent: w.duty_percent,
            starts_high: w.starts_high,
            custom: Vec::new(),
        }
    }
}

// ── RunConfig ────────────────────────────────────────────────────────────────

impl From<&smu_config::Config> for RunConfig {
    fn from(c: &smu_config::Config) -> Self {
        Self {
            resolution_v: c.run.resolution_v,
            repeat_count: c.run.repeat_count.max(1),
            sample_interval: Duration::from_millis(c.timing.sample_interval_ms),
        }
    }
}

// ── SourceProfile ────────────────────────────────────────────────────────────

impl From<&smu_config::Source> for SourceProfile {
    fn from(s: &smu_config::Source) -> Self {
        Self {
            voltage_range_v: s.voltage_range_v,
            current_limit_a: s.current_limit_a,
        }
    }
}

// ── TimingCfg ────────────────────────────────────────────────────────────────

impl From<&smu_config::Timing> for TimingCfg {
    fn from(t: &smu_config::Timing) -> Self {
        Self {
            init_settle: Duration::from_millis(t.init_settle_ms),
            pause_poll: Duration::from_millis(t.pause_poll_ms),
        }
    }
}
