//! Waveform synthesis: a small parameter set → an ordered sample sequence.
//!
//! Pure math, no I/O, no state. Two sampling policies exist on purpose:
//! the preview density (a fixed point count across the whole requested
//! duration, for plotting) and the drive density (a fixed 0.01 s step over
//! one period, for the paced instrument writes). They are not
//! interchangeable; callers pick the one matching their consumer.

use smu_config::defaults;
use std::time::Duration;

/// Preview sampling: this many points per repeated cycle.
pub const PREVIEW_POINTS_PER_CYCLE: usize = 1000;
/// Drive sampling: fixed time step between instrument samples.
pub const DRIVE_STEP_S: f64 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WaveformKind {
    #[default]
    Sine,
    Cosine,
    Square,
    Sawtooth,
    Custom,
}

/// One point of a sample sequence.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplePoint {
    pub time_s: f64,
    pub volts: f64,
}

/// Parameters for one generation call.
///
/// Periodic kinds require `frequency_hz > 0`; anything else falls back to
/// the documented 1 Hz default with a warning rather than dividing by zero.
/// Custom ignores amplitude/frequency/phase and replays `custom` verbatim
/// plus `offset_v`.
#[derive(Debug, Clone)]
pub struct WaveformParams {
    pub kind: WaveformKind,
    pub amplitude_v: f64,
    pub frequency_hz: f64,
    pub phase_deg: f64,
    pub offset_v: f64,
    /// Square only: fraction of the period spent high, in percent.
    pub duty_percent: f64,
    /// Square only: begin the cycle in the high state.
    pub starts_high: bool,
    /// Custom only: points replayed verbatim.
    pub custom: Vec<SamplePoint>,
}

impl Default for WaveformParams {
    fn default() -> Self {
        Self {
            kind: WaveformKind::Sine,
            amplitude_v: defaults::AMPLITUDE_V,
            frequency_hz: defaults::FREQUENCY_HZ,
            phase_deg: defaults::PHASE_DEG,
            offset_v: defaults::OFFSET_V,
            duty_percent: defaults::DUTY_PERCENT,
            starts_high: true,
            custom: Vec::new(),
        }
    }
}

fn effective_frequency(params: &WaveformParams) -> f64 {
    if params.frequency_hz.is_finite() && params.frequency_hz > 0.0 {
        params.frequency_hz
    } else {
        tracing::warn!(
            frequency_hz = params.frequency_hz,
            fallback = defaults::FREQUENCY_HZ,
            "frequency must be > 0; using fallback"
        );
        defaults::FREQUENCY_HZ
    }
}

/// Instantaneous voltage of a periodic waveform at time `t`.
fn voltage_at(params: &WaveformParams, freq: f64, t: f64) -> f64 {
    debug_assert!(params.kind != WaveformKind::Custom);
    let phase = params.phase_deg.to_radians();
    let v = match params.kind {
        WaveformKind::Sine => {
            params.amplitude_v * (std::f64::consts::TAU * freq * t + phase).sin()
        }
        WaveformKind::Cosine => {
            params.amplitude_v * (std::f64::consts::TAU * freq * t + phase).cos()
        }
        WaveformKind::Square => {
            let period = 1.0 / freq;
            let high_time = params.duty_percent / 100.0 * period;
            // Shifting the cycle origin by high_time makes a low-start wave
            // begin in its low phase instead of merely inverting it.
            let lead = if params.starts_high { 0.0 } else { high_time };
            let cycle_pos = (t + lead).rem_euclid(period);
            if cycle_pos < high_time {
                params.amplitude_v
            } else {
                -params.amplitude_v
            }
        }
        WaveformKind::Sawtooth => {
            // Centered sawtooth in [-amplitude, +amplitude]
            params.amplitude_v * 2.0 * (t * freq - (0.5 + t * freq).floor())
        }
        WaveformKind::Custom => 0.0,
    };
    v + params.offset_v
}

fn custom_with_offset(params: &WaveformParams) -> Vec<SamplePoint> {
    params
        .custom
        .iter()
        .map(|p| SamplePoint {
            time_s: p.time_s,
            volts: p.volts + params.offset_v,
        })
        .collect()
}

/// Drive-density sequence: one period sampled at a fixed 0.01 s step over
/// `[0, 1/f)`. This is what the pacing loop writes to the instrument.
pub fn generate_drive(params: &WaveformParams) -> Vec<SamplePoint> {
    if params.kind == WaveformKind::Custom {
        return custom_with_offset(params);
    }
    let freq = effective_frequency(params);
    let period = 1.0 / freq;
    let mut out = Vec::new();
    let mut i = 0usize;
    loop {
        let t = i as f64 * DRIVE_STEP_S;
        if t >= period {
            break;
        }
        out.push(SamplePoint {
            time_s: t,
            volts: voltage_at(params, freq, t),
        });
        i += 1;
    }
    out
}

/// Preview-density sequence: exactly `1000 · repeat_count` points spanning
/// `[0, total_duration]` inclusive, for plotting the full requested run.
pub fn generate_preview(params: &WaveformParams, repeat_count: u32) -> Vec<SamplePoint> {
    if params.kind == WaveformKind::Custom {
        return custom_with_offset(params);
    }
    let freq = effective_frequency(params);
    let repeat = repeat_count.max(1);
    let total = f64::from(repeat) / freq;
    let n = PREVIEW_POINTS_PER_CYCLE * repeat as usize;
    let last = (n - 1) as f64;
    (0..n)
        .map(|i| {
            let t = total * (i as f64) / last;
            SamplePoint {
                time_s: t,
                volts: voltage_at(params, freq, t),
            }
        })
        .collect()
}

/// Total wall-clock span of a run: `repeat_count` periods for periodic
/// kinds, the literal time span of the points for Custom.
pub fn total_duration_s(params: &WaveformParams, repeat_count: u32) -> f64 {
    match params.kind {
        WaveformKind::Custom => match (params.custom.first(), params.custom.last()) {
            (Some(first), Some(last)) => (last.time_s - first.time_s).max(0.0),
            _ => 0.0,
        },
        _ => f64::from(repeat_count.max(1)) / effective_frequency(params),
    }
}

/// Pulse pacing: spread one waveform period across its own sample count,
/// i.e. `interval = 1 / (frequency · sample_count)`.
pub fn pulse_interval(params: &WaveformParams, sample_count: usize) -> Duration {
    let freq = effective_frequency(params);
    let n = sample_count.max(1) as f64;
    Duration::from_secs_f64(1.0 / (freq * n))
}

/// Build custom points from raw table cells. Any row whose two cells do not
/// both parse as finite numbers is silently dropped; the offset is applied
/// later at generation time.
pub fn parse_custom_rows<I, S>(rows: I) -> Vec<SamplePoint>
where
    I: IntoIterator<Item = (S, S)>,
    S: AsRef<str>,
{
    rows.into_iter()
        .filter_map(|(t, v)| {
            let time_s = t.as_ref().trim().parse::<f64>().ok()?;
            let volts = v.as_ref().trim().parse::<f64>().ok()?;
            (time_s.is_finite() && volts.is_finite()).then_some(SamplePoint { time_s, volts })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(amplitude_v: f64, frequency_hz: f64) -> WaveformParams {
        WaveformParams {
            kind: WaveformKind::Sine,
            amplitude_v,
            frequency_hz,
            phase_deg: 0.0,
            offset_v: 0.0,
            ..WaveformParams::default()
        }
    }

    #[test]
    fn sine_starts_at_zero_and_peaks_at_quarter_period() {
        // f = 1 Hz: drive step 0.01 s puts t = 0.25 exactly on sample 25.
        let seq = generate_drive(&sine(2.5, 1.0));
        assert_eq!(seq.len(), 100);
        assert!(seq[0].volts.abs() < 1e-9);
        assert!((seq[25].volts - 2.5).abs() < 1e-9);
    }

    #[test]
    fn drive_density_spans_one_period_half_open() {
        let seq = generate_drive(&sine(1.0, 2.0));
        // period 0.5 s at 0.01 s step: t = 0.00 .. 0.49
        assert_eq!(seq.len(), 50);
        assert!((seq.last().unwrap().time_s - 0.49).abs() < 1e-9);
    }

    #[test]
    fn preview_density_is_1000_points_per_cycle_inclusive() {
        let seq = generate_preview(&sine(1.0, 1.0), 3);
        assert_eq!(seq.len(), 3000);
        assert!(seq[0].time_s.abs() < 1e-12);
        assert!((seq.last().unwrap().time_s - 3.0).abs() < 1e-9);
    }

    #[test]
    fn square_duty_and_start_level() {
        let mut params = WaveformParams {
            kind: WaveformKind::Square,
            amplitude_v: 1.0,
            frequency_hz: 1.0,
            offset_v: 0.5,
            duty_percent: 50.0,
            starts_high: true,
            ..WaveformParams::default()
        };
        let seq = generate_drive(&params);
        assert!((seq[0].volts - 1.5).abs() < 1e-9);
        // just past period/2: low half
        assert!((seq[51].volts - (-0.5)).abs() < 1e-9);

        params.starts_high = false;
        let seq = generate_drive(&params);
        assert!((seq[0].volts - (-0.5)).abs() < 1e-9);
        assert!((seq[51].volts - 1.5).abs() < 1e-9);
    }

    #[test]
    fn sawtooth_rises_from_zero_until_the_wrap() {
        let params = WaveformParams {
            kind: WaveformKind::Sawtooth,
            amplitude_v: 1.0,
            frequency_hz: 1.0,
            offset_v: 0.0,
            ..WaveformParams::default()
        };
        let seq = generate_drive(&params);
        assert!(seq[0].volts.abs() < 1e-9);
        for w in seq[..50].windows(2) {
            assert!(w[1].volts > w[0].volts, "not monotonic before the wrap");
        }
        // wrap at t = 0.5: drops to the negative rail
        assert!(seq[50].volts < seq[49].volts);
    }

    #[test]
    fn custom_rows_parse_permissively() {
        let rows = vec![("0", "1.0"), ("bad", "x"), ("1", "2.0")];
        let points = parse_custom_rows(rows);
        assert_eq!(points.len(), 2);
        assert_eq!(points[0], SamplePoint { time_s: 0.0, volts: 1.0 });
        assert_eq!(points[1], SamplePoint { time_s: 1.0, volts: 2.0 });
    }

    #[test]
    fn custom_sequence_applies_offset_verbatim() {
        let params = WaveformParams {
            kind: WaveformKind::Custom,
            offset_v: 0.5,
            custom: parse_custom_rows(vec![("0", "1.0"), ("1", "2.0")]),
            ..WaveformParams::default()
        };
        let seq = generate_drive(&params);
        assert_eq!(seq.len(), 2);
        assert!((seq[0].volts - 1.5).abs() < 1e-9);
        assert!((seq[1].volts - 2.5).abs() < 1e-9);
        assert!((total_duration_s(&params, 4) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn empty_custom_table_yields_empty_sequence() {
        let params = WaveformParams {
            kind: WaveformKind::Custom,
            custom: parse_custom_rows(vec![("x", "y")]),
            ..WaveformParams::default()
        };
        assert!(generate_drive(&params).is_empty());
        assert_eq!(total_duration_s(&params, 1), 0.0);
    }

    #[test]
    fn non_positive_frequency_falls_back() {
        let seq = generate_drive(&sine(1.0, 0.0));
        assert_eq!(seq.len(), 100);
        assert!((total_duration_s(&sine(1.0, -3.0), 2) - 2.0).abs() < 1e-9);
    }

    #[test]
    fn pulse_interval_spreads_one_period_over_the_samples() {
        let params = sine(1.0, 2.0);
        let n = generate_drive(&params).len();
        let interval = pulse_interval(&params, n);
        assert!((interval.as_secs_f64() - 1.0 / (2.0 * n as f64)).abs() < 1e-12);
    }
}
