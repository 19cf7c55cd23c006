//! Command execution: link assembly, plan building, run dispatch.

use crate::cli::{DeviceArg, JSON_MODE, OrderArg, WaveArg, WaveOpts};
use eyre::WrapErr;
use smu_config::Config;
use smu_core::controller::{RunController, RunControls, RunOutcome, RunPlan};
use smu_core::orchestrator::{DevicePair, SequenceOrder};
use smu_core::waveform::{self, WaveformKind, WaveformParams};
use smu_traits::InstrumentLink;
use std::time::Duration;

type DynLink = Box<dyn InstrumentLink + Send>;

impl From<WaveArg> for WaveformKind {
    fn from(w: WaveArg) -> Self {
        match w {
            WaveArg::Sine => Self::Sine,
            WaveArg::Cosine => Self::Cosine,
            WaveArg::Square => Self::Square,
            WaveArg::Sawtooth => Self::Sawtooth,
            WaveArg::Custom => Self::Custom,
        }
    }
}

impl From<OrderArg> for SequenceOrder {
    fn from(o: OrderArg) -> Self {
        match o {
            OrderArg::FirstThenSecond => Self::FirstThenSecond,
            OrderArg::SecondThenFirst => Self::SecondThenFirst,
        }
    }
}

/// Merge config defaults with CLI overrides into one run plan.
pub fn build_plan(cfg: &Config, wave: &WaveOpts) -> eyre::Result<RunPlan> {
    let mut params: WaveformParams = (&cfg.waveform).into();
    if let Some(kind) = wave.waveform {
        params.kind = kind.into();
    }
    if let Some(v) = wave.amplitude {
        params.amplitude_v = v;
    }
    if let Some(v) = wave.frequency {
        params.frequency_hz = v;
    }
    if let Some(v) = wave.phase {
        params.phase_deg = v;
    }
    if let Some(v) = wave.offset {
        params.offset_v = v;
    }
    if let Some(v) = wave.duty {
        params.duty_percent = v;
    }
    if wave.start_low {
        params.starts_high = false;
    }
    if params.kind == WaveformKind::Custom {
        let rows = match &wave.table {
            Some(path) => smu_config::load_custom_table_csv(path)
                .wrap_err("load custom waveform table")?,
            None => Vec::new(),
        };
        params.custom = waveform::parse_custom_rows(rows);
        if params.custom.is_empty() {
            tracing::warn!("custom table has no valid rows; the run will be a no-op");
        }
    }

    let mut config: smu_core::RunConfig = cfg.into();
    if let Some(v) = wave.resolution {
        config.resolution_v = v;
    }
    if let Some(n) = wave.repeat {
        config.repeat_count = n.max(1);
    }
    Ok(RunPlan { params, config })
}

fn open_link(resource: &str, baud: u32, simulate: bool) -> DynLink {
    if simulate {
        return Box::new(smu_hardware::SimulatedInstrument::new());
    }
    #[cfg(feature = "hardware")]
    {
        match smu_hardware::SerialInstrument::open(resource, baud) {
            Ok(link) => return Box::new(link),
            Err(e) => {
                tracing::warn!(resource, error = %e, "instrument not connected; running in demo mode");
            }
        }
    }
    #[cfg(not(feature = "hardware"))]
    {
        let _ = baud;
        tracing::warn!(resource, "built without the hardware feature; running in demo mode");
    }
    Box::new(smu_hardware::OfflineInstrument)
}

fn controller(cfg: &Config, device: DeviceArg, simulate: bool) -> RunController<DynLink> {
    let resource = match device {
        DeviceArg::First => &cfg.instruments.first,
        DeviceArg::Second => &cfg.instruments.second,
    };
    RunController::new(device.name(), open_link(resource, cfg.instruments.baud, simulate))
        .with_profile((&cfg.source).into())
        .with_timing((&cfg.timing).into())
}

/// Ctrl-C requests a cooperative stop; the loop honors it at the next
/// sample boundary.
fn install_stop_handler(controls: Vec<RunControls>) -> eyre::Result<()> {
    ctrlc::set_handler(move || {
        tracing::warn!("stop requested; finishing at the next sample boundary");
        for c in &controls {
            c.request_stop();
        }
    })
    .wrap_err("install Ctrl-C handler")
}

fn json_mode() -> bool {
    JSON_MODE.get().copied().unwrap_or(false)
}

fn report_outcome(device: &str, outcome: &RunOutcome) {
    if json_mode() {
        let line = match outcome {
            RunOutcome::Completed { writes, duration_s } => serde_json::json!({
                "device": device, "outcome": "completed",
                "writes": writes, "duration_s": duration_s,
            }),
            RunOutcome::Simulated { duration_s } => serde_json::json!({
                "device": device, "outcome": "simulated", "duration_s": duration_s,
            }),
            RunOutcome::Stopped { writes } => serde_json::json!({
                "device": device, "outcome": "stopped", "writes": writes,
            }),
            RunOutcome::Failed { error } => serde_json::json!({
                "device": device, "outcome": "failed", "error": error.to_string(),
            }),
        };
        println!("{line}");
        return;
    }
    match outcome {
        RunOutcome::Completed { writes, duration_s } => {
            println!("{device}: completed ({writes} writes, {duration_s:.2} s)");
        }
        RunOutcome::Simulated { duration_s } => {
            println!("{device}: simulated (duration {duration_s:.2} s)");
        }
        RunOutcome::Stopped { writes } => {
            println!("{device}: stopped after {writes} writes");
        }
        RunOutcome::Failed { error } => println!("{device}: failed: {error}"),
    }
}

pub fn preview(cfg: &Config, wave: &WaveOpts) -> eyre::Result<()> {
    let plan = build_plan(cfg, wave)?;
    let samples = waveform::generate_preview(&plan.params, plan.config.repeat_count);
    let duration = waveform::total_duration_s(&plan.params, plan.config.repeat_count);

    if json_mode() {
        println!(
            "{}",
            serde_json::json!({
                "samples": samples.len(),
                "total_duration_s": duration,
            })
        );
        return Ok(());
    }

    println!("{} samples", samples.len());
    for p in samples.iter().take(3) {
        println!("  t={:.4}s  v={:.4}V", p.time_s, p.volts);
    }
    if samples.len() > 3 {
        println!("  ...");
        if let Some(p) = samples.last() {
            println!("  t={:.4}s  v={:.4}V", p.time_s, p.volts);
        }
    }
    println!("Total Duration: {duration:.2} s");
    Ok(())
}

pub fn run_waveform(
    cfg: &Config,
    wave: &WaveOpts,
    device: DeviceArg,
    simulate: bool,
) -> eyre::Result<()> {
    let plan = build_plan(cfg, wave)?;
    let mut ctl = controller(cfg, device, simulate);
    install_stop_handler(vec![ctl.controls()])?;
    let outcome = ctl.start(&plan)?;
    report_outcome(device.name(), &outcome);
    Ok(())
}

pub fn steady(
    cfg: &Config,
    volts: Option<&str>,
    device: DeviceArg,
    simulate: bool,
) -> eyre::Result<()> {
    // The voltage field is free text on purpose: non-numeric input falls
    // back to the documented default instead of aborting.
    let volts = smu_config::parse::f64_or(
        volts.unwrap_or_default(),
        smu_config::defaults::STEADY_VOLTS,
    );
    let mut ctl = controller(cfg, device, simulate);
    ctl.apply_steady(volts)?;
    println!("{}: steady voltage {volts:.2} V applied", device.name());
    Ok(())
}

pub fn pulse(cfg: &Config, wave: &WaveOpts, device: DeviceArg, simulate: bool) -> eyre::Result<()> {
    let plan = build_plan(cfg, wave)?;
    let mut ctl = controller(cfg, device, simulate);
    install_stop_handler(vec![ctl.controls()])?;
    let writes = ctl.apply_pulse(&plan)?;
    println!("{}: pulse finished ({writes} writes)", device.name());
    Ok(())
}

pub fn sequence(
    cfg: &Config,
    wave: &WaveOpts,
    order: OrderArg,
    simulate: bool,
) -> eyre::Result<()> {
    let plan = build_plan(cfg, wave)?;
    let first = controller(cfg, DeviceArg::First, simulate);
    let second = controller(cfg, DeviceArg::Second, simulate);
    install_stop_handler(vec![first.controls(), second.controls()])?;

    let mut pair = DevicePair::new(first, second)
        .with_handoff_settle(Duration::from_millis(cfg.timing.handoff_settle_ms));
    let report = pair.run_sequence(order.into(), &plan, &plan)?;
    report_outcome("lead", &report.lead);
    report_outcome("follow", &report.follow);
    Ok(())
}
