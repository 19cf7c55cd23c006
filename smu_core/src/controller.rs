//! Per-device run control.
//!
//! A `RunController` owns exactly one instrument link and drives it through
//! the init protocol and the paced sample loop. Control (pause/stop) and
//! observation (state) go through a cloneable `RunControls` handle whose
//! flags the loop samples at sample boundaries; terminal outcomes are
//! published on a completion channel so a sequencer can gate on them.

use crate::error::{Report, Result, RunError};
use crate::quantize::quantize;
use crate::scpi;
use crate::waveform::{self, SamplePoint, WaveformParams};
use crossbeam_channel as xch;
use smu_config::defaults;
use smu_traits::InstrumentLink;
use smu_traits::clock::{Clock, MonotonicClock};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::time::Duration;

/// Lifecycle of one run. `Stopped`, `Completed` and `Failed` are terminal;
/// the state is re-armed to `Idle` at the start of every `start` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RunState {
    Idle = 0,
    Initializing = 1,
    Running = 2,
    Paused = 3,
    Stopped = 4,
    Completed = 5,
    Failed = 6,
}

impl RunState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => Self::Idle,
            1 => Self::Initializing,
            2 => Self::Running,
            3 => Self::Paused,
            4 => Self::Stopped,
            5 => Self::Completed,
            _ => Self::Failed,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Stopped | Self::Completed | Self::Failed)
    }
}

/// Cloneable control handle shared between the pacing loop and whoever
/// drives it (CLI, sequencer, tests).
///
/// Pause and stop are level-triggered flags, not interrupts: the loop
/// samples them at sample boundaries, so either resolves within one sample
/// interval rather than instantly.
#[derive(Debug, Clone, Default)]
pub struct RunControls {
    state: Arc<AtomicU8>,
    pause: Arc<AtomicBool>,
    stop: Arc<AtomicBool>,
}

impl RunControls {
    pub fn state(&self) -> RunState {
        RunState::from_u8(self.state.load(Ordering::Relaxed))
    }

    /// Flip between `Running` and `Paused`; returns true when now pausing.
    pub fn toggle_pause(&self) -> bool {
        !self.pause.fetch_xor(true, Ordering::Relaxed)
    }

    /// Level-triggered stop request, observed at the next sample boundary.
    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::Relaxed);
    }

    pub fn pause_requested(&self) -> bool {
        self.pause.load(Ordering::Relaxed)
    }

    pub fn stop_requested(&self) -> bool {
        self.stop.load(Ordering::Relaxed)
    }

    /// Reset flags and state for a fresh run.
    fn arm(&self) {
        self.pause.store(false, Ordering::Relaxed);
        self.stop.store(false, Ordering::Relaxed);
        self.set_state(RunState::Idle);
    }

    fn set_state(&self, state: RunState) {
        self.state.store(state as u8, Ordering::Relaxed);
    }
}

/// Quantization, repeat and pacing knobs for one run.
#[derive(Debug, Clone, Copy)]
pub struct RunConfig {
    /// Quantization granularity for set-voltage writes (V); must be > 0,
    /// clamped to the documented default otherwise.
    pub resolution_v: f64,
    /// Full passes over the sample sequence; at least 1.
    pub repeat_count: u32,
    /// Pacing delay between writes. Pulse runs ignore this and derive
    /// their own interval from the waveform.
    pub sample_interval: Duration,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            resolution_v: defaults::RESOLUTION_V,
            repeat_count: defaults::REPEAT_COUNT,
            sample_interval: Duration::from_millis(20),
        }
    }
}

/// Everything one run request carries.
#[derive(Debug, Clone, Default)]
pub struct RunPlan {
    pub params: WaveformParams,
    pub config: RunConfig,
}

/// Source settings programmed during the init protocol.
#[derive(Debug, Clone, Copy)]
pub struct SourceProfile {
    pub voltage_range_v: f64,
    pub current_limit_a: f64,
}

impl Default for SourceProfile {
    fn default() -> Self {
        Self {
            voltage_range_v: 20.0,
            current_limit_a: 0.1,
        }
    }
}

/// Empirical hardware delays. Configurable defaults, not invariants.
#[derive(Debug, Clone, Copy)]
pub struct TimingCfg {
    /// Settle wait after output enable during init.
    pub init_settle: Duration,
    /// Poll interval while a run is paused.
    pub pause_poll: Duration,
}

impl Default for TimingCfg {
    fn default() -> Self {
        Self {
            init_settle: Duration::from_millis(100),
            pause_poll: Duration::from_millis(50),
        }
    }
}

/// Terminal result of one run; exactly one is published per `start` call.
#[derive(Debug, Clone)]
pub enum RunOutcome {
    /// The full repeat schedule was written out.
    Completed { writes: usize, duration_s: f64 },
    /// No live link: state transitions only, zero writes.
    Simulated { duration_s: f64 },
    /// A stop request ended the run before the schedule finished.
    Stopped { writes: usize },
    /// A link command failed mid-run.
    Failed { error: RunError },
}

/// Drives one instrument through paced waveform runs.
pub struct RunController<L: InstrumentLink> {
    name: String,
    link: L,
    profile: SourceProfile,
    timing: TimingCfg,
    clock: Arc<dyn Clock + Send + Sync>,
    controls: RunControls,
    done_tx: xch::Sender<RunOutcome>,
    done_rx: xch::Receiver<RunOutcome>,
}

impl<L: InstrumentLink> RunController<L> {
    pub fn new(name: impl Into<String>, link: L) -> Self {
        let (done_tx, done_rx) = xch::unbounded();
        Self {
            name: name.into(),
            link,
            profile: SourceProfile::default(),
            timing: TimingCfg::default(),
            clock: Arc::new(MonotonicClock::new()),
            controls: RunControls::default(),
            done_tx,
            done_rx,
        }
    }

    pub fn with_profile(mut self, profile: SourceProfile) -> Self {
        self.profile = profile;
        self
    }

    pub fn with_timing(mut self, timing: TimingCfg) -> Self {
        self.timing = timing;
        self
    }

    /// Provide a custom clock; defaults to the real monotonic clock.
    pub fn with_clock(mut self, clock: Arc<dyn Clock + Send + Sync>) -> Self {
        self.clock = clock;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Control handle for pause/stop and state observation.
    pub fn controls(&self) -> RunControls {
        self.controls.clone()
    }

    pub fn state(&self) -> RunState {
        self.controls.state()
    }

    /// Receiver for terminal run outcomes. Every `start` publishes exactly
    /// one event, including failed and simulated runs, so a listener
    /// gating on it can never be left waiting.
    pub fn completion_events(&self) -> xch::Receiver<RunOutcome> {
        self.done_rx.clone()
    }

    /// Run the plan to a terminal state.
    ///
    /// With no live link this is the offline/demo path: the total duration
    /// is reported and the run jumps straight to `Completed` without a
    /// single write. Otherwise the device is reset and configured, the
    /// sequence is regenerated (parameters may have changed since the last
    /// run) and paced out sample by sample.
    pub fn start(&mut self, plan: &RunPlan) -> Result<RunOutcome> {
        self.controls.arm();
        self.drain_stale_events();
        let duration_s = waveform::total_duration_s(&plan.params, plan.config.repeat_count);

        if !self.link.connected() {
            tracing::info!(device = %self.name, duration_s, "no live link; simulating run");
            self.controls.set_state(RunState::Completed);
            let outcome = RunOutcome::Simulated { duration_s };
            self.emit(&outcome);
            return Ok(outcome);
        }

        let sequence = waveform::generate_drive(&plan.params);

        self.controls.set_state(RunState::Initializing);
        if let Err(e) = self.initialize() {
            return self.fail(e);
        }

        tracing::info!(
            device = %self.name,
            samples = sequence.len(),
            repeats = plan.config.repeat_count,
            interval_ms = plan.config.sample_interval.as_millis() as u64,
            duration_s,
            "run start"
        );
        self.controls.set_state(RunState::Running);
        let writes = match self.pace(&sequence, &plan.config, plan.config.sample_interval) {
            Ok(writes) => writes,
            Err(e) => return self.fail(e),
        };

        // Wind down: output off, then drain the device's command buffer so
        // a dependent device never starts against a half-flushed instrument.
        if let Err(e) = self.write(scpi::OUTPUT_OFF) {
            return self.fail(e);
        }
        if let Err(e) = self.link.query(scpi::OPERATION_COMPLETE_QUERY) {
            tracing::warn!(device = %self.name, error = %e, "completion barrier query failed; proceeding");
        }

        let outcome = if self.controls.stop_requested() {
            self.controls.set_state(RunState::Stopped);
            tracing::info!(device = %self.name, writes, "run stopped");
            RunOutcome::Stopped { writes }
        } else {
            self.controls.set_state(RunState::Completed);
            tracing::info!(device = %self.name, writes, "run complete");
            RunOutcome::Completed { writes, duration_s }
        };
        self.emit(&outcome);
        Ok(outcome)
    }

    /// One-shot: configure the source, set a single fixed voltage, enable
    /// the output. No pacing loop, no pause/stop, no completion event.
    pub fn apply_steady(&mut self, volts: f64) -> Result<()> {
        if !volts.is_finite() {
            return Err(Report::new(RunError::InvalidParameter(format!(
                "steady voltage must be finite, got {volts}"
            ))));
        }
        if !self.link.connected() {
            tracing::info!(device = %self.name, volts, "no live link; steady voltage simulated");
            return Ok(());
        }
        match self.steady_protocol(volts) {
            Ok(()) => {
                tracing::info!(device = %self.name, volts, "steady voltage applied");
                Ok(())
            }
            Err(e) => {
                let _ = self.link.write(scpi::OUTPUT_OFF);
                tracing::error!(device = %self.name, error = %e, "steady voltage failed");
                Err(Report::new(e))
            }
        }
    }

    /// Replay the plan against an already-configured device, pacing at the
    /// waveform's own rate (`1 / (frequency · sample_count)`). No init
    /// protocol, no output disable, no completion event; pause/stop work
    /// exactly as in `start`. Returns the number of writes issued.
    pub fn apply_pulse(&mut self, plan: &RunPlan) -> Result<usize> {
        if !self.link.connected() {
            tracing::info!(device = %self.name, "no live link; pulse simulated");
            return Ok(0);
        }
        let sequence = waveform::generate_drive(&plan.params);
        if sequence.is_empty() {
            tracing::warn!(device = %self.name, "empty sequence; pulse is a no-op");
            return Ok(0);
        }
        let interval = waveform::pulse_interval(&plan.params, sequence.len());

        self.controls.arm();
        self.controls.set_state(RunState::Running);
        tracing::info!(
            device = %self.name,
            samples = sequence.len(),
            repeats = plan.config.repeat_count,
            interval_us = interval.as_micros() as u64,
            "pulse start"
        );
        match self.pace(&sequence, &plan.config, interval) {
            Ok(writes) => {
                if self.controls.stop_requested() {
                    self.controls.set_state(RunState::Stopped);
                } else {
                    self.controls.set_state(RunState::Completed);
                }
                tracing::info!(device = %self.name, writes, "pulse finished");
                Ok(writes)
            }
            Err(e) => {
                let _ = self.link.write(scpi::OUTPUT_OFF);
                tracing::error!(device = %self.name, error = %e, "pulse failed");
                self.controls.set_state(RunState::Failed);
                Err(Report::new(e))
            }
        }
    }

    /// Reset/configure protocol, output enable, settle, status probe.
    fn initialize(&mut self) -> std::result::Result<(), RunError> {
        self.configure_source()?;
        self.write(scpi::OUTPUT_ON)?;
        self.clock.sleep(self.timing.init_settle);
        match self.link.query(scpi::OUTPUT_STATE_QUERY) {
            Ok(status) => {
                tracing::debug!(device = %self.name, status = status.trim(), "output status");
            }
            Err(e) => {
                tracing::warn!(device = %self.name, error = %e, "output status probe failed; proceeding");
            }
        }
        Ok(())
    }

    /// Shared configuration prologue; the command order matters to the
    /// device.
    fn configure_source(&mut self) -> std::result::Result<(), RunError> {
        self.write(scpi::RESET)?;
        self.write(scpi::CLEAR_STATUS)?;
        self.write(scpi::SOURCE_FUNCTION_VOLTAGE)?;
        self.write(&scpi::voltage_range(self.profile.voltage_range_v))?;
        self.write(scpi::VOLTAGE_MODE_FIXED)?;
        self.write(&scpi::current_protection(self.profile.current_limit_a))?;
        Ok(())
    }

    /// Steady mode sets the voltage before enabling the output.
    fn steady_protocol(&mut self, volts: f64) -> std::result::Result<(), RunError> {
        self.configure_source()?;
        self.write(&scpi::set_voltage(volts))?;
        self.write(scpi::OUTPUT_ON)?;
        Ok(())
    }

    /// The pacing loop: quantize, write, sleep, once per sample per pass.
    /// Stop is observed at sample boundaries only; pause suspends sample
    /// production without ending the run.
    fn pace(
        &mut self,
        sequence: &[SamplePoint],
        config: &RunConfig,
        interval: Duration,
    ) -> std::result::Result<usize, RunError> {
        let repeats = config.repeat_count.max(1);
        // Sanitize once so a misconfigured resolution warns once, not once
        // per sample.
        let resolution_v = crate::quantize::effective_resolution(config.resolution_v);
        let mut writes = 0usize;
        'passes: for _ in 0..repeats {
            for sample in sequence {
                if self.controls.stop_requested() {
                    break 'passes;
                }
                self.hold_while_paused();
                if self.controls.stop_requested() {
                    break 'passes;
                }
                let volts = quantize(sample.volts, resolution_v);
                self.write(&scpi::set_voltage(volts))?;
                writes += 1;
                self.clock.sleep(interval);
            }
        }
        Ok(writes)
    }

    /// Suspend sample production while the pause flag is set. Stop still
    /// wins: the poll exits as soon as either flag changes.
    fn hold_while_paused(&mut self) {
        if !self.controls.pause_requested() {
            return;
        }
        self.controls.set_state(RunState::Paused);
        tracing::info!(device = %self.name, "run paused");
        while self.controls.pause_requested() && !self.controls.stop_requested() {
            self.clock.sleep(self.timing.pause_poll);
        }
        if !self.controls.stop_requested() {
            self.controls.set_state(RunState::Running);
            tracing::info!(device = %self.name, "run resumed");
        }
    }

    fn write(&mut self, command: &str) -> std::result::Result<(), RunError> {
        self.link
            .write(command)
            .map_err(|e| RunError::Communication(e.to_string()))
    }

    /// Terminal failure path: best-effort output disable that must not mask
    /// the original error, then publish and surface it.
    fn fail(&mut self, error: RunError) -> Result<RunOutcome> {
        let _ = self.link.write(scpi::OUTPUT_OFF);
        tracing::error!(device = %self.name, error = %error, "run failed");
        self.controls.set_state(RunState::Failed);
        self.emit(&RunOutcome::Failed {
            error: error.clone(),
        });
        Err(Report::new(error))
    }

    fn emit(&self, outcome: &RunOutcome) {
        // The controller keeps one receiver alive itself, so the send
        // cannot fail and listeners see exactly one event per run.
        let _ = self.done_tx.send(outcome.clone());
    }

    /// Discard outcomes nobody consumed from earlier runs so a listener
    /// gating on this run cannot be satisfied by a stale event.
    fn drain_stale_events(&self) {
        while self.done_rx.try_recv().is_ok() {}
    }
}

impl<L: InstrumentLink> core::fmt::Debug for RunController<L> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RunController")
            .field("name", &self.name)
            .field("connected", &self.link.connected())
            .field("state", &self.state())
            .finish()
    }
}
