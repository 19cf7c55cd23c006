use rstest::rstest;
use smu_core::controller::{RunConfig, RunController, RunOutcome, RunPlan};
use smu_core::orchestrator::{DevicePair, SequenceOrder};
use smu_core::waveform::{WaveformKind, WaveformParams};
use smu_traits::InstrumentLink;
use std::error::Error;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Tags every command with its device so cross-device ordering is visible
/// in one shared trace.
#[derive(Clone, Default)]
struct SharedTrace(Arc<Mutex<Vec<String>>>);

impl SharedTrace {
    fn snapshot(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

struct TracedLink {
    tag: &'static str,
    trace: SharedTrace,
    is_connected: bool,
    fail_writes: bool,
}

impl TracedLink {
    fn new(tag: &'static str, trace: &SharedTrace) -> Self {
        Self {
            tag,
            trace: trace.clone(),
            is_connected: true,
            fail_writes: false,
        }
    }
}

impl TracedLink {
    fn record(&self, command: &str) {
        self.trace
            .0
            .lock()
            .unwrap()
            .push(format!("{}:{}", self.tag, command));
    }
}

impl InstrumentLink for TracedLink {
    fn connected(&self) -> bool {
        self.is_connected
    }
    fn write(&mut self, command: &str) -> Result<(), Box<dyn Error + Send + Sync>> {
        if self.fail_writes {
            return Err(Box::new(std::io::Error::other("link down")));
        }
        self.record(command);
        Ok(())
    }
    fn query(&mut self, command: &str) -> Result<String, Box<dyn Error + Send + Sync>> {
        self.record(command);
        Ok("1".into())
    }
}

fn quick_plan() -> RunPlan {
    RunPlan {
        params: WaveformParams {
            kind: WaveformKind::Sine,
            frequency_hz: 10.0,
            ..WaveformParams::default()
        },
        config: RunConfig {
            sample_interval: Duration::ZERO,
            ..RunConfig::default()
        },
    }
}

fn make_pair(a: TracedLink, b: TracedLink) -> DevicePair<TracedLink, TracedLink> {
    DevicePair::new(RunController::new("a", a), RunController::new("b", b))
        .with_handoff_settle(Duration::from_millis(1))
}

#[rstest]
#[case(SequenceOrder::FirstThenSecond, "a", "b")]
#[case(SequenceOrder::SecondThenFirst, "b", "a")]
fn trailing_device_starts_only_after_leading_finishes(
    #[case] order: SequenceOrder,
    #[case] lead_tag: &str,
    #[case] follow_tag: &str,
) {
    let trace = SharedTrace::default();
    let mut pair = make_pair(TracedLink::new("a", &trace), TracedLink::new("b", &trace));

    let report = pair
        .run_sequence(order, &quick_plan(), &quick_plan())
        .expect("sequence succeeds");
    assert!(matches!(report.lead, RunOutcome::Completed { .. }));
    assert!(matches!(report.follow, RunOutcome::Completed { .. }));

    let cmds = trace.snapshot();
    let first_follow_idx = cmds
        .iter()
        .position(|c| c.starts_with(follow_tag))
        .expect("trailing device issued commands");
    let last_lead_idx = cmds
        .iter()
        .rposition(|c| c.starts_with(lead_tag))
        .expect("leading device issued commands");
    assert!(
        last_lead_idx < first_follow_idx,
        "trailing device started before the leading run wound down"
    );
}

#[rstest]
fn simulated_pair_still_sequences_exactly_once() {
    let trace = SharedTrace::default();
    let mut a = TracedLink::new("a", &trace);
    let mut b = TracedLink::new("b", &trace);
    a.is_connected = false;
    b.is_connected = false;
    let mut pair = make_pair(a, b);

    let report = pair
        .run_sequence(SequenceOrder::FirstThenSecond, &quick_plan(), &quick_plan())
        .expect("sequence succeeds");
    assert!(matches!(report.lead, RunOutcome::Simulated { .. }));
    assert!(matches!(report.follow, RunOutcome::Simulated { .. }));
    assert!(trace.snapshot().is_empty(), "simulated runs must not write");

    // one outcome per controller, both consumed by the sequencer
    assert!(pair.first().completion_events().try_recv().is_err());
    assert!(pair.second().completion_events().try_recv().is_err());
}

#[rstest]
fn leading_failure_still_releases_the_trailing_device() {
    let trace = SharedTrace::default();
    let mut a = TracedLink::new("a", &trace);
    a.fail_writes = true;
    let b = TracedLink::new("b", &trace);
    let mut pair = make_pair(a, b);

    let report = pair
        .run_sequence(SequenceOrder::FirstThenSecond, &quick_plan(), &quick_plan())
        .expect("sequencing survives a failed lead run");
    assert!(matches!(report.lead, RunOutcome::Failed { .. }));
    assert!(matches!(report.follow, RunOutcome::Completed { .. }));

    let cmds = trace.snapshot();
    assert!(cmds.iter().all(|c| !c.starts_with("a:")), "lead writes all failed");
    assert!(cmds.iter().any(|c| c.starts_with("b:")), "follow device ran");
}

#[rstest]
fn mixed_simulated_and_real_pair_keeps_the_order() {
    let trace = SharedTrace::default();
    let mut a = TracedLink::new("a", &trace);
    a.is_connected = false;
    let b = TracedLink::new("b", &trace);
    let mut pair = make_pair(a, b);

    let report = pair
        .run_sequence(SequenceOrder::FirstThenSecond, &quick_plan(), &quick_plan())
        .expect("sequence succeeds");
    assert!(matches!(report.lead, RunOutcome::Simulated { .. }));
    assert!(matches!(report.follow, RunOutcome::Completed { .. }));
}
