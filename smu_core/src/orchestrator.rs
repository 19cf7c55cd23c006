//! Strict two-device sequencing.
//!
//! Exactly two controllers, exactly one ordering guarantee: the trailing
//! device's run does not begin until the leading device has published its
//! terminal outcome (completed, failed or simulated alike) and a settle
//! delay has passed. The gate is the controller's one-shot completion
//! event, so at-most-once triggering holds by construction: the sequencer
//! consumes a single event and nothing re-arms it.

use crate::controller::{RunController, RunOutcome, RunPlan};
use crate::error::{Report, Result, RunError};
use smu_traits::InstrumentLink;
use smu_traits::clock::{Clock, MonotonicClock};
use std::sync::Arc;
use std::time::Duration;

/// Which of the two controllers starts first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceOrder {
    FirstThenSecond,
    SecondThenFirst,
}

/// Outcomes of one chained run, in execution order.
#[derive(Debug, Clone)]
pub struct SequenceReport {
    pub order: SequenceOrder,
    pub lead: RunOutcome,
    pub follow: RunOutcome,
}

/// Two independently owned controllers chained into a strict sequence.
/// Each keeps exclusive ownership of its own link; the only shared state
/// between them is the completion event the sequencer gates on.
pub struct DevicePair<A: InstrumentLink, B: InstrumentLink> {
    first: RunController<A>,
    second: RunController<B>,
    handoff_settle: Duration,
    clock: Arc<dyn Clock + Send + Sync>,
}

impl<A, B> DevicePair<A, B>
where
    A: InstrumentLink + Send,
    B: InstrumentLink + Send,
{
    pub fn new(first: RunController<A>, second: RunController<B>) -> Self {
        Self {
            first,
            second,
            handoff_settle: Duration::from_millis(120),
            clock: Arc::new(MonotonicClock::new()),
        }
    }

    /// Settle delay between the leading run finishing and the trailing run
    /// starting; gives the first instrument time to clear its buffers.
    pub fn with_handoff_settle(mut self, delay: Duration) -> Self {
        self.handoff_settle = delay;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock + Send + Sync>) -> Self {
        self.clock = clock;
        self
    }

    pub fn first(&self) -> &RunController<A> {
        &self.first
    }

    pub fn second(&self) -> &RunController<B> {
        &self.second
    }

    pub fn first_mut(&mut self) -> &mut RunController<A> {
        &mut self.first
    }

    pub fn second_mut(&mut self) -> &mut RunController<B> {
        &mut self.second
    }

    /// Run both devices strictly in sequence. Individual run failures are
    /// captured in the report, not raised: the sequencing itself succeeded
    /// as long as the ordering guarantee held.
    pub fn run_sequence(
        &mut self,
        order: SequenceOrder,
        plan_a: &RunPlan,
        plan_b: &RunPlan,
    ) -> Result<SequenceReport> {
        tracing::info!(?order, "sequence start");
        let settle = self.handoff_settle;
        let clock = Arc::clone(&self.clock);
        let (lead, follow) = match order {
            SequenceOrder::FirstThenSecond => {
                run_gated(&mut self.first, plan_a, &mut self.second, plan_b, settle, &clock)?
            }
            SequenceOrder::SecondThenFirst => {
                run_gated(&mut self.second, plan_b, &mut self.first, plan_a, settle, &clock)?
            }
        };
        tracing::info!(?order, "sequence finished");
        Ok(SequenceReport {
            order,
            lead,
            follow,
        })
    }
}

/// Drive `lead` on its own thread, block on its completion event, wait the
/// settle delay, then drive `follow`. The trailing run cannot begin before
/// the leading controller has reached a terminal state because the event
/// is published only from there.
fn run_gated<X, Y>(
    lead: &mut RunController<X>,
    lead_plan: &RunPlan,
    follow: &mut RunController<Y>,
    follow_plan: &RunPlan,
    settle: Duration,
    clock: &Arc<dyn Clock + Send + Sync>,
) -> Result<(RunOutcome, RunOutcome)>
where
    X: InstrumentLink + Send,
    Y: InstrumentLink + Send,
{
    let lead_done = lead.completion_events();
    // A leftover event from an earlier, unobserved run must not satisfy
    // this gate.
    while lead_done.try_recv().is_ok() {}

    let lead_outcome = std::thread::scope(|scope| -> Result<RunOutcome> {
        let handle = scope.spawn(|| {
            // A failed run publishes its outcome before erroring out; the
            // event below carries everything the sequencer needs.
            let _ = lead.start(lead_plan);
        });
        let outcome = lead_done.recv().map_err(|_| {
            Report::new(RunError::State(
                "leading run ended without publishing an outcome".into(),
            ))
        })?;
        if handle.join().is_err() {
            tracing::warn!("leading run thread panicked after publishing its outcome");
        }
        Ok(outcome)
    })?;

    clock.sleep(settle);

    let follow_done = follow.completion_events();
    let _ = follow.start(follow_plan);
    let follow_outcome = follow_done.try_recv().map_err(|_| {
        Report::new(RunError::State(
            "trailing run ended without publishing an outcome".into(),
        ))
    })?;

    Ok((lead_outcome, follow_outcome))
}
