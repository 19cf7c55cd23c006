#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Waveform synthesis and command-sequencing engine (transport-agnostic).
//!
//! This crate drives a programmable voltage source through a caller-defined
//! waveform, one quantized sample at a time. All device interaction goes
//! through the `smu_traits::InstrumentLink` trait.
//!
//! ## Architecture
//!
//! - **Synthesis**: parameters → ordered (time, voltage) samples (`waveform`)
//! - **Quantization**: nearest-multiple rounding to the settable resolution
//!   (`quantize`)
//! - **Control**: per-device state machine with a paced write loop and
//!   cooperative pause/stop (`controller`)
//! - **Sequencing**: strict two-device handoff gated on a one-shot
//!   completion event (`orchestrator`)
//! - **Vocabulary**: the exact SCPI strings the instrument expects (`scpi`)

pub mod controller;
pub mod conversions;
pub mod error;
pub mod mocks;
pub mod orchestrator;
pub mod quantize;
pub mod scpi;
pub mod waveform;

pub use controller::{
    RunConfig, RunController, RunControls, RunOutcome, RunPlan, RunState, SourceProfile, TimingCfg,
};
pub use error::{Result, RunError};
pub use orchestrator::{DevicePair, SequenceOrder, SequenceReport};
pub use quantize::quantize;
pub use waveform::{SamplePoint, WaveformKind, WaveformParams};
