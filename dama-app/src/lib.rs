//! DAMA Demo Application
//!
//! A per-tick sequencer driving the frame allocator, plus a seeded synthetic
//! traffic source for running it without real terminals.

pub mod sequencer;
pub mod traffic;

pub use sequencer::{DemoSequencer, SequencerConfig, TickReport};
pub use traffic::{TrafficGenerator, TrafficProfile};
