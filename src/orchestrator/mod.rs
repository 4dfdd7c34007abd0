//! Session orchestration modules.
//!
//! Covers roster generation, the child registry, concurrent command
//! fan-out, the session controller and the fail-fast command sequencer.

pub mod controller;
pub mod coordinator;
pub mod registry;
pub mod roster;
pub mod sequencer;

pub use controller::SessionController;
pub use sequencer::{parse_steps, CommandSequencer, SequenceReport, Step};
