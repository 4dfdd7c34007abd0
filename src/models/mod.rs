//! Domain models for the run-control session.

pub mod app;
pub mod command;
pub mod outcome;
pub mod session;
pub mod state;
