//! Run control for a DAQ partition.
//!
//! A partition is a set of child applications driven together through a
//! fixed lifecycle (`boot`, `conf`, `start`, ... `terminate`). The
//! [`orchestrator::SessionController`] enforces the command order, fans each
//! command out to every child and advances only when all of them agree.

#![forbid(unsafe_code)]

pub mod audit;
pub mod child;
pub mod config;
pub mod errors;
pub mod logcheck;
pub mod models;
pub mod orchestrator;
pub mod policy;

pub use config::GlobalConfig;
pub use errors::{AppError, Result};
