//! Command policy for the partition lifecycle.
//!
//! The legality table decides which commands are accepted in which state.
//! It is consulted before any child is contacted.

pub mod legality;

pub use legality::LegalityTable;
