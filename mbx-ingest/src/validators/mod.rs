//! Validation layer
//!
//! The gate is the last stage before persistence. A record failing a check
//! is excluded from the persisted batch and its reason is reported; a
//! rejection never fails the run.

pub mod gate;

pub use gate::{GateOutcome, ValidationGate};
