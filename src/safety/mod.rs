//! # Safety Module
//!
//! Stale-input failsafe and emergency stop supervision.

pub mod failsafe;

pub use failsafe::{FailsafeMonitor, FailsafeState, SafetySettings, TripReason};
