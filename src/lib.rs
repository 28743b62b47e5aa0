//! # Nimbus Bridge Library
//!
//! Turn pointer-style gestures into safe virtual joystick input.
//!
//! This library provides the real-time core between an input layer and a
//! virtual controller driver: response curves and deadzones, toggle and
//! momentary buttons, rate-limited smoothing at a fixed tick rate, and a
//! failsafe that centers everything when input goes stale.
//!
//! ## Pipeline
//!
//! ```text
//! raw samples --> CurveEngine --> SmoothingScheduler --+
//!                                                      +--> OutputSink
//! raw edges ----> ButtonStateMachine ------------------+
//!                          ^
//!        FailsafeMonitor --+ (overrides both on any tick)
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod output;
pub mod profile;
pub mod replay;
pub mod safety;
pub mod shaping;
