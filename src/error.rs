//! # Error Types
//!
//! Custom error types for Nimbus Bridge using `thiserror`.
//!
//! Nothing here is fatal to the process: profile failures are returned to the
//! caller with the previous profile still active, and driver failures put the
//! engine into degraded mode until the driver accepts writes again.

use thiserror::Error;

/// Main error type for Nimbus Bridge
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Application configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// TOML parsing errors
    #[error("Configuration parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Profile rejected at activation or load time
    #[error("Profile activation failed: {0}")]
    Profile(#[from] ProfileError),

    /// Output driver errors
    #[error("Driver error: {0}")]
    Driver(#[from] DriverError),

    /// JSON encoding/decoding errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The scheduler task is no longer running
    #[error("Engine stopped")]
    EngineStopped,
}

/// Reasons a profile is considered malformed.
///
/// Out-of-range curve percentages are not listed here; those are clamped
/// with a warning instead of rejecting the profile.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProfileError {
    /// Two channels bound to the same output axis
    #[error("output axis {axis} is bound by both '{first}' and '{second}'")]
    DuplicateBinding {
        axis: String,
        first: String,
        second: String,
    },

    /// NaN or infinite parameter
    #[error("channel '{channel}': {field} is not a finite number")]
    NonFinite { channel: String, field: &'static str },

    /// Empty or otherwise unusable channel identifier
    #[error("invalid channel id '{0}'")]
    InvalidChannelId(String),

    /// Button id outside the driver's 1..=128 range
    #[error("invalid button id '{0}' (must be 1-128)")]
    InvalidButtonId(String),

    /// Failsafe timeout must be a positive finite number of seconds
    #[error("safety timeoutSeconds must be a positive number, got {0}")]
    InvalidSafetyTimeout(f64),

    /// Profile document could not be parsed
    #[error("malformed profile document: {0}")]
    Parse(String),
}

/// Errors reported by an output sink.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DriverError {
    /// The driver is not accepting writes
    #[error("driver unavailable")]
    Unavailable,

    /// A write did not complete within the configured bound
    #[error("driver write timed out after {0} ms")]
    Timeout(u64),

    /// The driver refused a specific write
    #[error("driver rejected write: {0}")]
    Rejected(String),

    /// Transport failure underneath the driver
    #[error("driver I/O failure: {0}")]
    Io(String),
}

impl From<std::io::Error> for DriverError {
    fn from(e: std::io::Error) -> Self {
        DriverError::Io(e.to_string())
    }
}

/// Result type alias for Nimbus Bridge
pub type Result<T> = std::result::Result<T, BridgeError>;
