//! # Engine Module
//!
//! Runs the pipeline on a fixed-rate scheduler task.
//!
//! This module handles:
//! - The synchronous pipeline core ([`BridgeCore`])
//! - The scheduler task that owns the core and the sink ([`BridgeEngine`])
//! - The cloneable handle used by the input layer ([`BridgeHandle`])
//!
//! All state changes reach the task as messages, so ingestion and ticks are
//! serialized without locks. The emergency stop travels on its own queue,
//! which the task drains before ticks and regular commands.

pub mod core;
pub mod handle;
pub mod scheduler;

use tokio::sync::oneshot;

use crate::error::{DriverError, ProfileError};
use crate::output::ButtonId;
use crate::profile::Profile;
use crate::shaping::ButtonMode;

pub use self::core::{BridgeCore, CoreSettings};
pub use handle::BridgeHandle;
pub use scheduler::{BridgeEngine, EngineSettings};

/// Capacity of the command queue.
pub const COMMAND_QUEUE_CAPACITY: usize = 256;

/// Capacity of the priority queue used by the emergency stop.
pub const URGENT_QUEUE_CAPACITY: usize = 8;

/// Status for the UI layer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BridgeStatus {
    pub driver_connected: bool,
    pub failsafe_active: bool,
    pub emergency_stop: bool,
    pub profile_name: String,
    pub ticks: u64,
}

impl BridgeStatus {
    /// Whether anything other than the tick counter differs.
    #[must_use]
    pub fn state_differs(&self, other: &Self) -> bool {
        self.driver_connected != other.driver_connected
            || self.failsafe_active != other.failsafe_active
            || self.emergency_stop != other.emergency_stop
            || self.profile_name != other.profile_name
    }
}

/// Messages accepted by the scheduler task.
#[derive(Debug)]
pub enum Command {
    AxisSample {
        channel: String,
        value: f32,
    },
    ButtonEdge {
        id: ButtonId,
        pressed: bool,
    },
    ActivateProfile {
        profile: Box<Profile>,
        reply: oneshot::Sender<Result<(), ProfileError>>,
    },
    /// Sent on the priority queue; `reply` fires once the stop is applied.
    EmergencyStop {
        engaged: bool,
        reply: oneshot::Sender<()>,
    },
    ButtonMode {
        id: ButtonId,
        mode: ButtonMode,
    },
    Shutdown {
        reply: oneshot::Sender<Result<(), DriverError>>,
    },
}
