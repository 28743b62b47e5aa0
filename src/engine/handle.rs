//! Cloneable handle to a running scheduler task.

use tokio::sync::{mpsc, oneshot, watch};

use super::{BridgeStatus, Command};
use crate::error::{BridgeError, Result};
use crate::output::ButtonId;
use crate::profile::Profile;
use crate::shaping::ButtonMode;

/// Ingestion API for the input layer.
///
/// Every method fails with [`BridgeError::EngineStopped`] once the scheduler
/// task has exited. Dropping the last handle shuts the task down safely.
#[derive(Debug, Clone)]
pub struct BridgeHandle {
    commands: mpsc::Sender<Command>,
    urgent: mpsc::Sender<Command>,
    status: watch::Receiver<BridgeStatus>,
}

impl BridgeHandle {
    pub(crate) fn new(
        commands: mpsc::Sender<Command>,
        urgent: mpsc::Sender<Command>,
        status: watch::Receiver<BridgeStatus>,
    ) -> Self {
        Self {
            commands,
            urgent,
            status,
        }
    }

    async fn send(&self, command: Command) -> Result<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| BridgeError::EngineStopped)
    }

    /// Queues a normalized raw sample for `channel`.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::EngineStopped`] if the engine is gone.
    pub async fn send_axis(&self, channel: &str, value: f32) -> Result<()> {
        self.send(Command::AxisSample {
            channel: channel.to_string(),
            value,
        })
        .await
    }

    /// Queues a raw button state.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::EngineStopped`] if the engine is gone.
    pub async fn button_edge(&self, id: ButtonId, pressed: bool) -> Result<()> {
        self.send(Command::ButtonEdge { id, pressed }).await
    }

    /// Engages or clears the emergency stop.
    ///
    /// Bypasses queued samples and returns once the engine has applied the
    /// stop; when engaging, the neutral frame has been written by then.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::EngineStopped`] if the engine is gone.
    pub async fn set_emergency_stop(&self, engaged: bool) -> Result<()> {
        let (reply, applied) = oneshot::channel();
        self.urgent
            .send(Command::EmergencyStop { engaged, reply })
            .await
            .map_err(|_| BridgeError::EngineStopped)?;
        applied.await.map_err(|_| BridgeError::EngineStopped)
    }

    /// Changes the mode of one button.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::EngineStopped`] if the engine is gone.
    pub async fn set_button_mode(&self, id: ButtonId, mode: ButtonMode) -> Result<()> {
        self.send(Command::ButtonMode { id, mode }).await
    }

    /// Activates `profile` and waits for the result.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Profile`] if the profile was rejected (the
    /// previous profile stays active), or [`BridgeError::EngineStopped`].
    pub async fn activate_profile(&self, profile: Profile) -> Result<()> {
        let (reply, response) = oneshot::channel();
        self.send(Command::ActivateProfile {
            profile: Box::new(profile),
            reply,
        })
        .await?;
        response.await.map_err(|_| BridgeError::EngineStopped)??;
        Ok(())
    }

    /// Centers every output, releases the sink and stops the task.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Driver`] if the final frame could not be
    /// written, or [`BridgeError::EngineStopped`] if the task already exited.
    pub async fn shutdown(&self) -> Result<()> {
        let (reply, response) = oneshot::channel();
        self.send(Command::Shutdown { reply }).await?;
        response.await.map_err(|_| BridgeError::EngineStopped)??;
        Ok(())
    }

    /// Latest published status.
    #[must_use]
    pub fn status(&self) -> BridgeStatus {
        self.status.borrow().clone()
    }

    /// A receiver that is notified on every status change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<BridgeStatus> {
        self.status.clone()
    }

    /// Whether the scheduler task has exited.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.commands.is_closed()
    }
}
