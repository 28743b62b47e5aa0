//! # Button State Machine
//!
//! Resolves raw press/release edges into the state reported to the driver.
//!
//! ## States
//!
//! | State | Output | Reachable in |
//! |-------|--------|--------------|
//! | `Released` | off | both modes |
//! | `Pressed` | on | momentary |
//! | `Latched` | on | toggle |
//!
//! ## Transitions
//!
//! | Mode | From | Edge | To |
//! |------|------|------|----|
//! | momentary | any | press | `Pressed` |
//! | momentary | any | release | `Released` |
//! | toggle | `Latched` | press | `Released` |
//! | toggle | `Released` | press | `Latched` |
//! | toggle | `Latched` | release | `Latched` |
//! | toggle | `Released` | release | `Released` |
//!
//! A repeated press without an intervening release is not an edge and is
//! ignored. Any mode change forces `Released` and forgets the raw state, so
//! a latched button can never survive a switch to momentary.
//!
//! ## Usage
//!
//! ```
//! use nimbus_bridge::output::ButtonId;
//! use nimbus_bridge::shaping::button::{ButtonChannel, ButtonMode};
//!
//! let mut button = ButtonChannel::new(ButtonId::new(1).unwrap(), ButtonMode::Toggle);
//!
//! button.on_edge(true);
//! button.on_edge(false);
//! assert!(button.output()); // still latched after release
//!
//! button.on_edge(true);
//! assert!(!button.output());
//! ```

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::output::ButtonId;

/// How raw edges map to output state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ButtonMode {
    /// Output latches on press and releases on the next press.
    Toggle,
    /// Output mirrors the physical press.
    #[default]
    Momentary,
}

/// Resolved button state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ButtonState {
    #[default]
    Released,
    Pressed,
    Latched,
}

impl ButtonState {
    /// Whether the driver should see the button as pressed.
    #[must_use]
    pub fn output(self) -> bool {
        !matches!(self, ButtonState::Released)
    }
}

/// A raw edge from the input layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    Press,
    Release,
}

/// Transition table for a single edge.
#[must_use]
pub fn transition(mode: ButtonMode, state: ButtonState, edge: Edge) -> ButtonState {
    match (mode, state, edge) {
        (ButtonMode::Momentary, _, Edge::Press) => ButtonState::Pressed,
        (ButtonMode::Momentary, _, Edge::Release) => ButtonState::Released,
        (ButtonMode::Toggle, ButtonState::Latched, Edge::Press) => ButtonState::Released,
        (ButtonMode::Toggle, _, Edge::Press) => ButtonState::Latched,
        (ButtonMode::Toggle, ButtonState::Pressed, Edge::Release) => ButtonState::Released,
        (ButtonMode::Toggle, state, Edge::Release) => state,
    }
}

/// Live state of one logical button.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ButtonChannel {
    id: ButtonId,
    mode: ButtonMode,
    raw_pressed: bool,
    state: ButtonState,
}

impl ButtonChannel {
    /// Creates a released button in the given mode.
    #[must_use]
    pub fn new(id: ButtonId, mode: ButtonMode) -> Self {
        Self {
            id,
            mode,
            raw_pressed: false,
            state: ButtonState::Released,
        }
    }

    #[must_use]
    pub fn id(&self) -> ButtonId {
        self.id
    }

    #[must_use]
    pub fn mode(&self) -> ButtonMode {
        self.mode
    }

    #[must_use]
    pub fn state(&self) -> ButtonState {
        self.state
    }

    /// Last physical press state seen.
    #[must_use]
    pub fn raw_pressed(&self) -> bool {
        self.raw_pressed
    }

    /// Output state reported to the driver.
    #[must_use]
    pub fn output(&self) -> bool {
        self.state.output()
    }

    /// Applies a raw press state.
    ///
    /// # Returns
    ///
    /// `Some(output)` when the output state changed, `None` otherwise
    /// (including repeated presses or releases that are not edges).
    pub fn on_edge(&mut self, pressed: bool) -> Option<bool> {
        if pressed == self.raw_pressed {
            return None;
        }
        self.raw_pressed = pressed;

        let edge = if pressed { Edge::Press } else { Edge::Release };
        let before = self.output();
        self.state = transition(self.mode, self.state, edge);
        let after = self.output();

        (before != after).then_some(after)
    }

    /// Switches the button mode.
    ///
    /// The button is forced to `Released` and the raw state is forgotten, so
    /// the next physical press is treated as a fresh edge.
    ///
    /// # Returns
    ///
    /// `Some(false)` if this released a button that was on.
    pub fn set_mode(&mut self, mode: ButtonMode) -> Option<bool> {
        if mode == self.mode {
            return None;
        }
        debug!("Button {} mode {:?} -> {:?}", self.id, self.mode, mode);
        self.mode = mode;
        self.release()
    }

    /// Forces the button off and clears the remembered raw state.
    ///
    /// # Returns
    ///
    /// `Some(false)` if the output changed.
    pub fn release(&mut self) -> Option<bool> {
        let was_on = self.output();
        self.state = ButtonState::Released;
        self.raw_pressed = false;
        was_on.then_some(false)
    }
}
