//! # Trace Replay
//!
//! Feeds raw input events to a running engine from a JSON lines stream.
//! The binary uses this with stdin, which lets an external UI process (or a
//! recorded trace) drive the pipeline.
//!
//! ## Events
//!
//! ```text
//! {"axis": "left_x", "value": 0.42}
//! {"button": 9, "pressed": true}
//! {"emergencyStop": true}
//! {"buttonMode": 9, "mode": "toggle"}
//! {"profile": "racing"}
//! ```
//!
//! Blank lines and lines starting with `#` are skipped. A malformed line is
//! logged and skipped; it does not stop the replay.

use serde::Deserialize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{debug, info, warn};

use crate::engine::BridgeHandle;
use crate::error::{BridgeError, Result};
use crate::output::ButtonId;
use crate::profile::JsonProfileStore;
use crate::shaping::ButtonMode;

/// One line of a replay stream.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum RawEvent {
    Axis {
        axis: String,
        value: f32,
    },
    Button {
        button: ButtonId,
        pressed: bool,
    },
    EmergencyStop {
        #[serde(rename = "emergencyStop")]
        emergency_stop: bool,
    },
    ButtonMode {
        #[serde(rename = "buttonMode")]
        button_mode: ButtonId,
        mode: ButtonMode,
    },
    Profile {
        profile: String,
    },
}

/// Counters for a finished replay.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplayStats {
    pub events: u64,
    pub skipped: u64,
}

/// Parses one line.
///
/// # Returns
///
/// `Ok(None)` for blank and comment lines.
///
/// # Errors
///
/// Returns [`BridgeError::Json`] if the line is not a known event.
///
/// # Examples
///
/// ```
/// use nimbus_bridge::replay::{parse_event, RawEvent};
///
/// let event = parse_event(r#"{"axis": "throttle", "value": 0.5}"#)?;
/// assert_eq!(event, Some(RawEvent::Axis { axis: "throttle".to_string(), value: 0.5 }));
/// assert_eq!(parse_event("# comment")?, None);
/// # Ok::<(), nimbus_bridge::error::BridgeError>(())
/// ```
pub fn parse_event(line: &str) -> Result<Option<RawEvent>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }
    Ok(Some(serde_json::from_str(line)?))
}

/// Sends one event to the engine.
///
/// Profile events load the named profile from `store` first.
///
/// # Errors
///
/// Returns [`BridgeError::EngineStopped`] if the engine is gone, or the
/// load/activation error for profile events.
pub async fn dispatch(handle: &BridgeHandle, store: &JsonProfileStore, event: RawEvent) -> Result<()> {
    match event {
        RawEvent::Axis { axis, value } => handle.send_axis(&axis, value).await,
        RawEvent::Button { button, pressed } => handle.button_edge(button, pressed).await,
        RawEvent::EmergencyStop { emergency_stop } => handle.set_emergency_stop(emergency_stop).await,
        RawEvent::ButtonMode { button_mode, mode } => handle.set_button_mode(button_mode, mode).await,
        RawEvent::Profile { profile } => {
            let loaded = store.load(&profile).await?;
            handle.activate_profile(loaded).await
        }
    }
}

/// Reads events from `reader` until end of stream.
///
/// # Errors
///
/// Stops with an error only if reading fails or the engine stops; bad lines
/// and rejected profiles are counted as skipped.
pub async fn replay<R>(reader: R, handle: &BridgeHandle, store: &JsonProfileStore) -> Result<ReplayStats>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut stats = ReplayStats::default();
    let mut line_number = 0u64;

    while let Some(line) = lines.next_line().await? {
        line_number += 1;
        let event = match parse_event(&line) {
            Ok(Some(event)) => event,
            Ok(None) => continue,
            Err(e) => {
                warn!("Line {}: skipping malformed event: {}", line_number, e);
                stats.skipped += 1;
                continue;
            }
        };

        debug!("Line {}: {:?}", line_number, event);
        match dispatch(handle, store, event).await {
            Ok(()) => stats.events += 1,
            Err(BridgeError::EngineStopped) => return Err(BridgeError::EngineStopped),
            Err(e) => {
                warn!("Line {}: event not applied: {}", line_number, e);
                stats.skipped += 1;
            }
        }
    }

    info!(
        "Replay finished: {} events applied, {} skipped",
        stats.events, stats.skipped
    );
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::engine::BridgeEngine;
    use crate::output::{MemorySink, OutputAxis};
    use crate::profile::Profile;
    use std::time::Duration;

    // ==================== Parsing Tests ====================

    #[test]
    fn test_parse_each_event_kind() {
        let b9 = ButtonId::new(9).unwrap();
        assert_eq!(
            parse_event(r#"{"button": 9, "pressed": true}"#).unwrap(),
            Some(RawEvent::Button { button: b9, pressed: true })
        );
        assert_eq!(
            parse_event(r#"{"emergencyStop": false}"#).unwrap(),
            Some(RawEvent::EmergencyStop { emergency_stop: false })
        );
        assert_eq!(
            parse_event(r#"{"buttonMode": 9, "mode": "toggle"}"#).unwrap(),
            Some(RawEvent::ButtonMode { button_mode: b9, mode: ButtonMode::Toggle })
        );
        assert_eq!(
            parse_event(r#"{"profile": "racing"}"#).unwrap(),
            Some(RawEvent::Profile { profile: "racing".to_string() })
        );
    }

    #[test]
    fn test_parse_skips_blank_and_comments() {
        assert_eq!(parse_event("").unwrap(), None);
        assert_eq!(parse_event("   ").unwrap(), None);
        assert_eq!(parse_event("# recorded 2024-05-01").unwrap(), None);
    }

    #[test]
    fn test_parse_rejects_unknown_shapes() {
        assert!(parse_event(r#"{"axis": "x"}"#).is_err());
        assert!(parse_event(r#"{"button": 0, "pressed": true}"#).is_err());
        assert!(parse_event("not json").is_err());
    }

    // ==================== Replay Tests ====================

    #[tokio::test]
    async fn test_replay_drives_engine() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonProfileStore::new(dir.path());
        let sink = MemorySink::new();
        let handle = BridgeEngine::spawn(&Config::default(), &Profile::default_layout(), sink.clone()).unwrap();

        let trace = b"{\"button\": 9, \"pressed\": true}\n\ngarbage\n{\"profile\": \"missing\"}\n".as_slice();
        let stats = replay(trace, &handle, &store).await.unwrap();
        assert_eq!(stats, ReplayStats { events: 1, skipped: 2 });

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(sink.button(ButtonId::new(9).unwrap()));
        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_replay_switches_profile_from_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonProfileStore::new(dir.path());
        let mut heli = Profile::named("heli");
        heli.axis_channels.insert(
            "collective".to_string(),
            crate::profile::AxisChannelConfig::bound_to(OutputAxis::Sl0),
        );
        store.save("heli", &heli).await.unwrap();

        let handle =
            BridgeEngine::spawn(&Config::default(), &Profile::default_layout(), MemorySink::new()).unwrap();
        let trace = b"{\"profile\": \"heli\"}\n".as_slice();
        replay(trace, &handle, &store).await.unwrap();

        assert_eq!(handle.status().profile_name, "heli");
        handle.shutdown().await.unwrap();
    }
}
