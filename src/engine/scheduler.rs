//! # Scheduler Task
//!
//! Owns the [`BridgeCore`] and the [`SinkWriter`] and drives them from a
//! tokio interval. Commands from handles are applied between ticks.
//!
//! Shutdown, whether requested or caused by every handle being dropped,
//! always writes one all-neutral frame before releasing the sink.

use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use super::{
    BridgeCore, BridgeHandle, BridgeStatus, Command, CoreSettings, COMMAND_QUEUE_CAPACITY,
    URGENT_QUEUE_CAPACITY,
};
use crate::config::Config;
use crate::error::{DriverError, Result};
use crate::output::{Frame, OutputSink, SinkWriter};
use crate::profile::Profile;
use crate::shaping::SlewLimit;

/// Settings for one engine instance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineSettings {
    pub update_rate_hz: u32,
    pub write_timeout: Duration,
    pub stats_interval_ticks: u64,
    pub core: CoreSettings,
}

impl EngineSettings {
    /// Derives engine settings from validated configuration.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        let hz = config.scheduler.update_rate_hz;
        Self {
            update_rate_hz: hz,
            write_timeout: config.write_timeout(),
            stats_interval_ticks: config.scheduler.stats_interval_ticks.max(1),
            core: CoreSettings {
                slew: SlewLimit::from_factor(config.scheduler.smoothing_factor, hz),
                smoothing_enabled: config.scheduler.smoothing_enabled,
                device_range: config.device_range(),
                default_safety: config.default_safety(),
            },
        }
    }

    #[must_use]
    pub fn tick_period(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.update_rate_hz.max(1)))
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// The scheduler task.
pub struct BridgeEngine {
    core: BridgeCore,
    writer: SinkWriter,
    settings: EngineSettings,
    commands: mpsc::Receiver<Command>,
    urgent: mpsc::Receiver<Command>,
    status: watch::Sender<BridgeStatus>,
}

impl BridgeEngine {
    /// Starts the scheduler task with `profile` active.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns an error if the profile is malformed; no task is started.
    ///
    /// # Examples
    ///
    /// ```
    /// use nimbus_bridge::config::Config;
    /// use nimbus_bridge::engine::BridgeEngine;
    /// use nimbus_bridge::output::MemorySink;
    /// use nimbus_bridge::profile::Profile;
    ///
    /// #[tokio::main]
    /// async fn main() -> anyhow::Result<()> {
    ///     let handle = BridgeEngine::spawn(&Config::default(), &Profile::default_layout(), MemorySink::new())?;
    ///     handle.send_axis("left_x", 0.5).await?;
    ///     handle.shutdown().await?;
    ///     Ok(())
    /// }
    /// ```
    pub fn spawn<S>(config: &Config, profile: &Profile, sink: S) -> Result<BridgeHandle>
    where
        S: OutputSink + 'static,
    {
        Self::spawn_with_settings(EngineSettings::from_config(config), profile, sink)
    }

    /// Starts the scheduler task with explicit settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the profile is malformed; no task is started.
    pub fn spawn_with_settings<S>(settings: EngineSettings, profile: &Profile, sink: S) -> Result<BridgeHandle>
    where
        S: OutputSink + 'static,
    {
        let core = BridgeCore::new(profile, settings.core, Instant::now().into_std())?;
        let (command_tx, commands) = mpsc::channel(COMMAND_QUEUE_CAPACITY);
        let (urgent_tx, urgent) = mpsc::channel(URGENT_QUEUE_CAPACITY);
        let (status, status_rx) = watch::channel(BridgeStatus {
            profile_name: core.profile_name().to_string(),
            ..BridgeStatus::default()
        });

        let engine = Self {
            core,
            writer: SinkWriter::new(Box::new(sink), settings.write_timeout),
            settings,
            commands,
            urgent,
            status,
        };

        tokio::spawn(engine.run());
        debug!("Scheduler task spawned");

        Ok(BridgeHandle::new(command_tx, urgent_tx, status_rx))
    }

    async fn run(mut self) {
        let period = self.settings.tick_period();
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            "Scheduler running at {} Hz (tick {:.2} ms)",
            self.settings.update_rate_hz,
            period.as_secs_f64() * 1000.0
        );

        loop {
            tokio::select! {
                biased;

                Some(command) = self.urgent.recv() => {
                    self.handle(command).await;
                }

                _ = ticker.tick() => {
                    self.on_tick().await;
                }

                command = self.commands.recv() => match command {
                    Some(Command::Shutdown { reply }) => {
                        let result = self.shutdown().await;
                        let _ = reply.send(result);
                        break;
                    }
                    Some(command) => self.handle(command).await,
                    None => {
                        info!("All handles dropped, shutting down");
                        if let Err(e) = self.shutdown().await {
                            warn!("Shutdown incomplete: {}", e);
                        }
                        break;
                    }
                },
            }
        }

        info!("Scheduler stopped after {} ticks", self.core.ticks());
    }

    async fn handle(&mut self, command: Command) {
        let now = Instant::now().into_std();
        match command {
            Command::AxisSample { channel, value } => {
                self.core.on_raw_axis_sample(&channel, value, now);
            }
            Command::ButtonEdge { id, pressed } => {
                self.core.on_raw_button_edge(id, pressed, now);
            }
            Command::ActivateProfile { profile, reply } => {
                let result = self.core.activate_profile(&profile, now);
                let result = match result {
                    Ok(release) => {
                        self.write(&release).await;
                        self.publish_status();
                        Ok(())
                    }
                    Err(e) => Err(e),
                };
                let _ = reply.send(result);
            }
            Command::EmergencyStop { engaged, reply } => {
                if self.core.set_emergency_stop(engaged) {
                    if engaged {
                        // Do not wait for the next tick
                        let frame = self.core.neutral_frame();
                        self.write(&frame).await;
                    }
                    self.publish_status();
                }
                let _ = reply.send(());
            }
            Command::ButtonMode { id, mode } => {
                if self.core.set_button_mode(id, mode) {
                    // A dropped latch goes out before the next tick
                    let frame = Frame {
                        axes: Vec::new(),
                        buttons: vec![(id, false)],
                    };
                    self.write(&frame).await;
                    self.publish_status();
                }
            }
            Command::Shutdown { reply } => {
                let _ = reply.send(self.shutdown().await);
            }
        }
    }

    async fn on_tick(&mut self) {
        let frame = self.core.tick(Instant::now().into_std());
        self.write(&frame).await;
        self.publish_status();

        let ticks = self.core.ticks();
        if ticks % self.settings.stats_interval_ticks == 0 {
            info!(
                "Stats: {} ticks, {} frames written, {} driver failures, failsafe {:?}",
                ticks,
                self.writer.frames_written(),
                self.writer.failures(),
                self.core.failsafe_state()
            );
        }
    }

    async fn write(&mut self, frame: &Frame) {
        if let Err(e) = self.writer.write_frame(frame).await {
            debug!("Frame not delivered: {}", e);
        }
    }

    async fn shutdown(&mut self) -> std::result::Result<(), DriverError> {
        let frame = self.core.neutral_frame();
        let result = self.writer.finish(&frame).await;
        match &result {
            Ok(()) => info!("Outputs centered and driver released"),
            Err(e) => error!("Failed to center outputs on shutdown: {}", e),
        }
        self.publish_status();
        result
    }

    /// Publishes the latest status.
    ///
    /// The tick counter is always stored, but subscribers are only woken
    /// when something else changed.
    fn publish_status(&self) {
        let status = BridgeStatus {
            driver_connected: self.writer.is_connected(),
            failsafe_active: self.core.is_tripped(),
            emergency_stop: self.core.emergency_stop(),
            profile_name: self.core.profile_name().to_string(),
            ticks: self.core.ticks(),
        };
        self.status.send_if_modified(|current| {
            let changed = current.state_differs(&status);
            *current = status;
            changed
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::{ButtonId, MemorySink, OutputAxis};
    use crate::shaping::ButtonMode;

    fn settings() -> EngineSettings {
        let mut config = Config::default();
        config.driver.axis_min = -1000;
        config.driver.axis_max = 1000;
        config.scheduler.smoothing_enabled = false;
        EngineSettings::from_config(&config)
    }

    // ==================== Status Tests ====================

    #[test]
    fn test_state_differs_ignores_ticks() {
        let base = BridgeStatus {
            profile_name: "default".to_string(),
            ticks: 1,
            ..BridgeStatus::default()
        };
        let later = BridgeStatus {
            ticks: 500,
            ..base.clone()
        };
        assert!(!base.state_differs(&later));

        let stopped = BridgeStatus {
            emergency_stop: true,
            ..base.clone()
        };
        assert!(base.state_differs(&stopped));
    }

    // ==================== Settings Tests ====================

    #[test]
    fn test_settings_from_default_config() {
        let settings = EngineSettings::default();
        assert_eq!(settings.update_rate_hz, 60);
        assert_eq!(settings.write_timeout, Duration::from_millis(20));
        assert!((settings.core.slew.max_step_per_tick - 0.1).abs() < 1e-6);
        assert_eq!(settings.core.default_safety.timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_tick_period() {
        let mut settings = EngineSettings::default();
        settings.update_rate_hz = 250;
        assert_eq!(settings.tick_period(), Duration::from_millis(4));
    }

    // ==================== Task Tests ====================

    #[tokio::test(start_paused = true)]
    async fn test_sample_reaches_sink() {
        let sink = MemorySink::new();
        let handle =
            BridgeEngine::spawn_with_settings(settings(), &Profile::default_layout(), sink.clone()).unwrap();

        handle.send_axis("right_x", -1.0).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(sink.axis(OutputAxis::Rx), Some(-1000.0));
        assert!(handle.status().driver_connected);
        assert!(handle.status().ticks > 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_centers_and_releases() {
        let sink = MemorySink::new();
        let handle =
            BridgeEngine::spawn_with_settings(settings(), &Profile::default_layout(), sink.clone()).unwrap();
        let fire = ButtonId::new(1).unwrap();

        handle.send_axis("left_y", 1.0).await.unwrap();
        handle.button_edge(fire, true).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(sink.axis(OutputAxis::Y), Some(1000.0));
        assert!(sink.button(fire));

        handle.shutdown().await.unwrap();
        assert_eq!(sink.axis(OutputAxis::Y), Some(0.0));
        assert!(!sink.button(fire));
        assert!(sink.is_released());

        tokio::time::sleep(Duration::from_millis(1)).await;
        assert!(handle.send_axis("left_y", 1.0).await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_handles_triggers_safe_shutdown() {
        let sink = MemorySink::new();
        let handle =
            BridgeEngine::spawn_with_settings(settings(), &Profile::default_layout(), sink.clone()).unwrap();

        handle.send_axis("left_x", 0.5).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        drop(handle);
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(sink.axis(OutputAxis::X), Some(0.0));
        assert!(sink.is_released());
    }

    #[tokio::test(start_paused = true)]
    async fn test_emergency_stop_is_written_immediately() {
        let sink = MemorySink::new();
        let handle =
            BridgeEngine::spawn_with_settings(settings(), &Profile::default_layout(), sink.clone()).unwrap();

        handle.send_axis("left_x", 1.0).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        let mut status = handle.subscribe();
        handle.set_emergency_stop(true).await.unwrap();
        status.wait_for(|s| s.emergency_stop).await.unwrap();

        assert_eq!(sink.axis(OutputAxis::X), Some(0.0));
        assert!(handle.status().failsafe_active);
    }

    #[tokio::test(start_paused = true)]
    async fn test_button_mode_command() {
        let sink = MemorySink::new();
        let handle =
            BridgeEngine::spawn_with_settings(settings(), &Profile::default_layout(), sink.clone()).unwrap();
        let arm = ButtonId::new(9).unwrap();

        handle.set_button_mode(arm, ButtonMode::Toggle).await.unwrap();
        handle.button_edge(arm, true).await.unwrap();
        handle.button_edge(arm, false).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(sink.button(arm));

        handle.set_button_mode(arm, ButtonMode::Momentary).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!sink.button(arm));
    }

    #[tokio::test(start_paused = true)]
    async fn test_mode_change_release_written_before_next_tick() {
        let mut settings = settings();
        settings.update_rate_hz = 30;
        let sink = MemorySink::new();
        let handle = BridgeEngine::spawn_with_settings(settings, &Profile::default_layout(), sink.clone()).unwrap();
        let arm = ButtonId::new(9).unwrap();

        handle.set_button_mode(arm, ButtonMode::Toggle).await.unwrap();
        handle.button_edge(arm, true).await.unwrap();
        handle.button_edge(arm, false).await.unwrap();
        // Ticks at 0 and 33 ms; the next one is due at 66 ms
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(sink.button(arm));
        let ticks = handle.status().ticks;

        handle.set_button_mode(arm, ButtonMode::Momentary).await.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;

        assert_eq!(handle.status().ticks, ticks);
        assert!(!sink.button(arm));
    }

    #[tokio::test(start_paused = true)]
    async fn test_emergency_stop_applied_when_call_returns() {
        let sink = MemorySink::new();
        let handle =
            BridgeEngine::spawn_with_settings(settings(), &Profile::default_layout(), sink.clone()).unwrap();

        handle.send_axis("left_x", 1.0).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(sink.axis(OutputAxis::X), Some(1000.0));

        for _ in 0..100 {
            handle.send_axis("left_x", 1.0).await.unwrap();
        }
        handle.set_emergency_stop(true).await.unwrap();

        assert!(handle.status().emergency_stop);
        assert_eq!(sink.axis(OutputAxis::X), Some(0.0));

        // Samples queued ahead of the stop do not bring the output back
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(sink.axis(OutputAxis::X), Some(0.0));

        handle.set_emergency_stop(false).await.unwrap();
        assert!(!handle.status().emergency_stop);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticks_alone_do_not_wake_subscribers() {
        let handle =
            BridgeEngine::spawn_with_settings(settings(), &Profile::default_layout(), MemorySink::new()).unwrap();
        handle.send_axis("left_x", 0.2).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        let mut status = handle.subscribe();
        status.borrow_and_update();
        let ticks = handle.status().ticks;

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!status.has_changed().unwrap());
        assert!(handle.status().ticks > ticks);

        handle.set_emergency_stop(true).await.unwrap();
        assert!(status.has_changed().unwrap());
    }
}
