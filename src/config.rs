//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.

use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::error::{BridgeError, Result};
use crate::output::DeviceRange;
use crate::safety::SafetySettings;

/// Scheduler rates the driver is known to keep up with.
pub const SUPPORTED_UPDATE_RATES_HZ: [u32; 4] = [30, 60, 120, 250];

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub driver: DriverConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub safety: SafetyConfig,
    #[serde(default)]
    pub profile: ProfileConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Which sink receives the output
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum DriverKind {
    /// In-memory sink; nothing leaves the process
    #[default]
    Simulated,
    /// JSON lines to `output_path`, or stdout if unset
    Jsonl,
}

/// Virtual controller driver configuration
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct DriverConfig {
    #[serde(default)]
    pub kind: DriverKind,

    #[serde(default = "default_device_id")]
    pub device_id: u8,

    #[serde(default = "default_axis_min")]
    pub axis_min: i32,

    #[serde(default = "default_axis_max")]
    pub axis_max: i32,

    #[serde(default = "default_write_timeout_ms")]
    pub write_timeout_ms: u64,

    #[serde(default)]
    pub output_path: Option<String>,
}

/// Tick scheduler and smoothing configuration
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct SchedulerConfig {
    #[serde(default = "default_update_rate_hz")]
    pub update_rate_hz: u32,

    #[serde(default = "default_smoothing_enabled")]
    pub smoothing_enabled: bool,

    #[serde(default = "default_smoothing_factor")]
    pub smoothing_factor: f32,

    #[serde(default = "default_stats_interval_ticks")]
    pub stats_interval_ticks: u64,
}

/// Failsafe defaults for profiles without a safety section
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct SafetyConfig {
    #[serde(default = "default_enable_failsafe")]
    pub enable_failsafe: bool,

    #[serde(default = "default_failsafe_timeout_s")]
    pub failsafe_timeout_s: f64,
}

/// Profile store configuration
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct ProfileConfig {
    #[serde(default = "default_profile_directory")]
    pub directory: String,

    #[serde(default = "default_active_profile")]
    pub active: String,
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Daily-rolling log files go here when set
    #[serde(default)]
    pub directory: Option<String>,
}

// Default value functions
fn default_device_id() -> u8 { 1 }
fn default_axis_min() -> i32 { crate::output::DEFAULT_AXIS_MIN }
fn default_axis_max() -> i32 { crate::output::DEFAULT_AXIS_MAX }
fn default_write_timeout_ms() -> u64 { 20 }

fn default_update_rate_hz() -> u32 { 60 }
fn default_smoothing_enabled() -> bool { true }
fn default_smoothing_factor() -> f32 { 0.1 }
fn default_stats_interval_ticks() -> u64 { 600 }

fn default_enable_failsafe() -> bool { true }
fn default_failsafe_timeout_s() -> f64 { 5.0 }

fn default_profile_directory() -> String { "./profiles".to_string() }
fn default_active_profile() -> String { crate::profile::DEFAULT_PROFILE_NAME.to_string() }

fn default_log_level() -> String { "info".to_string() }

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            kind: DriverKind::default(),
            device_id: default_device_id(),
            axis_min: default_axis_min(),
            axis_max: default_axis_max(),
            write_timeout_ms: default_write_timeout_ms(),
            output_path: None,
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            update_rate_hz: default_update_rate_hz(),
            smoothing_enabled: default_smoothing_enabled(),
            smoothing_factor: default_smoothing_factor(),
            stats_interval_ticks: default_stats_interval_ticks(),
        }
    }
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            enable_failsafe: default_enable_failsafe(),
            failsafe_timeout_s: default_failsafe_timeout_s(),
        }
    }
}

impl Default for ProfileConfig {
    fn default() -> Self {
        Self {
            directory: default_profile_directory(),
            active: default_active_profile(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            directory: None,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            driver: DriverConfig::default(),
            scheduler: SchedulerConfig::default(),
            safety: SafetyConfig::default(),
            profile: ProfileConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Returns
    ///
    /// * `Result<Config>` - Loaded and validated configuration
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use nimbus_bridge::config::Config;
    ///
    /// let config = Config::load("config/default.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Parse and validate configuration from a TOML string
    ///
    /// # Errors
    ///
    /// Returns error if parsing or validation fails
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    pub fn validate(&self) -> Result<()> {
        // Driver
        if self.driver.device_id == 0 || self.driver.device_id > 16 {
            return Err(BridgeError::Config(
                "device_id must be between 1 and 16".to_string(),
            ));
        }

        if self.driver.axis_min >= self.driver.axis_max {
            return Err(BridgeError::Config(
                "axis_min must be less than axis_max".to_string(),
            ));
        }

        if self.driver.write_timeout_ms == 0 || self.driver.write_timeout_ms > 1000 {
            return Err(BridgeError::Config(
                "write_timeout_ms must be between 1 and 1000".to_string(),
            ));
        }

        if let Some(path) = &self.driver.output_path {
            if path.trim().is_empty() {
                return Err(BridgeError::Config(
                    "output_path cannot be empty when set".to_string(),
                ));
            }
        }

        // Scheduler
        if !SUPPORTED_UPDATE_RATES_HZ.contains(&self.scheduler.update_rate_hz) {
            return Err(BridgeError::Config(format!(
                "update_rate_hz must be one of {:?}",
                SUPPORTED_UPDATE_RATES_HZ
            )));
        }

        let factor = self.scheduler.smoothing_factor;
        if !factor.is_finite() || factor <= 0.0 || factor > 1.0 {
            return Err(BridgeError::Config(
                "smoothing_factor must be greater than 0.0 and at most 1.0".to_string(),
            ));
        }

        if self.scheduler.stats_interval_ticks == 0 {
            return Err(BridgeError::Config(
                "stats_interval_ticks must be greater than 0".to_string(),
            ));
        }

        // Safety
        let timeout = self.safety.failsafe_timeout_s;
        if !timeout.is_finite() || timeout <= 0.0 || timeout > 3600.0 {
            return Err(BridgeError::Config(
                "failsafe_timeout_s must be greater than 0 and at most 3600".to_string(),
            ));
        }

        // Profile
        if self.profile.directory.trim().is_empty() {
            return Err(BridgeError::Config(
                "profile directory cannot be empty".to_string(),
            ));
        }

        if self.profile.active.trim().is_empty() {
            return Err(BridgeError::Config(
                "active profile name cannot be empty".to_string(),
            ));
        }

        // Logging
        if self.logging.level.trim().is_empty() {
            return Err(BridgeError::Config(
                "logging level cannot be empty".to_string(),
            ));
        }

        Ok(())
    }

    /// Driver axis range
    #[must_use]
    pub fn device_range(&self) -> DeviceRange {
        DeviceRange::new(self.driver.axis_min, self.driver.axis_max)
    }

    /// Bound on a single frame write
    #[must_use]
    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.driver.write_timeout_ms)
    }

    /// Failsafe settings used when a profile has no safety section
    #[must_use]
    pub fn default_safety(&self) -> SafetySettings {
        SafetySettings {
            enabled: self.safety.enable_failsafe,
            timeout: Duration::from_secs_f64(self.safety.failsafe_timeout_s),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_valid_config() -> Config {
        Config::default()
    }

    #[test]
    fn test_default_config() {
        let config = create_valid_config();
        assert!(config.validate().is_ok());
        assert_eq!(config.scheduler.update_rate_hz, 60);
        assert_eq!(config.scheduler.smoothing_factor, 0.1);
        assert_eq!(config.safety.failsafe_timeout_s, 5.0);
        assert_eq!(config.driver.write_timeout_ms, 20);
        assert_eq!(config.device_range(), DeviceRange::new(0, 32767));
    }

    #[test]
    fn test_empty_toml_uses_defaults() {
        let config = Config::from_toml_str("").unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_full_toml() {
        let config = Config::from_toml_str(
            r#"
            [driver]
            kind = "jsonl"
            device_id = 2
            axis_min = -1000
            axis_max = 1000
            write_timeout_ms = 50
            output_path = "out.jsonl"

            [scheduler]
            update_rate_hz = 120
            smoothing_enabled = false
            smoothing_factor = 0.25
            stats_interval_ticks = 1200

            [safety]
            enable_failsafe = false
            failsafe_timeout_s = 1.5

            [profile]
            directory = "/tmp/profiles"
            active = "heli"

            [logging]
            level = "debug"
            directory = "./logs"
            "#,
        )
        .unwrap();

        assert_eq!(config.driver.kind, DriverKind::Jsonl);
        assert_eq!(config.driver.output_path.as_deref(), Some("out.jsonl"));
        assert_eq!(config.write_timeout(), Duration::from_millis(50));
        assert!(!config.scheduler.smoothing_enabled);
        assert_eq!(config.profile.active, "heli");
        assert_eq!(config.logging.directory.as_deref(), Some("./logs"));

        let safety = config.default_safety();
        assert!(!safety.enabled);
        assert_eq!(safety.timeout, Duration::from_millis(1500));
    }

    #[test]
    fn test_unknown_driver_kind_rejected() {
        let result = Config::from_toml_str("[driver]\nkind = \"vjoy\"\n");
        assert!(matches!(result, Err(BridgeError::Toml(_))));
    }

    #[test]
    fn test_invalid_device_id() {
        let mut config = create_valid_config();
        config.driver.device_id = 0;
        assert!(config.validate().is_err());

        config.driver.device_id = 17;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_axis_range() {
        let mut config = create_valid_config();
        config.driver.axis_min = 100;
        config.driver.axis_max = 100;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_extreme_axis_range_scales() {
        let mut config = create_valid_config();
        config.driver.axis_min = i32::MIN;
        config.driver.axis_max = i32::MAX;
        assert!(config.validate().is_ok());

        let range = config.device_range();
        let center = range.scale(0.0, crate::shaping::AxisRange::Bipolar);
        assert!(center.is_finite());
        assert_eq!(center, 0.0);
    }

    #[test]
    fn test_invalid_write_timeout() {
        let mut config = create_valid_config();
        config.driver.write_timeout_ms = 0;
        assert!(config.validate().is_err());

        config.driver.write_timeout_ms = 1001;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unsupported_update_rate() {
        let mut config = create_valid_config();
        config.scheduler.update_rate_hz = 100;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("update_rate_hz"));

        for rate in SUPPORTED_UPDATE_RATES_HZ {
            config.scheduler.update_rate_hz = rate;
            assert!(config.validate().is_ok());
        }
    }

    #[test]
    fn test_invalid_smoothing_factor() {
        let mut config = create_valid_config();
        for factor in [0.0, -0.1, 1.01, f32::NAN] {
            config.scheduler.smoothing_factor = factor;
            assert!(config.validate().is_err(), "factor {} accepted", factor);
        }
        config.scheduler.smoothing_factor = 1.0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_stats_interval() {
        let mut config = create_valid_config();
        config.scheduler.stats_interval_ticks = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_failsafe_timeout() {
        let mut config = create_valid_config();
        for timeout in [0.0, -1.0, 3600.5, f64::INFINITY] {
            config.safety.failsafe_timeout_s = timeout;
            assert!(config.validate().is_err(), "timeout {} accepted", timeout);
        }
    }

    #[test]
    fn test_empty_profile_fields() {
        let mut config = create_valid_config();
        config.profile.active = String::new();
        assert!(config.validate().is_err());

        let mut config = create_valid_config();
        config.profile.directory = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_output_path() {
        let mut config = create_valid_config();
        config.driver.output_path = Some(String::new());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[scheduler]\nupdate_rate_hz = 250\n").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.scheduler.update_rate_hz, 250);
    }

    #[test]
    fn test_load_missing_file() {
        assert!(matches!(
            Config::load("/nonexistent/nimbus.toml"),
            Err(BridgeError::Io(_))
        ));
    }
}
