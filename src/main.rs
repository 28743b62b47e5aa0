//! # Nimbus Bridge
//!
//! Turn pointer-style gestures into safe virtual joystick input.
//!
//! The binary loads configuration and the active profile, starts the
//! scheduler, and replays raw input events read as JSON lines from stdin.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tokio::io::BufReader;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use nimbus_bridge::config::{Config, DriverKind, LoggingConfig};
use nimbus_bridge::engine::{BridgeEngine, BridgeHandle};
use nimbus_bridge::error::BridgeError;
use nimbus_bridge::output::{JsonLinesSink, MemorySink};
use nimbus_bridge::profile::{JsonProfileStore, Profile};
use nimbus_bridge::replay::replay;

/// Configuration file used when no path is given
const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// File name prefix for rolling log files
const LOG_FILE_PREFIX: &str = "nimbus-bridge.log";

/// Main entry point for Nimbus Bridge
///
/// # Control Flow
///
/// 1. **Initialization**
///    - Load configuration (first argument, or `config/default.toml`)
///    - Set up logging to stderr and, optionally, rolling files
///    - Load the active profile, falling back to the stock layout
///    - Open the configured output sink and start the scheduler
///
/// 2. **Main Loop**
///    - Read raw events from stdin and forward them to the engine
///    - Stop at end of input or on Ctrl+C
///
/// 3. **Graceful Shutdown**
///    - Center every axis and release every button
///    - Release the output sink
///
/// # Errors
///
/// Returns error if:
/// - The configuration file is invalid
/// - The output file cannot be created
///
/// # Examples
///
/// ```bash
/// echo '{"axis": "left_x", "value": 0.5}' | cargo run --release -- config/default.toml
/// ```
#[tokio::main]
async fn main() -> Result<()> {
    let config_path = resolve_config_path(std::env::args().nth(1));
    let config = load_config(config_path.as_deref())?;
    let _log_guard = init_logging(&config.logging)?;

    info!("Nimbus Bridge v{} starting...", env!("CARGO_PKG_VERSION"));
    match &config_path {
        Some(path) => info!("Configuration loaded from {}", path.display()),
        None => info!("No configuration file, using defaults"),
    }

    let store = JsonProfileStore::new(&config.profile.directory);
    let profile = load_active_profile(&store, &config.profile.active).await;

    let handle = spawn_engine(&config, &profile).await?;

    info!("Reading events from stdin (Ctrl+C to exit)");
    let stdin = BufReader::new(tokio::io::stdin());

    tokio::select! {
        result = replay(stdin, &handle, &store) => {
            match result {
                Ok(stats) => info!("End of input after {} events", stats.events),
                Err(e) => warn!("Input stopped: {}", e),
            }
        }

        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down...");
        }
    }

    let status = handle.status();
    match handle.shutdown().await {
        Ok(()) | Err(BridgeError::EngineStopped) => {}
        Err(e) => warn!("Shutdown incomplete: {}", e),
    }
    info!("Total ticks: {}", status.ticks);

    Ok(())
}

/// Picks the configuration file: an explicit argument, else the default
/// path if it exists.
fn resolve_config_path(arg: Option<String>) -> Option<PathBuf> {
    match arg {
        Some(path) => Some(PathBuf::from(path)),
        None => {
            let default = PathBuf::from(DEFAULT_CONFIG_PATH);
            default.exists().then_some(default)
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Config::load(path)
            .with_context(|| format!("failed to load configuration from {}", path.display())),
        None => Ok(Config::default()),
    }
}

/// Installs the tracing subscriber.
///
/// `RUST_LOG` overrides the configured level. The returned guard must live
/// until exit so buffered file logs are flushed.
fn init_logging(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .with_context(|| format!("invalid logging level '{}'", config.level))?;

    let (file_layer, guard) = match &config.directory {
        Some(directory) => {
            let appender = tracing_appender::rolling::daily(directory, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().with_ansi(false).with_writer(writer)),
                Some(guard),
            )
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .init();

    Ok(guard)
}

async fn load_active_profile(store: &JsonProfileStore, name: &str) -> Profile {
    match store.load(name).await {
        Ok(profile) => {
            info!("Loaded profile '{}'", profile.display_name());
            profile
        }
        Err(e) => {
            warn!(
                "Profile '{}' not loaded from {} ({}), using the stock layout",
                name,
                store.directory().display(),
                e
            );
            Profile::default_layout()
        }
    }
}

async fn spawn_engine(config: &Config, profile: &Profile) -> Result<BridgeHandle> {
    let handle = match config.driver.kind {
        DriverKind::Simulated => {
            info!("Driver: simulated (device {})", config.driver.device_id);
            BridgeEngine::spawn(config, profile, MemorySink::new())?
        }
        DriverKind::Jsonl => match &config.driver.output_path {
            Some(path) => {
                let sink = JsonLinesSink::create(path)
                    .await
                    .with_context(|| format!("failed to open driver output {}", path))?;
                BridgeEngine::spawn(config, profile, sink)?
            }
            None => {
                info!("Driver: JSON lines on stdout");
                BridgeEngine::spawn(config, profile, JsonLinesSink::stdout())?
            }
        },
    };
    Ok(handle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_config_path_wins() {
        assert_eq!(
            resolve_config_path(Some("custom.toml".to_string())),
            Some(PathBuf::from("custom.toml"))
        );
    }

    #[test]
    fn test_missing_config_uses_defaults() {
        let config = load_config(None).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_bad_config_path_is_error() {
        assert!(load_config(Some(Path::new("/nonexistent/nimbus.toml"))).is_err());
    }

    #[tokio::test]
    async fn test_missing_profile_falls_back_to_stock_layout() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonProfileStore::new(dir.path());
        let profile = load_active_profile(&store, "absent").await;
        assert_eq!(profile, Profile::default_layout());
    }
}
