//! Locator Bridge daemon
//!
//! Connects to the configured locator, keeps its session alive and logs the
//! decoded telemetry until Ctrl-C.

use crossbeam_channel::{Receiver, RecvTimeoutError};
use locator_bridge::{BridgeConfig, Error, LocatorBridge, Payload, Result, TelemetryMessage};
use std::env;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Parse config path from command line arguments.
///
/// Supports:
/// - `locator-bridge <path>` (positional)
/// - `locator-bridge --config <path>` (flag-based)
/// - `locator-bridge -c <path>` (short flag)
///
/// Defaults to `/etc/locator-bridge.toml` if not specified.
fn parse_config_path(args: &[String]) -> String {
    for i in 1..args.len() {
        if (args[i] == "--config" || args[i] == "-c") && i + 1 < args.len() {
            return args[i + 1].clone();
        }
    }

    if args.len() > 1 && !args[1].starts_with('-') {
        return args[1].clone();
    }

    "/etc/locator-bridge.toml".to_string()
}

/// Log decoded telemetry until `running` clears or every channel is gone
fn log_telemetry(telemetry: &Receiver<TelemetryMessage>, running: &AtomicBool) {
    while running.load(Ordering::Relaxed) {
        let message = match telemetry.recv_timeout(Duration::from_millis(100)) {
            Ok(message) => message,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => {
                log::warn!("Telemetry channel closed");
                break;
            }
        };
        match &message.payload {
            Payload::ControlMode(mode) => log::info!(
                "{}: localization {} mapping {} recording {}",
                message.topic,
                mode.localization_state,
                mode.map_state,
                mode.recording_state
            ),
            Payload::LocalizationPose(pose) => log::debug!(
                "{}: ({:.3}, {:.3}, {:.3}) score {:.2}",
                message.topic,
                pose.pose.x,
                pose.pose.y,
                pose.pose.yaw,
                pose.localization_score
            ),
            Payload::PointCloud(cloud) => {
                log::debug!("{}: {} points", message.topic, cloud.len())
            }
            _ => log::trace!("{}", message.topic),
        }
    }
}

fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();
    let config_path = parse_config_path(&args);
    let config = BridgeConfig::load(&config_path)?;

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config.logging.level.as_str()),
    )
    .init();

    log::info!("Locator Bridge v{} starting...", env!("CARGO_PKG_VERSION"));
    log::info!("Using config: {}", config_path);

    let running = Arc::new(AtomicBool::new(true));
    let r = Arc::clone(&running);
    ctrlc::set_handler(move || {
        log::info!("Received shutdown signal");
        r.store(false, Ordering::Relaxed);
    })
    .map_err(|e| Error::Config(format!("Error setting Ctrl-C handler: {}", e)))?;

    let mut bridge = LocatorBridge::start(&config)?;
    let telemetry = bridge.telemetry();
    log::info!("Locator bridge running. Press Ctrl-C to stop.");

    log_telemetry(&telemetry, &running);

    bridge.shutdown();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_config_path_default() {
        assert_eq!(parse_config_path(&args(&["bridge"])), "/etc/locator-bridge.toml");
    }

    #[test]
    fn test_config_path_positional_and_flags() {
        assert_eq!(parse_config_path(&args(&["bridge", "a.toml"])), "a.toml");
        assert_eq!(parse_config_path(&args(&["bridge", "--config", "b.toml"])), "b.toml");
        assert_eq!(parse_config_path(&args(&["bridge", "-v", "-c", "c.toml"])), "c.toml");
    }

    #[test]
    fn test_telemetry_loop_ends_when_channels_close() {
        let (tx, rx) = crossbeam_channel::bounded(1);
        drop(tx);
        let running = AtomicBool::new(true);
        let (done_tx, done_rx) = crossbeam_channel::bounded(1);
        std::thread::spawn(move || {
            log_telemetry(&rx, &running);
            done_tx.send(()).unwrap();
        });
        assert!(done_rx.recv_timeout(Duration::from_secs(2)).is_ok());
    }
}
