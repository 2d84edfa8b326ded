//! Bridge configuration loaded from a TOML file
//!
//! ```toml
//! [locator]
//! host = "192.168.0.10"
//! user = "admin"
//! password = "admin"
//!
//! [locator_config]
//! "ClientSensor.laser.type" = "simple"
//! ClientSensor.enableOdometry = true   # nested keys are flattened
//! ```
//!
//! Every other section is optional and falls back to the defaults below.

use crate::error::{Error, Result};
use crate::rpc::document::{ConfigDocument, ConfigValue};
use crate::rpc::session::SESSION_TIMEOUT_SECS;
use crate::streaming::channel::ReceiveChannel;
use serde::Deserialize;
use std::net::{SocketAddr, ToSocketAddrs};
use std::path::Path;
use std::time::Duration;

/// Top-level bridge configuration
#[derive(Debug, Clone, Deserialize)]
pub struct BridgeConfig {
    pub locator: LocatorConfig,
    #[serde(default)]
    pub frames: FramesConfig,
    #[serde(default)]
    pub receive_ports: ReceivePortsConfig,
    #[serde(default)]
    pub topics: TopicsConfig,
    #[serde(default)]
    pub sensors: SensorsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Overrides written into the locator's configuration at start-up
    #[serde(default)]
    pub locator_config: toml::Table,
}

/// Locator host and session settings
#[derive(Debug, Clone, Deserialize)]
pub struct LocatorConfig {
    /// Locator host name or IP address
    pub host: String,

    /// JSON-RPC port (default: 8080)
    #[serde(default = "default_rpc_port")]
    pub rpc_port: u16,

    pub user: String,
    pub password: String,

    /// Session refresh interval in seconds (default: 30)
    #[serde(default = "default_session_refresh_secs")]
    pub session_refresh_secs: u64,

    /// RPC request timeout in milliseconds (default: 5000)
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Binary channel connect timeout in milliseconds (default: 3000)
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

/// Reference frames stamped on published messages
#[derive(Debug, Clone, Deserialize)]
pub struct FramesConfig {
    #[serde(default = "default_map_frame")]
    pub map: String,
    #[serde(default = "default_laser_frame")]
    pub laser: String,
}

impl Default for FramesConfig {
    fn default() -> Self {
        Self {
            map: default_map_frame(),
            laser: default_laser_frame(),
        }
    }
}

/// Locator ports of the telemetry channels
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReceivePortsConfig {
    pub control_mode: u16,
    pub map_map: u16,
    pub map_visualization: u16,
    pub recording_map: u16,
    pub recording_visualization: u16,
    pub localization_map: u16,
    pub localization_visualization: u16,
    pub localization_pose: u16,
    pub global_align_visualization: u16,
}

impl Default for ReceivePortsConfig {
    fn default() -> Self {
        use ReceiveChannel::*;
        Self {
            control_mode: ControlMode.default_port(),
            map_map: MapMap.default_port(),
            map_visualization: MapVisualization.default_port(),
            recording_map: RecordingMap.default_port(),
            recording_visualization: RecordingVisualization.default_port(),
            localization_map: LocalizationMap.default_port(),
            localization_visualization: LocalizationVisualization.default_port(),
            localization_pose: LocalizationPose.default_port(),
            global_align_visualization: GlobalAlignVisualization.default_port(),
        }
    }
}

impl ReceivePortsConfig {
    pub fn port(&self, channel: ReceiveChannel) -> u16 {
        match channel {
            ReceiveChannel::ControlMode => self.control_mode,
            ReceiveChannel::MapMap => self.map_map,
            ReceiveChannel::MapVisualization => self.map_visualization,
            ReceiveChannel::RecordingMap => self.recording_map,
            ReceiveChannel::RecordingVisualization => self.recording_visualization,
            ReceiveChannel::LocalizationMap => self.localization_map,
            ReceiveChannel::LocalizationVisualization => self.localization_visualization,
            ReceiveChannel::LocalizationPose => self.localization_pose,
            ReceiveChannel::GlobalAlignVisualization => self.global_align_visualization,
        }
    }
}

/// Topic names of the telemetry channels
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TopicsConfig {
    pub control_mode: String,
    pub map_map: String,
    pub map_visualization: String,
    pub recording_map: String,
    pub recording_visualization: String,
    pub localization_map: String,
    pub localization_visualization: String,
    pub localization_pose: String,
    pub global_align_visualization: String,
}

impl Default for TopicsConfig {
    fn default() -> Self {
        use ReceiveChannel::*;
        let topic = |c: ReceiveChannel| c.default_topic().to_string();
        Self {
            control_mode: topic(ControlMode),
            map_map: topic(MapMap),
            map_visualization: topic(MapVisualization),
            recording_map: topic(RecordingMap),
            recording_visualization: topic(RecordingVisualization),
            localization_map: topic(LocalizationMap),
            localization_visualization: topic(LocalizationVisualization),
            localization_pose: topic(LocalizationPose),
            global_align_visualization: topic(GlobalAlignVisualization),
        }
    }
}

impl TopicsConfig {
    pub fn topic(&self, channel: ReceiveChannel) -> &str {
        match channel {
            ReceiveChannel::ControlMode => &self.control_mode,
            ReceiveChannel::MapMap => &self.map_map,
            ReceiveChannel::MapVisualization => &self.map_visualization,
            ReceiveChannel::RecordingMap => &self.recording_map,
            ReceiveChannel::RecordingVisualization => &self.recording_visualization,
            ReceiveChannel::LocalizationMap => &self.localization_map,
            ReceiveChannel::LocalizationVisualization => &self.localization_visualization,
            ReceiveChannel::LocalizationPose => &self.localization_pose,
            ReceiveChannel::GlobalAlignVisualization => &self.global_align_visualization,
        }
    }
}

/// Listeners the locator connects to for sensor data
#[derive(Debug, Clone, Deserialize)]
pub struct SensorsConfig {
    /// Interface the datagram listeners bind to (default: 0.0.0.0)
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    #[serde(default = "default_laser_port")]
    pub laser_datagram_port: u16,

    #[serde(default = "default_laser2_port")]
    pub laser2_datagram_port: u16,

    #[serde(default = "default_odometry_port")]
    pub odometry_datagram_port: u16,

    /// Write timeout per datagram in milliseconds (default: 100)
    #[serde(default = "default_write_timeout_ms")]
    pub write_timeout_ms: u64,
}

impl Default for SensorsConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            laser_datagram_port: default_laser_port(),
            laser2_datagram_port: default_laser2_port(),
            odometry_datagram_port: default_odometry_port(),
            write_timeout_ms: default_write_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Default log filter, overridden by `RUST_LOG` (default: info)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_rpc_port() -> u16 {
    8080
}
fn default_session_refresh_secs() -> u64 {
    30
}
fn default_request_timeout_ms() -> u64 {
    5000
}
fn default_connect_timeout_ms() -> u64 {
    3000
}
fn default_map_frame() -> String {
    "map".to_string()
}
fn default_laser_frame() -> String {
    "laser".to_string()
}
fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}
fn default_laser_port() -> u16 {
    9100
}
fn default_odometry_port() -> u16 {
    9101
}
fn default_laser2_port() -> u16 {
    9102
}
fn default_write_timeout_ms() -> u64 {
    100
}
fn default_log_level() -> String {
    "info".to_string()
}

impl BridgeConfig {
    /// Load and validate a TOML configuration file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {}", path.display(), e)))?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: BridgeConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.locator.host.trim().is_empty() {
            return Err(Error::Config("locator.host must not be empty".to_string()));
        }
        let refresh = self.locator.session_refresh_secs;
        if refresh == 0 || refresh >= SESSION_TIMEOUT_SECS {
            return Err(Error::Config(format!(
                "locator.session_refresh_secs must be between 1 and {}, got {}",
                SESSION_TIMEOUT_SECS - 1,
                refresh
            )));
        }
        Ok(())
    }

    pub fn session_refresh_interval(&self) -> Duration {
        Duration::from_secs(self.locator.session_refresh_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.locator.request_timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.locator.connect_timeout_ms)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.sensors.write_timeout_ms)
    }

    /// Locator address of a telemetry channel
    pub fn receive_addr(&self, channel: ReceiveChannel) -> Result<SocketAddr> {
        let port = self.receive_ports.port(channel);
        (self.locator.host.as_str(), port)
            .to_socket_addrs()
            .map_err(|e| Error::Unreachable(format!("{}:{}: {}", self.locator.host, port, e)))?
            .next()
            .ok_or_else(|| {
                Error::Unreachable(format!("{}:{} resolves to no address", self.locator.host, port))
            })
    }

    /// `[locator_config]` as a config document; nested tables become dotted keys
    pub fn locator_overrides(&self) -> Result<ConfigDocument> {
        let mut doc = ConfigDocument::new();
        flatten_overrides("", &self.locator_config, &mut doc)?;
        Ok(doc)
    }
}

fn flatten_overrides(prefix: &str, table: &toml::Table, doc: &mut ConfigDocument) -> Result<()> {
    for (key, value) in table {
        let full_key = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{}.{}", prefix, key)
        };
        match value {
            toml::Value::Table(nested) => flatten_overrides(&full_key, nested, doc)?,
            other => {
                let value = ConfigValue::from_toml(other).ok_or_else(|| {
                    Error::Config(format!(
                        "locator_config.{}: unsupported value type {}",
                        full_key,
                        other.type_str()
                    ))
                })?;
                doc.set(&full_key, value);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
        [locator]
        host = "127.0.0.1"
        user = "admin"
        password = "secret"
    "#;

    #[test]
    fn test_minimal_config_defaults() {
        let config = BridgeConfig::from_toml_str(MINIMAL).unwrap();
        assert_eq!(config.locator.rpc_port, 8080);
        assert_eq!(config.locator.session_refresh_secs, 30);
        assert_eq!(config.frames.map, "map");
        assert_eq!(config.frames.laser, "laser");
        assert_eq!(config.sensors.laser_datagram_port, 9100);
        assert_eq!(config.sensors.odometry_datagram_port, 9101);
        assert_eq!(config.sensors.laser2_datagram_port, 9102);
        assert_eq!(config.logging.level, "info");
        for channel in ReceiveChannel::ALL {
            assert_eq!(config.receive_ports.port(channel), channel.default_port());
            assert_eq!(config.topics.topic(channel), channel.default_topic());
        }
        assert!(config.locator_overrides().unwrap().is_empty());
    }

    #[test]
    fn test_partial_sections() {
        let text = format!(
            "{}\n[receive_ports]\nlocalization_pose = 19011\n\
             [topics]\ncontrol_mode = \"mode\"\n\
             [frames]\nmap = \"world\"\n",
            MINIMAL
        );
        let config = BridgeConfig::from_toml_str(&text).unwrap();
        assert_eq!(config.receive_ports.port(ReceiveChannel::LocalizationPose), 19011);
        assert_eq!(config.receive_ports.port(ReceiveChannel::ControlMode), 9004);
        assert_eq!(config.topics.topic(ReceiveChannel::ControlMode), "mode");
        assert_eq!(config.frames.map, "world");
        assert_eq!(config.frames.laser, "laser");
    }

    #[test]
    fn test_locator_overrides() {
        let text = format!(
            r#"{}
            [locator_config]
            "ClientSensor.laser.type" = "simple"
            ClientSensor.enableOdometry = true
            "ClientLocalization.minDistance" = 0.25
            "ClientSensor.laser.maxRange" = 30
            "#,
            MINIMAL
        );
        let config = BridgeConfig::from_toml_str(&text).unwrap();
        let overrides = config.locator_overrides().unwrap();
        assert_eq!(overrides.len(), 4);
        assert_eq!(overrides.display("ClientSensor.laser.type"), "simple");
        assert_eq!(
            overrides.get("ClientSensor.enableOdometry"),
            Some(&ConfigValue::Bool(true))
        );
        assert_eq!(
            overrides.get("ClientLocalization.minDistance"),
            Some(&ConfigValue::Double(0.25))
        );
        assert_eq!(
            overrides.get("ClientSensor.laser.maxRange"),
            Some(&ConfigValue::Int(30))
        );
    }

    #[test]
    fn test_missing_locator_section() {
        assert!(BridgeConfig::from_toml_str("[frames]\nmap = \"map\"\n").is_err());
    }

    #[test]
    fn test_refresh_must_stay_below_session_timeout() {
        let text = MINIMAL.replace(
            "password = \"secret\"",
            "password = \"secret\"\nsession_refresh_secs = 60",
        );
        assert!(matches!(
            BridgeConfig::from_toml_str(&text),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_receive_addr() {
        let config = BridgeConfig::from_toml_str(MINIMAL).unwrap();
        let addr = config.receive_addr(ReceiveChannel::MapMap).unwrap();
        assert_eq!(addr, "127.0.0.1:9005".parse().unwrap());
    }
}
