//! Locator Bridge - protocol bridge to a localization appliance
//!
//! The locator exposes a JSON-RPC session channel for control and
//! configuration plus a set of binary telemetry streams, one TCP connection
//! each. The bridge also serves laser and odometry data back to the locator
//! on listeners the locator connects to.
//!
//! - [`rpc`]: session, config documents, module version gate
//! - [`codec`]: binary records in both directions
//! - [`streaming`]: per-channel receive and send dispatchers
//! - [`bridge`]: start-up, control surface, sensor intake, shutdown

pub mod bridge;
pub mod codec;
pub mod config;
pub mod error;
pub mod rpc;
pub mod streaming;
pub mod types;

pub use bridge::{Controller, LocatorBridge, SensorFlags, SensorIntake};
pub use config::BridgeConfig;
pub use error::{Error, Result};
pub use streaming::{ReceiveChannel, SendingStatus};
pub use types::{Payload, TelemetryMessage};
