//! Bridge orchestration
//!
//! # Start-up
//!
//! ```text
//! 1. login                       (failure aborts)
//! 2. module version check        (failure aborts)
//! 3. config sync with overrides  -> SensorFlags
//! 4. sending channels for the enabled sensors
//! 5. one receiving channel per telemetry channel
//! 6. session refresh timer
//! ```
//!
//! A failure after login logs the session out again before returning.
//!
//! # Shutdown
//!
//! Sending channels, receiving channels, refresh timer, then logout.
//! [`LocatorBridge::shutdown`] is idempotent and runs on drop.

pub mod control;
pub mod intake;
pub mod refresh;
pub mod sync;

pub use control::Controller;
pub use intake::{LaserChannel, OdometryChannel, SensorIntake};
pub use refresh::RefreshTimer;
pub use sync::{SensorFlags, sync_config, uses_intensities};

use crate::config::BridgeConfig;
use crate::error::Result;
use crate::rpc::{
    ConfigDocument, HttpTransport, REQUIRED_MODULE_VERSIONS, RpcTransport, SessionClient,
    check_module_versions,
};
use crate::streaming::{
    ChannelDecoder, ReceiveChannel, ReceiveDispatcher, ReceiverThread, SendDispatcher,
};
use crate::types::TelemetryMessage;
use crossbeam_channel::{Receiver, Sender, bounded};
use log::{info, warn};
use std::sync::Arc;

/// Capacity of the telemetry channel; messages beyond it are dropped
pub const TELEMETRY_CAPACITY: usize = 1024;

/// A running bridge to one locator
pub struct LocatorBridge {
    session: Arc<SessionClient>,
    locator_config: ConfigDocument,
    flags: SensorFlags,
    control: Controller,
    sensors: SensorIntake,
    receivers: Vec<ReceiverThread>,
    refresh: RefreshTimer,
    telemetry: Receiver<TelemetryMessage>,
    stopped: bool,
}

impl LocatorBridge {
    /// Start a bridge talking JSON-RPC over HTTP to the configured locator
    pub fn start(config: &BridgeConfig) -> Result<Self> {
        let transport = HttpTransport::new(
            &config.locator.host,
            config.locator.rpc_port,
            config.request_timeout(),
        )?;
        Self::start_with_transport(config, Box::new(transport))
    }

    /// Start a bridge on an arbitrary RPC transport
    pub fn start_with_transport(
        config: &BridgeConfig,
        transport: Box<dyn RpcTransport>,
    ) -> Result<Self> {
        info!(
            "Connecting to locator at {}:{}",
            config.locator.host, config.locator.rpc_port
        );
        let session = Arc::new(SessionClient::from_boxed(transport));
        session.login(&config.locator.user, &config.locator.password)?;

        match Self::start_session(config, Arc::clone(&session)) {
            Ok(bridge) => Ok(bridge),
            Err(e) => {
                if let Err(logout) = session.logout() {
                    warn!("Logout after failed start-up failed: {}", logout);
                }
                Err(e)
            }
        }
    }

    fn start_session(config: &BridgeConfig, session: Arc<SessionClient>) -> Result<Self> {
        let modules = session.get_about_modules()?;
        check_module_versions(&modules, REQUIRED_MODULE_VERSIONS)?;
        info!("Locator module versions are compatible");

        let (locator_config, flags) = sync_config(&session, &config.locator_overrides()?)?;

        let sensors = start_senders(config, &locator_config, flags)?;

        let (tx, telemetry) = bounded(TELEMETRY_CAPACITY);
        let receivers = start_receivers(config, &tx)?;

        let refresh = RefreshTimer::start(Arc::clone(&session), config.session_refresh_interval())?;

        info!(
            "Locator bridge running: {} telemetry channels, sensors {:?}",
            receivers.len(),
            flags
        );

        Ok(Self {
            control: Controller::new(Arc::clone(&session), &config.frames.map),
            session,
            locator_config,
            flags,
            sensors,
            receivers,
            refresh,
            telemetry,
            stopped: false,
        })
    }

    /// Decoded telemetry from every receiving channel
    pub fn telemetry(&self) -> Receiver<TelemetryMessage> {
        self.telemetry.clone()
    }

    /// Recording, mapping and localization control
    pub fn control(&self) -> &Controller {
        &self.control
    }

    /// Sensor readings to forward to the locator
    pub fn sensors(&self) -> &SensorIntake {
        &self.sensors
    }

    pub fn flags(&self) -> SensorFlags {
        self.flags
    }

    /// Locator configuration as written during start-up
    pub fn locator_config(&self) -> &ConfigDocument {
        &self.locator_config
    }

    pub fn session(&self) -> &SessionClient {
        &self.session
    }

    /// Stop all channels and end the session; idempotent
    pub fn shutdown(&mut self) {
        if self.stopped {
            return;
        }
        self.stopped = true;
        info!("Shutting down locator bridge");

        self.sensors.stop();
        for receiver in &mut self.receivers {
            receiver.stop();
        }
        self.refresh.stop();
        if let Err(e) = self.session.logout() {
            warn!("Logout failed: {}", e);
        }
        info!("Locator bridge stopped");
    }
}

impl Drop for LocatorBridge {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn start_senders(
    config: &BridgeConfig,
    locator_config: &ConfigDocument,
    flags: SensorFlags,
) -> Result<SensorIntake> {
    let sensors = &config.sensors;
    let timeout = config.write_timeout();
    let bind = |port: u16| format!("{}:{}", sensors.bind_address, port);

    let laser = if flags.laser {
        let sender = SendDispatcher::new("laser", &bind(sensors.laser_datagram_port), timeout)?;
        Some(LaserChannel::new("laser", sender, uses_intensities(locator_config, "laser")))
    } else {
        None
    };
    let laser2 = if flags.laser2 {
        let sender = SendDispatcher::new("laser2", &bind(sensors.laser2_datagram_port), timeout)?;
        Some(LaserChannel::new("laser2", sender, uses_intensities(locator_config, "laser2")))
    } else {
        None
    };
    let odometry = if flags.odometry {
        let sender =
            SendDispatcher::new("odometry", &bind(sensors.odometry_datagram_port), timeout)?;
        Some(OdometryChannel::new(sender))
    } else {
        None
    };

    Ok(SensorIntake::new(laser, laser2, odometry))
}

fn start_receivers(
    config: &BridgeConfig,
    sink: &Sender<TelemetryMessage>,
) -> Result<Vec<ReceiverThread>> {
    let mut receivers = Vec::with_capacity(ReceiveChannel::ALL.len());
    for channel in ReceiveChannel::ALL {
        let addr = config.receive_addr(channel)?;
        let decoder = ChannelDecoder::new(
            channel,
            config.topics.topic(channel),
            &config.frames.map,
            &config.frames.laser,
        );
        let dispatcher =
            ReceiveDispatcher::connect(addr, decoder, sink.clone(), config.connect_timeout())?;
        receivers.push(ReceiverThread::spawn(dispatcher)?);
    }
    Ok(receivers)
}
