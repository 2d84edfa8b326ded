//! Sensor readings from the robot, encoded and pushed to the locator

use crate::codec::{LaserEncoder, OdometryEncoder};
use crate::streaming::{SendDispatcher, SendingStatus};
use crate::types::{LaserScan, Odometry};
use log::{debug, error};
use parking_lot::Mutex;

/// Explain why the locator may have rejected `scan`, if anything looks off
///
/// The beam geometry is checked first. With consistent geometry and
/// `intensities_required`, ranges and intensities must have equal length.
pub fn laser_scan_problem(scan: &LaserScan, intensities_required: bool) -> Option<String> {
    if !scan.angles_consistent() {
        return Some(format!(
            "{} (angle_min) + {} (ranges - 1) * {} (angle_increment) = {}, expected {} (angle_max)",
            scan.angle_min,
            scan.ranges.len().saturating_sub(1),
            scan.angle_increment,
            scan.implied_angle_max(),
            scan.angle_max
        ));
    }
    if intensities_required && scan.ranges.len() != scan.intensities.len() {
        return Some(format!(
            "intensities are enabled, but ranges ({}) and intensities ({}) differ in length",
            scan.ranges.len(),
            scan.intensities.len()
        ));
    }
    None
}

/// One laser sending channel
pub struct LaserChannel {
    /// Config name of the laser (`laser` or `laser2`)
    name: &'static str,
    /// `ClientSensor.<name>.useIntensities` as synced at start-up
    use_intensities: bool,
    encoder: Mutex<LaserEncoder>,
    sender: SendDispatcher,
}

impl LaserChannel {
    pub fn new(name: &'static str, sender: SendDispatcher, use_intensities: bool) -> Self {
        Self {
            name,
            use_intensities,
            encoder: Mutex::new(LaserEncoder::new()),
            sender,
        }
    }

    pub fn sender(&self) -> &SendDispatcher {
        &self.sender
    }

    pub fn uses_intensities(&self) -> bool {
        self.use_intensities
    }
}

pub struct OdometryChannel {
    encoder: Mutex<OdometryEncoder>,
    sender: SendDispatcher,
}

impl OdometryChannel {
    pub fn new(sender: SendDispatcher) -> Self {
        Self {
            encoder: Mutex::new(OdometryEncoder::new()),
            sender,
        }
    }

    pub fn sender(&self) -> &SendDispatcher {
        &self.sender
    }
}

/// Entry point for the robot's sensor readings
///
/// Channels disabled in the locator configuration are absent; readings for
/// them are ignored.
pub struct SensorIntake {
    laser: Option<LaserChannel>,
    laser2: Option<LaserChannel>,
    odometry: Option<OdometryChannel>,
}

impl SensorIntake {
    pub fn new(
        laser: Option<LaserChannel>,
        laser2: Option<LaserChannel>,
        odometry: Option<OdometryChannel>,
    ) -> Self {
        Self {
            laser,
            laser2,
            odometry,
        }
    }

    pub fn laser(&self) -> Option<&LaserChannel> {
        self.laser.as_ref()
    }

    pub fn laser2(&self) -> Option<&LaserChannel> {
        self.laser2.as_ref()
    }

    pub fn odometry(&self) -> Option<&OdometryChannel> {
        self.odometry.as_ref()
    }

    /// Push a scan of the primary laser; `None` if the channel is disabled
    pub fn on_laser_scan(&self, scan: &LaserScan) -> Option<SendingStatus> {
        self.laser.as_ref().map(|channel| send_scan(channel, scan))
    }

    /// Push a scan of the second laser; `None` if the channel is disabled
    pub fn on_laser2_scan(&self, scan: &LaserScan) -> Option<SendingStatus> {
        self.laser2.as_ref().map(|channel| send_scan(channel, scan))
    }

    /// Push an odometry reading; `None` if the channel is disabled
    pub fn on_odometry(&self, odom: &Odometry) -> Option<SendingStatus> {
        let channel = self.odometry.as_ref()?;
        let mut encoder = channel.encoder.lock();
        let status = match encoder.encode(odom) {
            Ok(datagram) => channel.sender.send_data(&datagram),
            Err(e) => {
                error!("odometry datagram {} not encoded: {}", encoder.sequence(), e);
                SendingStatus::IoFailure
            }
        };
        if status == SendingStatus::IoFailure {
            debug!("odometry datagram {} not delivered", encoder.sequence());
        }
        Some(status)
    }

    /// Stop all sending channels; idempotent
    pub fn stop(&mut self) {
        for channel in [self.laser.as_mut(), self.laser2.as_mut()].into_iter().flatten() {
            channel.sender.stop();
        }
        if let Some(channel) = self.odometry.as_mut() {
            channel.sender.stop();
        }
    }
}

fn send_scan(channel: &LaserChannel, scan: &LaserScan) -> SendingStatus {
    let encoded = channel.encoder.lock().encode(scan);
    let status = match encoded {
        Ok(datagram) => channel.sender.send_data(&datagram),
        Err(e) => {
            error!("{} scan not encoded: {}", channel.name, e);
            SendingStatus::IoFailure
        }
    };
    if status == SendingStatus::IoFailure {
        if let Some(problem) = laser_scan_problem(scan, channel.use_intensities) {
            error!("{} scan is INVALID: {}", channel.name, problem);
        }
    }
    status
}
