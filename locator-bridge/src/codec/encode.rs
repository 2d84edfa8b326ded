//! Encoders for the sensor datagrams pushed to the locator
//!
//! Every sending channel owns one encoder. The encoder carries the
//! channel-local sequence counter, which pre-increments so the first datagram
//! on a channel is numbered 1.

use super::cursor::{ByteCursor, DecodeResult};
use super::decode::read_pose2d;
use super::writer::{DatagramWriter, EncodeError};
use crate::types::{LaserScan, Odometry, Pose2D};

/// Fixed part of a laser datagram: stamp, sequence and seven f64 parameters
const LASER_HEADER_SIZE: usize = 8 + 8 + 7 * 8;

/// Odometry datagram: stamp, sequence, pose, three velocities, flag byte
pub const ODOMETRY_DATAGRAM_SIZE: usize = 8 + 8 + 24 + 3 * 8 + 1;

/// Stateful encoder for one laser channel
#[derive(Debug, Default)]
pub struct LaserEncoder {
    sequence: u64,
    prev_stamp: Option<f64>,
}

impl LaserEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sequence number of the last encoded scan (0 before the first)
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Encode one scan
    ///
    /// A scan with `scan_time == 0` gets it from the stamp delta to the
    /// previous scan on this channel. The first scan leaves it at zero.
    /// The sequence number advances even when the scan is too large to encode.
    pub fn encode(&mut self, scan: &LaserScan) -> Result<Vec<u8>, EncodeError> {
        self.sequence += 1;
        let stamp = scan.header.stamp;

        let mut scan_time = f64::from(scan.scan_time);
        if scan_time == 0.0 {
            if let Some(prev) = self.prev_stamp {
                scan_time = stamp - prev;
            }
        }
        self.prev_stamp = Some(stamp);

        let capacity = LASER_HEADER_SIZE + 8 + 4 * (scan.ranges.len() + scan.intensities.len());
        let mut w = DatagramWriter::with_capacity(capacity);
        w.write_f64(stamp)
            .write_u64(self.sequence)
            .write_f64(f64::from(scan.time_increment))
            .write_f64(scan_time)
            .write_f64(f64::from(scan.angle_min))
            .write_f64(f64::from(scan.angle_max))
            .write_f64(f64::from(scan.angle_increment))
            .write_f64(f64::from(scan.range_min))
            .write_f64(f64::from(scan.range_max))
            .write_array(&scan.ranges, |w, r| {
                w.write_f32(*r);
            })
            .write_array(&scan.intensities, |w, i| {
                w.write_f32(*i);
            });
        w.finish()
    }
}

/// Stateful encoder for the odometry channel
#[derive(Debug, Default)]
pub struct OdometryEncoder {
    sequence: u64,
}

impl OdometryEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Encode one odometry reading; yaw is taken from the orientation
    pub fn encode(&mut self, odom: &Odometry) -> Result<Vec<u8>, EncodeError> {
        self.sequence += 1;
        let pose = odom.pose.to_pose2d();

        let mut w = DatagramWriter::with_capacity(ODOMETRY_DATAGRAM_SIZE);
        w.write_f64(odom.header.stamp)
            .write_u64(self.sequence)
            .write_f64(pose.x)
            .write_f64(pose.y)
            .write_f64(pose.yaw)
            .write_f64(odom.twist.linear.x)
            .write_f64(odom.twist.linear.y)
            .write_f64(odom.twist.angular.z)
            // velocities are always populated
            .write_u8(1);
        w.finish()
    }
}

/// Laser datagram as the locator reads it
#[derive(Debug, Clone, PartialEq)]
pub struct LaserDatagram {
    pub timestamp: f64,
    pub scan_num: u64,
    pub time_increment: f64,
    pub scan_time: f64,
    pub angle_min: f64,
    pub angle_max: f64,
    pub angle_increment: f64,
    pub range_min: f64,
    pub range_max: f64,
    pub ranges: Vec<f32>,
    pub intensities: Vec<f32>,
}

/// Read back a laser datagram
pub fn decode_laser_datagram(c: &mut ByteCursor<'_>) -> DecodeResult<LaserDatagram> {
    Ok(LaserDatagram {
        timestamp: c.read_f64()?,
        scan_num: c.read_u64()?,
        time_increment: c.read_f64()?,
        scan_time: c.read_f64()?,
        angle_min: c.read_f64()?,
        angle_max: c.read_f64()?,
        angle_increment: c.read_f64()?,
        range_min: c.read_f64()?,
        range_max: c.read_f64()?,
        ranges: c.read_array(4, |c| c.read_f32())?,
        intensities: c.read_array(4, |c| c.read_f32())?,
    })
}

/// Odometry datagram as the locator reads it
#[derive(Debug, Clone, PartialEq)]
pub struct OdometryDatagram {
    pub timestamp: f64,
    pub odo_num: u64,
    pub pose: Pose2D,
    pub linear_velocity_x: f64,
    pub linear_velocity_y: f64,
    pub angular_velocity: f64,
    pub velocity_set: u8,
}

/// Read back an odometry datagram
pub fn decode_odometry_datagram(c: &mut ByteCursor<'_>) -> DecodeResult<OdometryDatagram> {
    Ok(OdometryDatagram {
        timestamp: c.read_f64()?,
        odo_num: c.read_u64()?,
        pose: read_pose2d(c)?,
        linear_velocity_x: c.read_f64()?,
        linear_velocity_y: c.read_f64()?,
        angular_velocity: c.read_f64()?,
        velocity_set: c.read_u8()?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Header, Point3, Pose, Twist};
    use approx::assert_relative_eq;

    fn scan(stamp: f64, scan_time: f32) -> LaserScan {
        LaserScan {
            header: Header::new(stamp, "laser"),
            angle_min: -1.0,
            angle_max: 1.0,
            angle_increment: 0.5,
            time_increment: 0.001,
            scan_time,
            range_min: 0.1,
            range_max: 30.0,
            ranges: vec![1.0, 2.0, 3.0, 4.0, 5.0],
            intensities: vec![10.0, 20.0, 30.0, 40.0, 50.0],
        }
    }

    fn decode_laser(bytes: &[u8]) -> LaserDatagram {
        let mut cursor = ByteCursor::new(bytes);
        let datagram = decode_laser_datagram(&mut cursor).unwrap();
        assert_eq!(cursor.remaining(), 0);
        datagram
    }

    #[test]
    fn test_laser_roundtrip() {
        let mut encoder = LaserEncoder::new();
        let input = scan(10.0, 0.1);
        let out = decode_laser(&encoder.encode(&input).unwrap());

        assert_eq!(out.timestamp, 10.0);
        assert_eq!(out.scan_num, 1);
        assert_relative_eq!(out.scan_time, 0.1, epsilon = 1e-6);
        assert_eq!(out.angle_min, -1.0);
        assert_eq!(out.angle_max, 1.0);
        assert_eq!(out.angle_increment, 0.5);
        assert_eq!(out.ranges, input.ranges);
        assert_eq!(out.intensities, input.intensities);
    }

    #[test]
    fn test_laser_sequence_and_derived_scan_time() {
        let mut encoder = LaserEncoder::new();

        let first = decode_laser(&encoder.encode(&scan(10.0, 0.0)).unwrap());
        assert_eq!(first.scan_num, 1);
        assert_eq!(first.scan_time, 0.0);

        let second = decode_laser(&encoder.encode(&scan(10.25, 0.0)).unwrap());
        assert_eq!(second.scan_num, 2);
        assert_relative_eq!(second.scan_time, 0.25, epsilon = 1e-12);

        // Explicit scan_time wins over the derived one
        let third = decode_laser(&encoder.encode(&scan(10.5, 0.2)).unwrap());
        assert_eq!(third.scan_num, 3);
        assert_relative_eq!(third.scan_time, 0.2, epsilon = 1e-6);
        assert_eq!(encoder.sequence(), 3);
    }

    #[test]
    fn test_laser_channels_count_independently() {
        let mut laser = LaserEncoder::new();
        let mut laser2 = LaserEncoder::new();
        laser.encode(&scan(1.0, 0.0)).unwrap();
        laser.encode(&scan(2.0, 0.0)).unwrap();
        let out = decode_laser(&laser2.encode(&scan(3.0, 0.0)).unwrap());
        assert_eq!(out.scan_num, 1);
    }

    #[test]
    fn test_odometry_roundtrip() {
        let mut encoder = OdometryEncoder::new();
        let odom = Odometry {
            header: Header::new(20.0, "odom"),
            child_frame_id: "base_link".to_string(),
            pose: Pose::from(Pose2D::new(1.0, -2.0, 0.75)),
            twist: Twist {
                linear: Point3::new(0.5, 0.1, 0.0),
                angular: Point3::new(0.0, 0.0, 0.3),
            },
        };

        encoder.encode(&odom).unwrap();
        let bytes = encoder.encode(&odom).unwrap();
        assert_eq!(bytes.len(), ODOMETRY_DATAGRAM_SIZE);

        let out = decode_odometry_datagram(&mut ByteCursor::new(&bytes)).unwrap();
        assert_eq!(out.odo_num, 2);
        assert_eq!(out.timestamp, 20.0);
        assert_relative_eq!(out.pose.x, 1.0);
        assert_relative_eq!(out.pose.y, -2.0);
        assert_relative_eq!(out.pose.yaw, 0.75, epsilon = 1e-12);
        assert_eq!(out.linear_velocity_x, 0.5);
        assert_eq!(out.linear_velocity_y, 0.1);
        assert_eq!(out.angular_velocity, 0.3);
        assert_eq!(out.velocity_set, 1);
    }
}
