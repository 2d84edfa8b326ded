//! Laser scan readings pushed to the locator

use super::geometry::Header;
use serde::Serialize;

/// One planar laser scan
///
/// Field layout follows the common robotics laser scan message: angles in
/// radians, ranges in meters, `scan_time == 0.0` means "not set".
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LaserScan {
    pub header: Header,
    pub angle_min: f32,
    pub angle_max: f32,
    pub angle_increment: f32,
    /// Time between measurements (seconds)
    pub time_increment: f32,
    /// Time between scans (seconds)
    pub scan_time: f32,
    pub range_min: f32,
    pub range_max: f32,
    pub ranges: Vec<f32>,
    pub intensities: Vec<f32>,
}

impl LaserScan {
    /// Number of range readings
    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// Angle of the last beam implied by `angle_min`, increment and beam count
    pub fn implied_angle_max(&self) -> f64 {
        let steps = self.ranges.len().saturating_sub(1) as f64;
        f64::from(self.angle_min) + steps * f64::from(self.angle_increment)
    }

    /// True if the implied last beam lies within half an increment of `angle_max`
    pub fn angles_consistent(&self) -> bool {
        (self.implied_angle_max() - f64::from(self.angle_max)).abs()
            <= (0.5 * f64::from(self.angle_increment)).abs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan(angle_min: f32, angle_increment: f32, beams: usize, angle_max: f32) -> LaserScan {
        LaserScan {
            angle_min,
            angle_max,
            angle_increment,
            ranges: vec![1.0; beams],
            ..Default::default()
        }
    }

    #[test]
    fn test_consistent_scan() {
        assert!(scan(0.0, 0.01, 101, 1.0).angles_consistent());
    }

    #[test]
    fn test_inconsistent_scan() {
        assert!(!scan(0.0, 0.01, 101, 1.5).angles_consistent());
    }

    #[test]
    fn test_half_increment_tolerance() {
        // 0.004 off with a 0.01 increment is still accepted
        assert!(scan(0.0, 0.01, 101, 1.004).angles_consistent());
        assert!(!scan(0.0, 0.01, 101, 1.006).angles_consistent());
    }
}
