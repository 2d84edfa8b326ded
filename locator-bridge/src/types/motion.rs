//! Odometry readings pushed to the locator

use super::geometry::{Header, Point3, Pose};
use serde::Serialize;

/// Linear and angular velocity
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Twist {
    /// Linear velocity in m/s
    pub linear: Point3,
    /// Angular velocity in rad/s
    pub angular: Point3,
}

/// Odometry estimate from the robot's wheel or visual odometry
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Odometry {
    pub header: Header,
    pub child_frame_id: String,
    pub pose: Pose,
    pub twist: Twist,
}
