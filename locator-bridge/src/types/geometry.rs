//! Geometry value types handed to the messaging layer

use serde::{Deserialize, Serialize, Serializer};

/// Message header: timestamp plus reference frame
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Header {
    /// Seconds since the Unix epoch
    pub stamp: f64,
    pub frame_id: String,
}

impl Header {
    pub fn new(stamp: f64, frame_id: &str) -> Self {
        Self {
            stamp,
            frame_id: frame_id.to_string(),
        }
    }
}

/// 2D point as transmitted by the locator
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Point2 {
    pub x: f64,
    pub y: f64,
}

/// 3D point or vector
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Point3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Point3 {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

/// Planar pose in the locator's convention (meters, radians)
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Pose2D {
    pub x: f64,
    pub y: f64,
    pub yaw: f64,
}

impl Pose2D {
    pub fn new(x: f64, y: f64, yaw: f64) -> Self {
        Self { x, y, yaw }
    }
}

/// Orientation quaternion
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Quaternion {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub w: f64,
}

impl Quaternion {
    /// Rotation about the z axis
    pub fn from_yaw(yaw: f64) -> Self {
        let half = 0.5 * yaw;
        Self {
            x: 0.0,
            y: 0.0,
            z: half.sin(),
            w: half.cos(),
        }
    }

    /// Heading component (rotation about z), in (-π, π]
    pub fn yaw(&self) -> f64 {
        let siny_cosp = 2.0 * (self.w * self.z + self.x * self.y);
        let cosy_cosp = 1.0 - 2.0 * (self.y * self.y + self.z * self.z);
        siny_cosp.atan2(cosy_cosp)
    }
}

impl Default for Quaternion {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            z: 0.0,
            w: 1.0,
        }
    }
}

/// 3D pose
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Pose {
    pub position: Point3,
    pub orientation: Quaternion,
}

impl From<Pose2D> for Pose {
    fn from(pose: Pose2D) -> Self {
        Self {
            position: Point3::new(pose.x, pose.y, 0.0),
            orientation: Quaternion::from_yaw(pose.yaw),
        }
    }
}

impl Pose {
    /// Project onto the ground plane
    pub fn to_pose2d(&self) -> Pose2D {
        Pose2D::new(self.position.x, self.position.y, self.orientation.yaw())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PoseStamped {
    pub header: Header,
    pub pose: Pose,
}

/// Row-major 6x6 covariance over (x, y, z, roll, pitch, yaw)
pub type Covariance6 = [f64; 36];

/// Matrix slots filled from the locator's compact covariance
///
/// The locator reports the upper triangle of the planar (x, y, yaw) block:
/// xx, xy, x-yaw, yy, y-yaw, yaw-yaw.
pub const COVARIANCE_SLOTS: [usize; 6] = [0, 1, 5, 7, 11, 35];

/// Expand the locator's six covariance values into a 6x6 matrix
pub fn pack_covariance(compact: [f64; 6]) -> Covariance6 {
    let mut matrix = [0.0; 36];
    for (slot, value) in COVARIANCE_SLOTS.iter().zip(compact) {
        matrix[*slot] = value;
    }
    matrix
}

fn serialize_covariance<S: Serializer>(values: &Covariance6, s: S) -> Result<S::Ok, S::Error> {
    s.collect_seq(values.iter())
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PoseWithCovarianceStamped {
    pub header: Header,
    pub pose: Pose,
    #[serde(serialize_with = "serialize_covariance")]
    pub covariance: Covariance6,
}

impl Default for PoseWithCovarianceStamped {
    fn default() -> Self {
        Self {
            header: Header::default(),
            pose: Pose::default(),
            covariance: [0.0; 36],
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PoseArray {
    pub header: Header,
    pub poses: Vec<Pose>,
}

impl PoseArray {
    pub fn from_poses(header: Header, poses: &[Pose2D]) -> Self {
        Self {
            header,
            poses: poses.iter().copied().map(Pose::from).collect(),
        }
    }
}

/// Unorganized xyz point cloud
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PointCloud {
    pub header: Header,
    pub points: Vec<[f32; 3]>,
}

impl PointCloud {
    /// Planar cloud at z = 0
    pub fn from_points(header: Header, points: &[Point2]) -> Self {
        Self {
            header,
            points: points
                .iter()
                .map(|p| [p.x as f32, p.y as f32, 0.0])
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Frame transform broadcast alongside pose-bearing channels
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TransformStamped {
    /// Parent frame and stamp
    pub header: Header,
    pub child_frame_id: String,
    pub translation: Point3,
    pub rotation: Quaternion,
}

impl TransformStamped {
    /// Transform placing `child_frame` at `pose` inside `parent_frame`
    pub fn from_pose(pose: &PoseStamped, parent_frame: &str, child_frame: &str) -> Self {
        Self {
            header: Header::new(pose.header.stamp, parent_frame),
            child_frame_id: child_frame.to_string(),
            translation: pose.pose.position,
            rotation: pose.pose.orientation,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_pack_covariance_slots() {
        let matrix = pack_covariance([1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        let expected: [(usize, f64); 6] =
            [(0, 1.0), (1, 2.0), (5, 3.0), (7, 4.0), (11, 5.0), (35, 6.0)];
        for (i, value) in matrix.iter().enumerate() {
            match expected.iter().find(|(slot, _)| *slot == i) {
                Some((_, v)) => assert_eq!(*value, *v, "slot {}", i),
                None => assert_eq!(*value, 0.0, "slot {} should be zero", i),
            }
        }
    }

    #[test]
    fn test_quaternion_yaw_roundtrip() {
        for yaw in [-3.0, -1.0, 0.0, 0.5, 1.5707, 3.1] {
            assert_relative_eq!(Quaternion::from_yaw(yaw).yaw(), yaw, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_transform_from_pose() {
        let pose = PoseStamped {
            header: Header::new(12.5, "map"),
            pose: Pose::from(Pose2D::new(1.0, 2.0, 0.25)),
        };
        let tf = TransformStamped::from_pose(&pose, "map", "laser");
        assert_eq!(tf.header.frame_id, "map");
        assert_eq!(tf.child_frame_id, "laser");
        assert_eq!(tf.header.stamp, 12.5);
        assert_eq!(tf.translation, Point3::new(1.0, 2.0, 0.0));
        assert_relative_eq!(tf.rotation.yaw(), 0.25, epsilon = 1e-12);
    }

    #[test]
    fn test_covariance_serializes_as_list() {
        let msg = PoseWithCovarianceStamped::default();
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["covariance"].as_array().unwrap().len(), 36);
    }
}
