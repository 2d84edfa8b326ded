//! Decoders for the records the locator streams on its telemetry channels
//!
//! Each decoder reads exactly one record and returns it in structured form.
//! Decoders never consume a partial record on their own; they are run through
//! [`super::DatagramBuffer::try_decode`], which discards the attempt on error.

use super::cursor::{ByteCursor, DecodeResult};
use crate::types::{
    ClientControlMode, ClientGlobalAlignVisualization, ClientLocalizationPose,
    ClientLocalizationVisualization, ClientMapVisualization, Header, Point2, PointCloud, Pose2D,
    PoseArray,
};

/// Encoded size of a [`Point2`]
pub const POINT2_SIZE: usize = 16;
/// Encoded size of a [`Pose2D`]
pub const POSE2D_SIZE: usize = 24;

pub fn read_point2(c: &mut ByteCursor<'_>) -> DecodeResult<Point2> {
    Ok(Point2 {
        x: c.read_f64()?,
        y: c.read_f64()?,
    })
}

pub fn read_pose2d(c: &mut ByteCursor<'_>) -> DecodeResult<Pose2D> {
    Ok(Pose2D {
        x: c.read_f64()?,
        y: c.read_f64()?,
        yaw: c.read_f64()?,
    })
}

fn read_points(c: &mut ByteCursor<'_>) -> DecodeResult<Vec<Point2>> {
    c.read_array(POINT2_SIZE, read_point2)
}

fn read_poses(c: &mut ByteCursor<'_>) -> DecodeResult<Vec<Pose2D>> {
    c.read_array(POSE2D_SIZE, read_pose2d)
}

/// Control mode word
pub fn decode_control_mode(c: &mut ByteCursor<'_>) -> DecodeResult<ClientControlMode> {
    let stamp = c.read_f64()?;
    let raw = c.read_u64()?;
    Ok(ClientControlMode::from_raw(Header::new(stamp, ""), raw))
}

/// Map record from the map, recording and localization map channels
#[derive(Debug, Clone, PartialEq)]
pub struct MapDatagram {
    pub timestamp: f64,
    pub map_name: String,
    pub points: Vec<Point2>,
}

impl MapDatagram {
    /// Point cloud of the map in `frame`
    pub fn to_point_cloud(&self, frame: &str) -> PointCloud {
        PointCloud::from_points(Header::new(self.timestamp, frame), &self.points)
    }
}

pub fn decode_map(c: &mut ByteCursor<'_>) -> DecodeResult<MapDatagram> {
    Ok(MapDatagram {
        timestamp: c.read_f64()?,
        map_name: c.read_string()?,
        points: read_points(c)?,
    })
}

/// Map or recording visualization; point data lands in `frame`
pub fn decode_map_visualization(
    c: &mut ByteCursor<'_>,
    frame: &str,
) -> DecodeResult<ClientMapVisualization> {
    let stamp = c.read_f64()?;
    let header = Header::new(stamp, frame);
    let visualization_id = c.read_u64()?;
    let status = c.read_u16()?;
    let pose = read_pose2d(c)?;
    let distance_to_last_loop_closure = c.read_f64()?;
    let delay = c.read_f64()?;
    let progress = c.read_f64()?;
    let scan = read_points(c)?;
    let path_poses = read_poses(c)?;

    Ok(ClientMapVisualization {
        visualization_id,
        status,
        pose,
        distance_to_last_loop_closure,
        delay,
        progress,
        scan: PointCloud::from_points(header.clone(), &scan),
        path_poses: PoseArray::from_poses(header.clone(), &path_poses),
        header,
    })
}

pub fn decode_localization_visualization(
    c: &mut ByteCursor<'_>,
    frame: &str,
) -> DecodeResult<ClientLocalizationVisualization> {
    let stamp = c.read_f64()?;
    let header = Header::new(stamp, frame);
    let visualization_id = c.read_u64()?;
    let localization_state = c.read_u16()?;
    let pose = read_pose2d(c)?;
    let delay = c.read_f64()?;
    let scan = read_points(c)?;

    Ok(ClientLocalizationVisualization {
        visualization_id,
        localization_state,
        pose,
        delay,
        scan: PointCloud::from_points(header.clone(), &scan),
        header,
    })
}

pub fn decode_localization_pose(
    c: &mut ByteCursor<'_>,
    frame: &str,
) -> DecodeResult<ClientLocalizationPose> {
    let stamp = c.read_f64()?;
    Ok(ClientLocalizationPose {
        header: Header::new(stamp, frame),
        unique_id: c.read_u64()?,
        state: c.read_u32()?,
        error_flags: c.read_u64()?,
        info_flags: c.read_u64()?,
        pose: read_pose2d(c)?,
        covariance: c.read_f64_array::<6>()?,
        pose_age: c.read_f64()?,
        localization_score: c.read_f64()?,
        sensor_offset: read_pose2d(c)?,
        lidar_odo_timestamp: c.read_f64()?,
        lidar_odo_pose: read_pose2d(c)?,
    })
}

pub fn decode_global_align_visualization(
    c: &mut ByteCursor<'_>,
    frame: &str,
) -> DecodeResult<ClientGlobalAlignVisualization> {
    let stamp = c.read_f64()?;
    Ok(ClientGlobalAlignVisualization {
        header: Header::new(stamp, frame),
        visualization_id: c.read_u64()?,
        aligned_poses: read_poses(c)?,
        landmark_poses: read_poses(c)?,
    })
}
