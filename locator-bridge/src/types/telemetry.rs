//! Structured records decoded from the locator's telemetry channels

use super::geometry::{
    Header, Pose2D, PoseArray, PoseStamped, PoseWithCovarianceStamped, PointCloud,
    TransformStamped,
};
use serde::Serialize;

/// Locator control mode, one 3-bit field per subsystem
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ClientControlMode {
    pub header: Header,
    /// Raw 64-bit word as received
    pub raw: u64,
    pub mask_state: u8,
    pub map_state: u8,
    pub visual_recording_state: u8,
    pub recording_state: u8,
    pub localization_state: u8,
    pub manual_align_state: u8,
    pub global_align_state: u8,
    pub expand_map_state: u8,
}

impl ClientControlMode {
    const FIELD_BITS: u32 = 3;
    const FIELD_MASK: u64 = 0b111;

    fn field(raw: u64, index: u32) -> u8 {
        ((raw >> (index * Self::FIELD_BITS)) & Self::FIELD_MASK) as u8
    }

    /// Split a raw control mode word into its subsystem states
    pub fn from_raw(header: Header, raw: u64) -> Self {
        Self {
            header,
            raw,
            mask_state: Self::field(raw, 0),
            map_state: Self::field(raw, 1),
            visual_recording_state: Self::field(raw, 2),
            recording_state: Self::field(raw, 3),
            localization_state: Self::field(raw, 4),
            manual_align_state: Self::field(raw, 5),
            global_align_state: Self::field(raw, 6),
            expand_map_state: Self::field(raw, 7),
        }
    }
}

/// Overlay sent while mapping or recording
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ClientMapVisualization {
    pub header: Header,
    pub visualization_id: u64,
    pub status: u16,
    pub pose: Pose2D,
    pub distance_to_last_loop_closure: f64,
    pub delay: f64,
    pub progress: f64,
    pub scan: PointCloud,
    pub path_poses: PoseArray,
}

/// Overlay sent while localizing
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ClientLocalizationVisualization {
    pub header: Header,
    pub visualization_id: u64,
    pub localization_state: u16,
    pub pose: Pose2D,
    pub delay: f64,
    pub scan: PointCloud,
}

/// Localization result
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ClientLocalizationPose {
    pub header: Header,
    pub unique_id: u64,
    pub state: u32,
    pub error_flags: u64,
    pub info_flags: u64,
    pub pose: Pose2D,
    /// Upper triangle of the (x, y, yaw) covariance
    pub covariance: [f64; 6],
    pub pose_age: f64,
    pub localization_score: f64,
    pub sensor_offset: Pose2D,
    pub lidar_odo_timestamp: f64,
    pub lidar_odo_pose: Pose2D,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ClientGlobalAlignVisualization {
    pub header: Header,
    pub visualization_id: u64,
    pub aligned_poses: Vec<Pose2D>,
    pub landmark_poses: Vec<Pose2D>,
}

/// Payload of one outbound telemetry message
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "data")]
pub enum Payload {
    ControlMode(ClientControlMode),
    PointCloud(PointCloud),
    MapVisualization(ClientMapVisualization),
    LocalizationVisualization(ClientLocalizationVisualization),
    LocalizationPose(ClientLocalizationPose),
    GlobalAlignVisualization(ClientGlobalAlignVisualization),
    Pose(PoseStamped),
    PoseWithCovariance(PoseWithCovarianceStamped),
    PoseArray(PoseArray),
    Transform(TransformStamped),
}

/// Decoded record tagged with the topic it is published on
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TelemetryMessage {
    pub topic: String,
    pub payload: Payload,
}

impl TelemetryMessage {
    pub fn new(topic: impl Into<String>, payload: Payload) -> Self {
        Self {
            topic: topic.into(),
            payload,
        }
    }

    /// Message on `<base>/<suffix>`
    pub fn sub(base: &str, suffix: &str, payload: Payload) -> Self {
        Self::new(format!("{}/{}", base, suffix), payload)
    }
}
