//! The locator's binary telemetry channels
//!
//! Every channel is a fixed TCP port on the locator plus a decode strategy
//! turning one record into the messages published for it. The receive loop
//! itself is generic, see [`super::receiver`].

use crate::codec::decode::{
    decode_control_mode, decode_global_align_visualization, decode_localization_pose,
    decode_localization_visualization, decode_map, decode_map_visualization,
};
use crate::codec::{ByteCursor, DecodeResult};
use crate::types::{
    Header, Payload, Pose, PoseArray, PoseStamped, PoseWithCovarianceStamped, TelemetryMessage,
    TransformStamped, pack_covariance,
};

/// One binary channel the locator streams on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReceiveChannel {
    ControlMode,
    MapMap,
    MapVisualization,
    RecordingMap,
    RecordingVisualization,
    LocalizationMap,
    LocalizationVisualization,
    LocalizationPose,
    GlobalAlignVisualization,
}

impl ReceiveChannel {
    pub const ALL: [ReceiveChannel; 9] = [
        ReceiveChannel::ControlMode,
        ReceiveChannel::MapMap,
        ReceiveChannel::MapVisualization,
        ReceiveChannel::RecordingMap,
        ReceiveChannel::RecordingVisualization,
        ReceiveChannel::LocalizationMap,
        ReceiveChannel::LocalizationVisualization,
        ReceiveChannel::LocalizationPose,
        ReceiveChannel::GlobalAlignVisualization,
    ];

    /// Port the locator serves this channel on
    pub fn default_port(self) -> u16 {
        match self {
            ReceiveChannel::ControlMode => 9004,
            ReceiveChannel::MapMap => 9005,
            ReceiveChannel::MapVisualization => 9006,
            ReceiveChannel::RecordingMap => 9007,
            ReceiveChannel::RecordingVisualization => 9008,
            ReceiveChannel::LocalizationMap => 9009,
            ReceiveChannel::LocalizationVisualization => 9010,
            ReceiveChannel::LocalizationPose => 9011,
            ReceiveChannel::GlobalAlignVisualization => 9012,
        }
    }

    /// Base topic; sub-topics hang below it
    pub fn default_topic(self) -> &'static str {
        match self {
            ReceiveChannel::ControlMode => "client_control_mode",
            ReceiveChannel::MapMap => "client_map_map",
            ReceiveChannel::MapVisualization => "client_map_visualization",
            ReceiveChannel::RecordingMap => "client_recording_map",
            ReceiveChannel::RecordingVisualization => "client_recording_visualization",
            ReceiveChannel::LocalizationMap => "client_localization_map",
            ReceiveChannel::LocalizationVisualization => "client_localization_visualization",
            ReceiveChannel::LocalizationPose => "client_localization_pose",
            ReceiveChannel::GlobalAlignVisualization => "client_global_align_visualization",
        }
    }
}

impl std::fmt::Display for ReceiveChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.default_topic())
    }
}

/// Turns records of one channel into published messages
#[derive(Debug, Clone)]
pub struct ChannelDecoder {
    pub channel: ReceiveChannel,
    pub topic: String,
    pub map_frame: String,
    pub laser_frame: String,
}

impl ChannelDecoder {
    pub fn new(channel: ReceiveChannel, topic: &str, map_frame: &str, laser_frame: &str) -> Self {
        Self {
            channel,
            topic: topic.to_string(),
            map_frame: map_frame.to_string(),
            laser_frame: laser_frame.to_string(),
        }
    }

    /// Decoder with the channel's default topic
    pub fn with_defaults(channel: ReceiveChannel, map_frame: &str, laser_frame: &str) -> Self {
        Self::new(channel, channel.default_topic(), map_frame, laser_frame)
    }

    fn sub(&self, suffix: &str, payload: Payload) -> TelemetryMessage {
        TelemetryMessage::sub(&self.topic, suffix, payload)
    }

    fn main(&self, payload: Payload) -> TelemetryMessage {
        TelemetryMessage::new(self.topic.clone(), payload)
    }

    fn transform(&self, pose: &PoseStamped) -> TelemetryMessage {
        let tf = TransformStamped::from_pose(pose, &self.map_frame, &self.laser_frame);
        TelemetryMessage::new("tf", Payload::Transform(tf))
    }

    /// Decode one record into the messages published for it
    pub fn decode(&self, c: &mut ByteCursor<'_>) -> DecodeResult<Vec<TelemetryMessage>> {
        let frame = self.map_frame.as_str();
        let messages = match self.channel {
            ReceiveChannel::ControlMode => {
                vec![self.main(Payload::ControlMode(decode_control_mode(c)?))]
            }
            ReceiveChannel::MapMap
            | ReceiveChannel::RecordingMap
            | ReceiveChannel::LocalizationMap => {
                let map = decode_map(c)?;
                log::debug!(
                    "{}: map '{}' with {} points",
                    self.topic,
                    map.map_name,
                    map.points.len()
                );
                vec![self.main(Payload::PointCloud(map.to_point_cloud(frame)))]
            }
            ReceiveChannel::MapVisualization | ReceiveChannel::RecordingVisualization => {
                let vis = decode_map_visualization(c, frame)?;
                let pose = PoseStamped {
                    header: vis.header.clone(),
                    pose: Pose::from(vis.pose),
                };
                vec![
                    self.transform(&pose),
                    self.sub("pose", Payload::Pose(pose)),
                    self.sub("scan", Payload::PointCloud(vis.scan.clone())),
                    self.sub("path_poses", Payload::PoseArray(vis.path_poses.clone())),
                    self.main(Payload::MapVisualization(vis)),
                ]
            }
            ReceiveChannel::LocalizationVisualization => {
                let vis = decode_localization_visualization(c, frame)?;
                let pose = PoseStamped {
                    header: vis.header.clone(),
                    pose: Pose::from(vis.pose),
                };
                vec![
                    self.sub("pose", Payload::Pose(pose)),
                    self.sub("scan", Payload::PointCloud(vis.scan.clone())),
                    self.main(Payload::LocalizationVisualization(vis)),
                ]
            }
            ReceiveChannel::LocalizationPose => {
                let record = decode_localization_pose(c, frame)?;
                let pose = PoseStamped {
                    header: record.header.clone(),
                    pose: Pose::from(record.pose),
                };
                let with_covariance = PoseWithCovarianceStamped {
                    header: record.header.clone(),
                    pose: pose.pose,
                    covariance: pack_covariance(record.covariance),
                };
                let lidar_odo_pose = PoseStamped {
                    header: Header::new(record.lidar_odo_timestamp, frame),
                    pose: Pose::from(record.lidar_odo_pose),
                };
                vec![
                    self.transform(&pose),
                    self.sub("pose", Payload::PoseWithCovariance(with_covariance)),
                    self.sub("lidar_odo_pose", Payload::Pose(lidar_odo_pose)),
                    self.main(Payload::LocalizationPose(record)),
                ]
            }
            ReceiveChannel::GlobalAlignVisualization => {
                let vis = decode_global_align_visualization(c, frame)?;
                let poses = PoseArray::from_poses(vis.header.clone(), &vis.aligned_poses);
                let landmarks = PoseArray::from_poses(vis.header.clone(), &vis.landmark_poses);
                vec![
                    self.sub("poses", Payload::PoseArray(poses)),
                    self.sub("landmarks/poses", Payload::PoseArray(landmarks)),
                    self.main(Payload::GlobalAlignVisualization(vis)),
                ]
            }
        };
        Ok(messages)
    }
}
