//! Recording, mapping and localization control of the locator
//!
//! Empty name arguments fall back to the last recording or map this
//! controller started. A name is remembered only once the locator accepted
//! the call that introduced it.

use crate::error::{Error, Result};
use crate::rpc::{ConfigDocument, Document, SessionClient};
use crate::types::PoseWithCovarianceStamped;
use log::{info, warn};
use parking_lot::Mutex;
use serde_json::{Value, json};
use std::sync::Arc;

/// Config key selecting the map used for localization
pub const ACTIVE_MAP_KEY: &str = "ClientLocalization.activeMapName";

pub struct Controller {
    session: Arc<SessionClient>,
    map_frame: String,
    last_recording: Mutex<String>,
    last_map: Mutex<String>,
}

impl Controller {
    pub fn new(session: Arc<SessionClient>, map_frame: &str) -> Self {
        Self {
            session,
            map_frame: map_frame.to_string(),
            last_recording: Mutex::new(String::new()),
            last_map: Mutex::new(String::new()),
        }
    }

    pub fn last_recording(&self) -> String {
        self.last_recording.lock().clone()
    }

    pub fn last_map(&self) -> String {
        self.last_map.lock().clone()
    }

    fn or_last(name: &str, last: &Mutex<String>) -> String {
        if name.is_empty() {
            last.lock().clone()
        } else {
            name.to_string()
        }
    }

    /// Display string of one locator config entry
    pub fn get_config_entry(&self, name: &str) -> Result<String> {
        self.session.get_config_entry(name)
    }

    pub fn start_visual_recording(&self, name: &str) -> Result<()> {
        let query = Document::new().with("recordingName", name);
        self.session.call("clientRecordingStartVisualRecording", query)?;
        *self.last_recording.lock() = name.to_string();
        info!("Visual recording '{}' started", name);
        Ok(())
    }

    pub fn stop_visual_recording(&self) -> Result<()> {
        self.session
            .call("clientRecordingStopVisualRecording", Document::new())?;
        info!("Visual recording stopped");
        Ok(())
    }

    /// Build a client map from a recording
    ///
    /// An empty `recording_name` uses the last recording; an empty
    /// `client_map_name` becomes `map-from-<recording>`.
    pub fn start_map(&self, recording_name: &str, client_map_name: &str) -> Result<()> {
        let recording = Self::or_last(recording_name, &self.last_recording);
        let map = if client_map_name.is_empty() {
            format!("map-from-{}", recording)
        } else {
            client_map_name.to_string()
        };

        let query = Document::new()
            .with("recordingName", recording.as_str())
            .with("clientMapName", map.as_str());
        self.session.call("clientMapStart", query)?;
        info!("Client map '{}' started from recording '{}'", map, recording);
        *self.last_map.lock() = map;
        Ok(())
    }

    pub fn stop_map(&self) -> Result<()> {
        self.session.call("clientMapStop", Document::new())?;
        Ok(())
    }

    pub fn start_localization(&self) -> Result<()> {
        self.session.call("clientLocalizationStart", Document::new())?;
        info!("Localization started");
        Ok(())
    }

    pub fn stop_localization(&self) -> Result<()> {
        self.session.call("clientLocalizationStop", Document::new())?;
        info!("Localization stopped");
        Ok(())
    }

    /// Send a client map to the map server; empty `name` sends the last map
    pub fn send_map(&self, name: &str) -> Result<()> {
        let map = Self::or_last(name, &self.last_map);
        self.session
            .call("clientMapSend", Document::new().with("clientMapName", map))?;
        Ok(())
    }

    /// Make `name` the active localization map; empty `name` uses the last map
    pub fn set_map(&self, name: &str) -> Result<()> {
        let map = Self::or_last(name, &self.last_map);
        let mut config = ConfigDocument::new();
        config.set(ACTIVE_MAP_KEY, map.as_str());
        self.session.set_config_list(&config)?;
        info!("Active map set to '{}'", map);
        Ok(())
    }

    /// Names of the client maps stored on the locator
    pub fn list_client_maps(&self) -> Result<Vec<String>> {
        let response = self.session.call("clientMapList", Document::new())?;
        let names = response
            .get_array("clientMapNames")
            .map(|entries| {
                entries
                    .iter()
                    .map(|entry| match entry {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    })
                    .collect()
            })
            .unwrap_or_default();
        Ok(names)
    }

    /// Seed the localization with `pose`, which must be in the map frame
    pub fn set_seed(&self, pose: &PoseWithCovarianceStamped) -> Result<()> {
        if pose.header.frame_id != self.map_frame {
            warn!(
                "Seed pose sent in wrong frame '{}', expected '{}'",
                pose.header.frame_id, self.map_frame
            );
            return Err(Error::WrongFrame {
                expected: self.map_frame.clone(),
                actual: pose.header.frame_id.clone(),
            });
        }

        let seed = pose.pose.to_pose2d();
        let query = Document::new()
            .with("enforceSeed", true)
            .with("seedPose", json!({"x": seed.x, "y": seed.y, "a": seed.yaw}));
        self.session.call("clientLocalizationSetSeed", query)?;
        info!("Seed pose set to ({:.3}, {:.3}, {:.3})", seed.x, seed.y, seed.yaw);
        Ok(())
    }
}
