//! Start-up configuration sync with the locator

use crate::error::Result;
use crate::rpc::{ConfigDocument, SessionClient};
use log::info;

pub const LASER_TYPE_KEY: &str = "ClientSensor.laser.type";
pub const LASER2_ENABLE_KEY: &str = "ClientSensor.enableLaser2";
pub const LASER2_TYPE_KEY: &str = "ClientSensor.laser2.type";
pub const ODOMETRY_ENABLE_KEY: &str = "ClientSensor.enableOdometry";

/// `ClientSensor.<laser>.useIntensities` is `true` in `config`
pub fn uses_intensities(config: &ConfigDocument, laser: &str) -> bool {
    config.display(&format!("ClientSensor.{}.useIntensities", laser)) == "true"
}

/// Laser type for which the bridge supplies scans
const SIMPLE_LASER: &str = "simple";

/// Sensor channels the bridge feeds, derived from the locator configuration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SensorFlags {
    pub laser: bool,
    pub laser2: bool,
    pub odometry: bool,
}

impl SensorFlags {
    pub fn from_config(config: &ConfigDocument) -> Self {
        Self {
            laser: config.display(LASER_TYPE_KEY) == SIMPLE_LASER,
            laser2: config.display(LASER2_ENABLE_KEY) == "true"
                && config.display(LASER2_TYPE_KEY) == SIMPLE_LASER,
            odometry: config.display(ODOMETRY_ENABLE_KEY) == "true",
        }
    }

    fn log(&self, config: &ConfigDocument) {
        let provided = |on: bool| if on { "will be provided" } else { "will not be provided" };
        info!(
            "{}: '{}', laser data {}",
            LASER_TYPE_KEY,
            config.display(LASER_TYPE_KEY),
            provided(self.laser)
        );
        info!(
            "{}: '{}', {}: '{}', laser2 data {}",
            LASER2_ENABLE_KEY,
            config.display(LASER2_ENABLE_KEY),
            LASER2_TYPE_KEY,
            config.display(LASER2_TYPE_KEY),
            provided(self.laser2)
        );
        info!(
            "{}: '{}', odometry data {}",
            ODOMETRY_ENABLE_KEY,
            config.display(ODOMETRY_ENABLE_KEY),
            provided(self.odometry)
        );
    }
}

/// Fetch the locator configuration, apply `overrides` and write it back
///
/// Returns the configuration as written together with the derived flags.
pub fn sync_config(
    session: &SessionClient,
    overrides: &ConfigDocument,
) -> Result<(ConfigDocument, SensorFlags)> {
    info!("Syncing locator config ({} overrides)", overrides.len());
    let mut config = session.get_config_list()?;
    config.merge(overrides);

    for (key, value) in config.iter() {
        log::debug!("- {}: {}", key, value);
    }

    let flags = SensorFlags::from_config(&config);
    flags.log(&config);

    session.set_config_list(&config)?;
    Ok((config, flags))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::mock::MockTransport;

    fn config(entries: &[(&str, &str)]) -> ConfigDocument {
        let mut doc = ConfigDocument::new();
        for (key, value) in entries {
            doc.set(key, *value);
        }
        doc
    }

    #[test]
    fn test_flags_from_config() {
        let flags = SensorFlags::from_config(&config(&[
            (LASER_TYPE_KEY, "simple"),
            (LASER2_ENABLE_KEY, "true"),
            (LASER2_TYPE_KEY, "simple"),
            (ODOMETRY_ENABLE_KEY, "true"),
        ]));
        assert_eq!(
            flags,
            SensorFlags {
                laser: true,
                laser2: true,
                odometry: true
            }
        );
    }

    #[test]
    fn test_laser2_needs_enable_and_type() {
        let flags = SensorFlags::from_config(&config(&[
            (LASER_TYPE_KEY, "multiple"),
            (LASER2_ENABLE_KEY, "false"),
            (LASER2_TYPE_KEY, "simple"),
        ]));
        assert!(!flags.laser);
        assert!(!flags.laser2);
        assert!(!flags.odometry);
    }

    #[test]
    fn test_bool_values_compare_as_strings() {
        let mut doc = ConfigDocument::new();
        doc.set(ODOMETRY_ENABLE_KEY, true);
        assert!(SensorFlags::from_config(&doc).odometry);
    }

    #[test]
    fn test_intensity_setting_per_laser() {
        let mut doc = ConfigDocument::new();
        doc.set("ClientSensor.laser.useIntensities", true)
            .set("ClientSensor.laser2.useIntensities", "false");
        assert!(uses_intensities(&doc, "laser"));
        assert!(!uses_intensities(&doc, "laser2"));
        assert!(!uses_intensities(&ConfigDocument::new(), "laser"));
    }

    #[test]
    fn test_sync_applies_overrides() {
        let mock = MockTransport::locator(&config(&[
            (LASER_TYPE_KEY, "none"),
            ("ClientLocalization.activeMapName", "old"),
        ]));
        let session = SessionClient::new(mock.clone());
        session.login("u", "p").unwrap();

        let mut overrides = ConfigDocument::new();
        overrides.set(LASER_TYPE_KEY, "simple").set(ODOMETRY_ENABLE_KEY, true);

        let (synced, flags) = sync_config(&session, &overrides).unwrap();
        assert!(flags.laser);
        assert!(flags.odometry);
        assert_eq!(synced.display("ClientLocalization.activeMapName"), "old");

        let written = &mock.calls_to("configSet")[0];
        let entries = written.query.get_array("configEntries").unwrap();
        let written = ConfigDocument::from_entries(entries).unwrap();
        assert_eq!(written, synced);
    }
}
