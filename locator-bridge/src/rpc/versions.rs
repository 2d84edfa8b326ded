//! Locator module versions this bridge is written against

use crate::error::{Error, Result};
use std::collections::BTreeMap;

/// Module version as reported by `aboutModules`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ModuleVersion {
    pub major: u64,
    pub minor: u64,
}

impl ModuleVersion {
    pub const fn new(major: u64, minor: u64) -> Self {
        Self { major, minor }
    }

    /// Same major version and at least the required minor version
    pub fn satisfies(&self, required: &ModuleVersion) -> bool {
        self.major == required.major && self.minor >= required.minor
    }
}

impl std::fmt::Display for ModuleVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// Versions reported by the locator, keyed by module name
pub type ModuleVersions = BTreeMap<String, ModuleVersion>;

/// Required module versions
pub const REQUIRED_MODULE_VERSIONS: &[(&str, ModuleVersion)] = &[
    ("AboutModules", ModuleVersion::new(5, 0)),
    ("Session", ModuleVersion::new(3, 1)),
    ("Licensing", ModuleVersion::new(6, 1)),
    ("Config", ModuleVersion::new(5, 0)),
    ("AboutBuild", ModuleVersion::new(3, 0)),
    ("Certificate", ModuleVersion::new(3, 0)),
    ("System", ModuleVersion::new(3, 1)),
    ("ClientControl", ModuleVersion::new(3, 1)),
    ("ClientRecording", ModuleVersion::new(4, 0)),
    ("ClientMap", ModuleVersion::new(4, 0)),
    ("ClientLocalization", ModuleVersion::new(6, 0)),
    ("ClientGlobalAlign", ModuleVersion::new(4, 0)),
    ("ClientSensor", ModuleVersion::new(5, 1)),
];

/// Check reported versions against `required`
///
/// Modules the locator reports beyond `required` are ignored. The first
/// missing or mismatching module fails the check.
pub fn check_module_versions(
    actual: &ModuleVersions,
    required: &[(&str, ModuleVersion)],
) -> Result<()> {
    for (name, required_version) in required {
        let Some(actual_version) = actual.get(*name) else {
            return Err(Error::IncompatibleVersion(format!(
                "module {} not reported by locator",
                name
            )));
        };
        if !actual_version.satisfies(required_version) {
            return Err(Error::IncompatibleVersion(format!(
                "module {} has version {}, required {} (same major, minor >= {})",
                name, actual_version, required_version, required_version.minor
            )));
        }
        log::debug!("Locator module {}: version {} ok", name, actual_version);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_required() -> ModuleVersions {
        REQUIRED_MODULE_VERSIONS
            .iter()
            .map(|(name, version)| (name.to_string(), *version))
            .collect()
    }

    #[test]
    fn test_exact_versions_pass() {
        assert!(check_module_versions(&all_required(), REQUIRED_MODULE_VERSIONS).is_ok());
    }

    #[test]
    fn test_newer_minor_passes() {
        let mut actual = all_required();
        actual.insert("ClientLocalization".into(), ModuleVersion::new(6, 3));
        assert!(check_module_versions(&actual, REQUIRED_MODULE_VERSIONS).is_ok());
    }

    #[test]
    fn test_older_minor_fails() {
        let mut actual = all_required();
        actual.insert("Session".into(), ModuleVersion::new(3, 0));
        let err = check_module_versions(&actual, REQUIRED_MODULE_VERSIONS).unwrap_err();
        assert!(err.to_string().contains("Session"));
    }

    #[test]
    fn test_major_mismatch_fails() {
        let mut actual = all_required();
        actual.insert("ClientMap".into(), ModuleVersion::new(5, 0));
        assert!(matches!(
            check_module_versions(&actual, REQUIRED_MODULE_VERSIONS),
            Err(Error::IncompatibleVersion(_))
        ));
    }

    #[test]
    fn test_missing_module_fails() {
        let mut actual = all_required();
        actual.remove("ClientSensor");
        let err = check_module_versions(&actual, REQUIRED_MODULE_VERSIONS).unwrap_err();
        assert!(err.to_string().contains("ClientSensor"));
    }

    #[test]
    fn test_extra_modules_ignored() {
        let mut actual = all_required();
        actual.insert("ClientExpandMap".into(), ModuleVersion::new(2, 0));
        assert!(check_module_versions(&actual, REQUIRED_MODULE_VERSIONS).is_ok());
    }

    #[test]
    fn test_custom_registry() {
        let required = [("Session", ModuleVersion::new(3, 1))];

        let mut actual = ModuleVersions::new();
        actual.insert("Session".into(), ModuleVersion::new(3, 1));
        assert!(check_module_versions(&actual, &required).is_ok());

        let mut actual = ModuleVersions::new();
        actual.insert("Session".into(), ModuleVersion::new(3, 0));
        assert!(check_module_versions(&actual, &required).is_err());
    }
}
