use derive_builder::Builder;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::err::ConfigErr;

/// settings used by [crate::parse::parse], [crate::validate::validate] and
/// [crate::build::build]
pub static DEFAULT_SETTINGS: Lazy<Settings> = Lazy::new(Settings::default);

/// Settings are provided by the embedding service, usually as a YAML block:
///
/// ```yaml
/// legacy: true
/// strict-object-types: true
/// limits:
///   max-uri-len: 2048
///   max-path-segments: 64
///   max-selector-len: 512
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "kebab-case", default)]
pub struct Settings {
    /// accept the dotted `db://{database-id}.{object}.{field}` format
    pub legacy: bool,
    /// when `false` object types outside a protocol's legal set are accepted
    /// and permit every segment type
    pub strict_object_types: bool,
    pub limits: Limits,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            legacy: true,
            strict_object_types: true,
            limits: Limits::default(),
        }
    }
}

impl Settings {
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigErr> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    pub fn lenient(mut self) -> Self {
        self.strict_object_types = false;
        self
    }
}

/// bounds on attacker controlled input.  Parsing fails before any work is
/// done on input over these bounds.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq, Builder)]
#[serde(rename_all = "kebab-case", default)]
pub struct Limits {
    #[builder(default = "2048")]
    pub max_uri_len: usize,
    #[builder(default = "64")]
    pub max_path_segments: usize,
    #[builder(default = "512")]
    pub max_selector_len: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_uri_len: 2048,
            max_path_segments: 64,
            max_selector_len: 512,
        }
    }
}

#[cfg(test)]
pub mod test {
    use crate::settings::{LimitsBuilder, Settings, DEFAULT_SETTINGS};

    #[test]
    pub fn yaml_round_trip() {
        let original = Settings::default().lenient();
        let yaml = serde_yaml::to_string(&original).unwrap();
        let settings = Settings::from_yaml(yaml.as_str()).unwrap();
        assert_eq!(settings, original);
    }

    #[test]
    pub fn partial_yaml_uses_defaults() {
        let settings = Settings::from_yaml("limits:\n  max-path-segments: 4\n").unwrap();
        assert!(settings.legacy);
        assert!(settings.strict_object_types);
        assert_eq!(settings.limits.max_path_segments, 4);
        assert_eq!(settings.limits.max_uri_len, DEFAULT_SETTINGS.limits.max_uri_len);
    }

    #[test]
    pub fn bad_yaml() {
        assert!(Settings::from_yaml("legacy: [1, 2]").is_err());
    }

    #[test]
    pub fn limits_builder() {
        let limits = LimitsBuilder::default().max_uri_len(32).build().unwrap();
        assert_eq!(limits.max_uri_len, 32);
        assert_eq!(limits.max_selector_len, 512);
    }
}
