use crate::engine::DirectiveKind;
use serde::Deserialize;
use std::fmt;

/// Markup conventions and engine limits.
///
/// Every field has a default, so a JSON document only needs the fields it
/// changes:
///
/// ```
/// let config = vortex::EngineConfig::from_json_str(r#"{ "attribute_prefix": "data-vx-" }"#).unwrap();
/// assert_eq!(config.attribute(vortex::DirectiveKind::Bind), "data-vx-bind");
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Prepended to every directive suffix (`bind`, `show`, ...).
    pub attribute_prefix: String,
    /// Marks the subtrees `MountTarget::Zones` mounts.
    pub zone_attribute: String,
    /// Skip bindings whose dependencies do not overlap the changed paths.
    pub track_dependencies: bool,
    /// Diagnostics kept in memory; older records are dropped first.
    pub max_diagnostics: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            attribute_prefix: "vx-".to_string(),
            zone_attribute: "vx-zone".to_string(),
            track_dependencies: true,
            max_diagnostics: 512,
        }
    }
}

impl EngineConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = serde_json::from_str(json).map_err(ConfigError::Json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let is_attribute_name = |name: &str| {
            name.chars()
                .all(|character| character.is_ascii_alphanumeric() || matches!(character, '-' | '_' | ':'))
        };
        if self.attribute_prefix.is_empty() || !is_attribute_name(&self.attribute_prefix) {
            return Err(ConfigError::Invalid {
                field: "attribute_prefix",
                reason: format!("'{}' is not a valid attribute prefix", self.attribute_prefix),
            });
        }
        if self.zone_attribute.is_empty() || !is_attribute_name(&self.zone_attribute) {
            return Err(ConfigError::Invalid {
                field: "zone_attribute",
                reason: format!("'{}' is not a valid attribute name", self.zone_attribute),
            });
        }
        Ok(())
    }

    pub fn zone_selector(&self) -> String {
        format!("[{}]", self.zone_attribute)
    }

    /// Full attribute name for a directive kind, e.g. `vx-bind`.
    pub fn attribute(&self, kind: DirectiveKind) -> String {
        format!("{}{}", self.attribute_prefix, kind.suffix())
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Json(serde_json::Error),
    Invalid { field: &'static str, reason: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ConfigError::Json(error) => write!(f, "invalid configuration: {error}"),
            ConfigError::Invalid { field, reason } => write!(f, "invalid `{field}`: {reason}"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Json(error) => Some(error),
            ConfigError::Invalid { .. } => None,
        }
    }
}
