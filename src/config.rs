//! Engine settings loaded from YAML.

use std::path::{Path, PathBuf};

use cro_render::config::RendererConfig;
use serde::{Deserialize, Serialize};

use crate::logging::LogSettings;

/// Errors that can occur while loading an [`EngineConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("Could not read config file {path:?}: {source}")]
    Io {
        /// The file.
        path: PathBuf,
        /// The read error.
        #[source]
        source: std::io::Error,
    },
    /// The YAML did not describe a valid config.
    #[error("Invalid config: {0}")]
    Parse(#[from] serde_yaml::Error),
}

/// Top level engine settings. Every field may be omitted.
///
/// ```yaml
/// log:
///   level: debug
///   filter: cro_render=trace
/// renderer:
///   max_batch_entities: 64
///   depth_axis: y
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Logging settings, see [`setup_logging()`][crate::logging::setup_logging].
    pub log: LogSettings,
    /// Settings of the sprite and text renderers.
    pub renderer: RendererConfig,
}

impl EngineConfig {
    /// Parse a config from YAML.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        // An empty document is a null, not an empty map.
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Load a config from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_owned(),
            source,
        })?;
        let config = Self::from_yaml_str(&yaml)?;
        tracing::debug!(?path, "Loaded engine config");
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use crate::prelude::*;

    #[test]
    fn parses_nested_sections() {
        let config = EngineConfig::from_yaml_str(
            "log:\n  level: debug\n  filter: cro_ecs=trace\nrenderer:\n  depth_axis: y\n",
        )
        .unwrap();
        assert_eq!(config.log.level, LogLevel::Debug);
        assert_eq!(config.log.filter, "cro_ecs=trace");
        assert_eq!(config.renderer.depth_axis, DepthAxis::Y);
        assert_eq!(config.renderer.max_batch_entities, None);
    }

    #[test]
    fn empty_and_invalid_documents() {
        assert_eq!(EngineConfig::from_yaml_str("").unwrap(), EngineConfig::default());
        assert!(matches!(
            EngineConfig::from_yaml_str("renderer:\n  depth: z\n"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn missing_file_names_the_path() {
        let err = EngineConfig::load("does/not/exist.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
        assert!(err.to_string().contains("does/not/exist.yaml"));
    }
}
