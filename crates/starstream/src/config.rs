//! Runtime configuration, loaded from TOML.
//!
//! Every section has defaults, so a file only needs the keys it overrides:
//!
//! ```toml
//! [scene]
//! fade_duration_ms = 500
//!
//! [octree]
//! max_depth = 10
//! threshold = [0.4, 0.6]
//!
//! [streaming]
//! worker_threads = 4
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::lod::LodThresholds;
use crate::octree::OctreeConfig;
use crate::streaming::StreamingBudget;

/// Settings for the per-node update.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneSettings {
  /// Length of the visibility fade when a node is shown or hidden.
  pub fade_duration_ms: u64,
  /// Global multiplier on particle apparent size.
  pub particle_brightness: f64,
}

impl Default for SceneSettings {
  fn default() -> Self {
    Self {
      fade_duration_ms: 1_000,
      particle_brightness: 1.0,
    }
  }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StarstreamConfig {
  pub scene: SceneSettings,
  pub lod: LodThresholds,
  pub octree: OctreeConfig,
  pub streaming: StreamingBudget,
}

impl StarstreamConfig {
  /// Read and validate a TOML file.
  pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
      path: path.to_path_buf(),
      source,
    })?;
    Self::from_toml_str(&text)
  }

  pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
    let config: Self = toml::from_str(text)?;
    config.validate()?;
    Ok(config)
  }

  pub fn validate(&self) -> Result<(), ConfigError> {
    if !(self.scene.particle_brightness.is_finite() && self.scene.particle_brightness > 0.0) {
      return Err(ConfigError::Invalid(format!(
        "scene particle_brightness must be positive, got {}",
        self.scene.particle_brightness
      )));
    }
    self.lod.validate()?;
    self.octree.validate()?;
    self.streaming.validate()
  }

  pub fn to_toml_string(&self) -> Result<String, toml::ser::Error> {
    toml::to_string_pretty(self)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_empty_file_is_default() {
    let config = StarstreamConfig::from_toml_str("").unwrap();
    assert_eq!(config, StarstreamConfig::default());
  }

  #[test]
  fn test_partial_override() {
    let config = StarstreamConfig::from_toml_str(
      r#"
        [scene]
        fade_duration_ms = 250

        [octree]
        max_depth = 6
        threshold = [0.2, 0.3]

        [streaming]
        worker_threads = 0
      "#,
    )
    .unwrap();
    assert_eq!(config.scene.fade_duration_ms, 250);
    assert_eq!(config.scene.particle_brightness, 1.0);
    assert_eq!(config.octree.max_depth, 6);
    assert_eq!(config.octree.threshold, [0.2, 0.3]);
    assert_eq!(config.streaming.worker_threads, 0);
    assert_eq!(config.streaming.queue_capacity, 100);
  }

  #[test]
  fn test_invalid_lod_ladder_rejected() {
    let err = StarstreamConfig::from_toml_str(
      r#"
        [lod]
        threshold_quad = 1.0
      "#,
    )
    .unwrap_err();
    assert!(matches!(err, ConfigError::Invalid(_)));
  }

  #[test]
  fn test_parse_error() {
    let err = StarstreamConfig::from_toml_str("[scene\nfade").unwrap_err();
    assert!(matches!(err, ConfigError::Parse(_)));
  }

  #[test]
  fn test_missing_file() {
    let err = StarstreamConfig::load("/nonexistent/starstream.toml").unwrap_err();
    assert!(matches!(err, ConfigError::Io { .. }));
  }

  #[test]
  fn test_round_trip_through_toml() {
    let mut config = StarstreamConfig::default();
    config.octree.preload_depth = 2;
    let text = config.to_toml_string().unwrap();
    assert_eq!(StarstreamConfig::from_toml_str(&text).unwrap(), config);
  }
}
