//! Runtime settings, read from an optional TOML file.

use std::fs;
use std::path::Path;

use serde::Deserialize;
use tracing::{debug, info};

use crate::error::ConfigError;
use crate::geodesy::UnitSystem;
use crate::layers::BaseLayerKind;

/// Environment variable that overrides `[tools] units`.
pub const UNITS_ENV: &str = "SARMAP_UNITS";

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub tools: ToolConfig,
    pub map: MapConfig,
    pub terrain: TerrainConfig,
}

/// Tunables of the measurement tools.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct ToolConfig {
    pub units: UnitSystem,
    /// Target spacing between profile samples, metres
    pub profile_spacing_m: f64,
    pub profile_min_samples: usize,
    pub profile_max_samples: usize,
    pub viewshed_radius_m: f64,
    pub viewshed_bearings: usize,
    pub viewshed_steps: usize,
    /// Obstruction markers are drawn on every n-th bearing
    pub viewshed_marker_stride: usize,
    pub observer_eye_height_m: f64,
    /// Hits this close to the line-of-sight target count as the target itself
    pub los_target_tolerance_m: f64,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            units: UnitSystem::Metric,
            profile_spacing_m: 100.0,
            profile_min_samples: 10,
            profile_max_samples: 100,
            viewshed_radius_m: 5000.0,
            viewshed_bearings: 36,
            viewshed_steps: 20,
            viewshed_marker_stride: 3,
            observer_eye_height_m: 1.8,
            los_target_tolerance_m: 0.5,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct MapConfig {
    pub base_layer: BaseLayerKind,
    pub center_lon: f64,
    pub center_lat: f64,
    pub show_footprints: bool,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            base_layer: BaseLayerKind::Osm,
            center_lon: 11.5,
            center_lat: 46.5,
            show_footprints: true,
        }
    }
}

/// Synthetic height field parameters.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct TerrainConfig {
    pub seed: u64,
    /// Peak-to-valley amplitude, metres
    pub relief_m: f64,
    /// Feature size of the coarsest noise octave, degrees
    pub feature_size_deg: f64,
    pub max_ray_distance_m: f64,
}

impl Default for TerrainConfig {
    fn default() -> Self {
        Self {
            seed: 7,
            relief_m: 1200.0,
            feature_size_deg: 0.05,
            max_ray_distance_m: 200_000.0,
        }
    }
}

impl Config {
    /// Read `path` if given, otherwise start from defaults, then apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => {
                let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })?;
                info!(path = %path.display(), "loaded config");
                Self::from_toml(&content)?
            }
            None => Self::default(),
        };

        if let Ok(raw) = std::env::var(UNITS_ENV) {
            config.apply_units_override(&raw)?;
        }
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    fn apply_units_override(&mut self, raw: &str) -> Result<(), ConfigError> {
        self.tools.units = parse_units(raw)?;
        debug!(units = self.tools.units.name(), "units overridden from {UNITS_ENV}");
        Ok(())
    }
}

pub fn parse_units(raw: &str) -> Result<UnitSystem, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "metric" => Ok(UnitSystem::Metric),
        "imperial" => Ok(UnitSystem::Imperial),
        _ => Err(ConfigError::InvalidUnits(raw.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = Config::from_toml(
            r#"
            [tools]
            units = "imperial"
            viewshed_radius_m = 2500.0

            [map]
            base_layer = "natural_earth"
            "#,
        )
        .unwrap();
        assert_eq!(config.tools.units, UnitSystem::Imperial);
        assert_eq!(config.tools.viewshed_radius_m, 2500.0);
        assert_eq!(config.tools.viewshed_bearings, 36);
        assert_eq!(config.map.base_layer, BaseLayerKind::NaturalEarth);
        assert_eq!(config.terrain, TerrainConfig::default());
    }

    #[test]
    fn test_rejects_unknown_units() {
        assert!(matches!(
            Config::from_toml("[tools]\nunits = \"nautical\""),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(parse_units("furlongs"), Err(ConfigError::InvalidUnits(_))));
        assert_eq!(parse_units(" Imperial ").unwrap(), UnitSystem::Imperial);
    }

    #[test]
    fn test_units_override() {
        let mut config = Config::default();
        config.apply_units_override("imperial").unwrap();
        assert_eq!(config.tools.units, UnitSystem::Imperial);
        assert!(config.apply_units_override("").is_err());
    }

    #[test]
    fn test_missing_file() {
        let err = Config::load(Some(Path::new("/nonexistent/sar-map.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
