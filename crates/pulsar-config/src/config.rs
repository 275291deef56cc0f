//! Configuration structs with sensible defaults and RON persistence.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Top-level streaming configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Point budget settings.
    pub budget: BudgetConfig,
    /// Asynchronous loading settings.
    pub loading: LoadingConfig,
    /// Display/LOD settings.
    pub display: DisplayConfig,
}

/// Point budget configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BudgetConfig {
    /// Maximum number of points visible per frame; cached points may
    /// transiently reach twice this before eviction kicks in.
    pub point_budget: u64,
}

/// Asynchronous loading configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoadingConfig {
    /// Maximum number of node loads in flight at once.
    pub max_concurrent_loads: usize,
    /// Maximum number of new load requests issued per frame.
    pub loads_per_frame: usize,
    /// Maximum number of nodes handed to the renderer per frame.
    pub promotions_per_frame: u32,
}

/// Display/LOD configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DisplayConfig {
    /// Nodes projecting smaller than this many pixels are not refined.
    pub min_node_pixel_size: f64,
    /// Draw bounding boxes around visible nodes.
    pub show_bounding_boxes: bool,
}

// --- Default implementations ---

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            point_budget: 1_000_000,
        }
    }
}

impl Default for LoadingConfig {
    fn default() -> Self {
        Self {
            max_concurrent_loads: 4,
            loads_per_frame: 16,
            promotions_per_frame: 2,
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            min_node_pixel_size: 100.0,
            show_bounding_boxes: false,
        }
    }
}

// --- Load / Save ---

impl Config {
    /// Load config from the given directory, or create a default config file.
    pub fn load_or_create(config_dir: &Path) -> Result<Self, ConfigError> {
        let config_path = config_dir.join("pulsar.ron");

        if config_path.exists() {
            let contents = std::fs::read_to_string(&config_path).map_err(ConfigError::ReadError)?;
            let config: Config = ron::from_str(&contents).map_err(ConfigError::ParseError)?;
            log::info!("Loaded config from {}", config_path.display());
            Ok(config)
        } else {
            let config = Config::default();
            config.save(config_dir)?;
            log::info!("Created default config at {}", config_path.display());
            Ok(config)
        }
    }

    /// Load config from the given directory, falling back to defaults on
    /// any error instead of propagating it.
    pub fn load_or_default(config_dir: &Path) -> Self {
        match Self::load_or_create(config_dir) {
            Ok(config) => config,
            Err(err) => {
                log::warn!("Using default config: {err}");
                Config::default()
            }
        }
    }

    /// Save config to the given directory as `pulsar.ron`.
    pub fn save(&self, config_dir: &Path) -> Result<(), ConfigError> {
        std::fs::create_dir_all(config_dir).map_err(ConfigError::WriteError)?;

        let config_path = config_dir.join("pulsar.ron");
        let pretty = ron::ser::PrettyConfig::new().depth_limit(3);

        let serialized =
            ron::ser::to_string_pretty(self, pretty).map_err(ConfigError::SerializeError)?;

        std::fs::write(&config_path, serialized).map_err(ConfigError::WriteError)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Loading from an empty directory creates the default config file.
    #[test]
    fn test_load_or_create_writes_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_or_create(dir.path()).unwrap();
        assert_eq!(config, Config::default());
        assert!(dir.path().join("pulsar.ron").exists());
    }

    /// Saved configs round-trip through RON without loss.
    #[test]
    fn test_save_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.budget.point_budget = 250_000;
        config.loading.max_concurrent_loads = 8;
        config.display.show_bounding_boxes = true;
        config.save(dir.path()).unwrap();

        let loaded = Config::load_or_create(dir.path()).unwrap();
        assert_eq!(loaded, config);
    }

    /// A partial config file keeps defaults for the missing fields.
    #[test]
    fn test_partial_config_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("pulsar.ron"),
            "(budget: (point_budget: 42))",
        )
        .unwrap();

        let config = Config::load_or_create(dir.path()).unwrap();
        assert_eq!(config.budget.point_budget, 42);
        assert_eq!(config.loading, LoadingConfig::default());
        assert_eq!(config.display, DisplayConfig::default());
    }

    /// Malformed files fall back to defaults via `load_or_default`.
    #[test]
    fn test_load_or_default_on_malformed_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("pulsar.ron"), "not ron {").unwrap();

        let config = Config::load_or_default(dir.path());
        assert_eq!(config, Config::default());
    }

    /// Default values match the documented streaming defaults.
    #[test]
    fn test_default_values() {
        let config = Config::default();
        assert_eq!(config.budget.point_budget, 1_000_000);
        assert_eq!(config.loading.max_concurrent_loads, 4);
        assert_eq!(config.loading.loads_per_frame, 16);
        assert_eq!(config.loading.promotions_per_frame, 2);
        assert_eq!(config.display.min_node_pixel_size, 100.0);
        assert!(!config.display.show_bounding_boxes);
    }
}
