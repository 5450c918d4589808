//! Configuration structs with sensible defaults and RON persistence.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Smallest mesh resolution that still yields triangles.
pub const MIN_MESH_RESOLUTION: u32 = 2;

/// Largest mesh resolution whose `R²` vertices fit in `u32` indices.
pub const MAX_MESH_RESOLUTION: u32 = u16::MAX as u32;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Quadtree LOD tunables.
    pub lod: LodConfig,
    /// Mesh worker settings.
    pub worker: WorkerConfig,
    /// Debug/development settings.
    pub debug: DebugConfig,
}

/// Quadtree LOD tunables. Also the snapshot type handed out by
/// [`LiveConfig`](crate::LiveConfig).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LodConfig {
    /// Deepest node depth that may exist. `0` keeps every face a single patch.
    pub max_depth: u32,
    /// A patch splits only while the observer is within this distance of its centre.
    pub max_distance: f64,
    /// Vertices per patch side.
    pub mesh_resolution: u32,
    /// Merge only once the observer is beyond `max_distance * merge_hysteresis`.
    /// `1.0` disables the hysteresis band.
    pub merge_hysteresis: f64,
    /// Radius of the rendered sphere in world units.
    pub sphere_radius: f64,
}

/// Background mesh worker settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WorkerConfig {
    /// How long the worker waits for a request before re-checking cancellation.
    pub poll_interval_ms: u64,
}

/// Debug/development configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DebugConfig {
    /// Log level override (e.g., "debug", "info", "warn").
    pub log_level: String,
}

// --- Default implementations ---

impl Default for LodConfig {
    fn default() -> Self {
        Self {
            max_depth: 6,
            max_distance: 1.5,
            mesh_resolution: 16,
            merge_hysteresis: 1.0,
            sphere_radius: 1.0,
        }
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 100,
        }
    }
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

// --- Validation ---

impl LodConfig {
    /// Check every field against its allowed range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_resolution(self.mesh_resolution)?;
        validate_distance(self.max_distance)?;
        validate_hysteresis(self.merge_hysteresis)?;
        validate_radius(self.sphere_radius)?;
        Ok(())
    }
}

impl WorkerConfig {
    /// Poll interval as a [`Duration`], rejecting zero.
    pub fn poll_interval(&self) -> Result<Duration, ConfigError> {
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::InvalidPollInterval);
        }
        Ok(Duration::from_millis(self.poll_interval_ms))
    }
}

pub(crate) fn validate_resolution(resolution: u32) -> Result<(), ConfigError> {
    if !(MIN_MESH_RESOLUTION..=MAX_MESH_RESOLUTION).contains(&resolution) {
        return Err(ConfigError::InvalidResolution(resolution));
    }
    Ok(())
}

pub(crate) fn validate_distance(distance: f64) -> Result<(), ConfigError> {
    if !distance.is_finite() || distance < 0.0 {
        return Err(ConfigError::InvalidDistance(distance));
    }
    Ok(())
}

pub(crate) fn validate_hysteresis(factor: f64) -> Result<(), ConfigError> {
    if !factor.is_finite() || factor < 1.0 {
        return Err(ConfigError::InvalidHysteresis(factor));
    }
    Ok(())
}

pub(crate) fn validate_radius(radius: f64) -> Result<(), ConfigError> {
    if !radius.is_finite() || radius <= 0.0 {
        return Err(ConfigError::InvalidRadius(radius));
    }
    Ok(())
}

// --- Load / Save / Reload ---

impl Config {
    /// Load config from the given directory, or create a default config file.
    pub fn load_or_create(config_dir: &Path) -> Result<Self, ConfigError> {
        let config_path = config_dir.join("config.ron");

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

    /// Save config to the given directory as `config.ron`.
    pub fn save(&self, config_dir: &Path) -> Result<(), ConfigError> {
        std::fs::create_dir_all(config_dir).map_err(ConfigError::WriteError)?;

        let config_path = config_dir.join("config.ron");
        let pretty = ron::ser::PrettyConfig::new()
            .depth_limit(3)
            .enumerate_arrays(false);

        let serialized =
            ron::ser::to_string_pretty(self, pretty).map_err(ConfigError::SerializeError)?;

        std::fs::write(&config_path, serialized).map_err(ConfigError::WriteError)?;
        Ok(())
    }

    /// Hot-reload: returns `Some(new_config)` if the file changed, `None` otherwise.
    pub fn reload(&self, config_dir: &Path) -> Result<Option<Self>, ConfigError> {
        let config_path = config_dir.join("config.ron");
        let contents = std::fs::read_to_string(&config_path).map_err(ConfigError::ReadError)?;
        let new_config: Config = ron::from_str(&contents).map_err(ConfigError::ParseError)?;

        if &new_config != self {
            log::info!("Config reloaded with changes");
            Ok(Some(new_config))
        } else {
            Ok(None)
        }
    }
}
