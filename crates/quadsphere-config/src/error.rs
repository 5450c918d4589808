//! Configuration error types.

/// Errors that can occur when loading, saving, parsing, or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the config file from disk.
    #[error("failed to read config: {0}")]
    ReadError(#[source] std::io::Error),

    /// Failed to write the config file to disk.
    #[error("failed to write config: {0}")]
    WriteError(#[source] std::io::Error),

    /// Failed to parse RON content.
    #[error("failed to parse config: {0}")]
    ParseError(#[source] ron::error::SpannedError),

    /// Failed to serialize config to RON.
    #[error("failed to serialize config: {0}")]
    SerializeError(#[source] ron::Error),

    /// Mesh resolution outside `2..=65535`.
    #[error("mesh resolution must be between 2 and 65535, got {0}")]
    InvalidResolution(u32),

    /// Maximum split distance is negative or not finite.
    #[error("max distance must be a finite value >= 0, got {0}")]
    InvalidDistance(f64),

    /// Merge hysteresis factor below 1 or not finite.
    #[error("merge hysteresis must be a finite value >= 1, got {0}")]
    InvalidHysteresis(f64),

    /// Sphere radius is not a positive finite value.
    #[error("sphere radius must be a finite value > 0, got {0}")]
    InvalidRadius(f64),

    /// Worker poll interval of zero would busy-spin.
    #[error("worker poll interval must be at least 1 ms")]
    InvalidPollInterval,
}
