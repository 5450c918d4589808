//! Command-line argument parsing.

use std::path::PathBuf;

use clap::Args;

use crate::Config;

/// Configuration overrides accepted on the command line.
///
/// CLI values override settings loaded from `config.ron`. Binaries flatten
/// this into their own parser.
#[derive(Args, Debug, Clone, Default, PartialEq)]
pub struct CliArgs {
    /// Deepest quadtree depth.
    #[arg(long)]
    pub max_depth: Option<u32>,

    /// Split distance threshold in world units.
    #[arg(long)]
    pub max_distance: Option<f64>,

    /// Vertices per patch side (at least 2).
    #[arg(long)]
    pub mesh_resolution: Option<u32>,

    /// Merge hysteresis factor (1.0 disables it).
    #[arg(long)]
    pub merge_hysteresis: Option<f64>,

    /// Mesh worker idle poll interval in milliseconds.
    #[arg(long)]
    pub poll_interval_ms: Option<u64>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Path to config directory (overrides default location).
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl Config {
    /// Apply CLI overrides to a loaded config.
    ///
    /// Values are not validated here; building a
    /// [`LiveConfig`](crate::LiveConfig) does that.
    pub fn apply_cli_overrides(&mut self, args: &CliArgs) {
        if let Some(depth) = args.max_depth {
            self.lod.max_depth = depth;
        }
        if let Some(distance) = args.max_distance {
            self.lod.max_distance = distance;
        }
        if let Some(resolution) = args.mesh_resolution {
            self.lod.mesh_resolution = resolution;
        }
        if let Some(factor) = args.merge_hysteresis {
            self.lod.merge_hysteresis = factor;
        }
        if let Some(ms) = args.poll_interval_ms {
            self.worker.poll_interval_ms = ms;
        }
        if let Some(ref level) = args.log_level {
            self.debug.log_level = level.clone();
        }
    }
}
