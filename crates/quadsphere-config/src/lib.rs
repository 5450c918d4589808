//! Configuration system for the quadsphere LOD engine.
//!
//! Settings persist to disk as RON and can be overridden from the command
//! line. The LOD tunables are additionally published through [`LiveConfig`],
//! a reader/writer-locked container that the update thread and the mesh
//! worker read concurrently while a settings surface writes to it.

mod cli;
mod config;
mod error;
mod live;

pub use cli::CliArgs;
pub use config::{Config, DebugConfig, LodConfig, MAX_MESH_RESOLUTION, MIN_MESH_RESOLUTION, WorkerConfig};
pub use error::ConfigError;
pub use live::LiveConfig;
