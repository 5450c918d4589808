//! Cube-sphere geometry: face bases, quadrant subdivision, and patch mesh generation.

mod cube_face;
mod error;
mod patch;
mod quadrant;

pub use cube_face::{CubeFace, FaceBasis};
pub use error::GeometryError;
pub use patch::{PatchMesh, PatchParams, PatchResolution, PatchVertex, generate_patch};
pub use quadrant::Quadrant;
