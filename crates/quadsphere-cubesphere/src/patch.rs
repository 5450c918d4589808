//! Patch mesh generation: a regular grid over a face-local square, projected
//! onto the unit sphere by normalization.
//!
//! [`generate_patch`] is a pure function of its [`PatchParams`] and is the unit
//! of work handed to the background mesh worker.

use bytemuck::{Pod, Zeroable};
use glam::{DVec2, DVec3};

use crate::{CubeFace, FaceBasis, GeometryError, Quadrant};

/// Largest grid side whose `R²` vertices still fit in `u32` indices.
const MAX_RESOLUTION: u32 = u16::MAX as u32;

/// Validated grid resolution (vertices per patch side, at least 2).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PatchResolution(u32);

impl PatchResolution {
    /// The smallest grid that still produces triangles.
    pub const MIN: PatchResolution = PatchResolution(2);

    /// Validate a raw resolution.
    pub fn new(resolution: u32) -> Result<Self, GeometryError> {
        if resolution < 2 {
            return Err(GeometryError::ResolutionTooSmall(resolution));
        }
        if resolution > MAX_RESOLUTION {
            return Err(GeometryError::ResolutionTooLarge(resolution));
        }
        Ok(Self(resolution))
    }

    /// Vertices per side.
    #[must_use]
    pub fn get(self) -> u32 {
        self.0
    }

    /// Total vertex count, `R²`.
    #[must_use]
    pub fn vertex_count(self) -> usize {
        (self.0 as usize) * (self.0 as usize)
    }

    /// Total triangle count, `2·(R-1)²`.
    #[must_use]
    pub fn triangle_count(self) -> usize {
        let cells = (self.0 - 1) as usize;
        2 * cells * cells
    }
}

/// Everything needed to build one patch, captured when the request is made.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PatchParams {
    /// Frame of the cube face this patch lies on.
    pub basis: FaceBasis,
    /// Minimum face-local corner of the patch, in `[-1, 1]²`.
    pub corner: DVec2,
    /// Side length in face-local units (2 for a whole face).
    pub side_length: f64,
    /// Grid resolution.
    pub resolution: PatchResolution,
}

impl PatchParams {
    /// Parameters covering a whole cube face.
    #[must_use]
    pub fn root(face: CubeFace, resolution: PatchResolution) -> Self {
        Self {
            basis: face.basis(),
            corner: DVec2::splat(-1.0),
            side_length: 2.0,
            resolution,
        }
    }

    /// Parameters for one quadrant of this patch.
    #[must_use]
    pub fn child(&self, quadrant: Quadrant) -> Self {
        Self {
            basis: self.basis,
            corner: quadrant.child_corner(self.corner, self.side_length),
            side_length: self.side_length * 0.5,
            resolution: self.resolution,
        }
    }

    /// Unit vector from the sphere centre through the middle of the patch.
    #[must_use]
    pub fn center_direction(&self) -> DVec3 {
        let mid = self.corner + DVec2::splat(self.side_length * 0.5);
        self.basis.sphere_point(mid)
    }
}

/// One patch vertex on the unit sphere.
///
/// For a unit sphere the outward normal equals the position.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct PatchVertex {
    /// Position on the unit sphere.
    pub position: [f32; 3],
    /// Outward surface normal.
    pub normal: [f32; 3],
}

/// Generated vertex and index buffers for one patch.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PatchMesh {
    /// `R×R` grid vertices, row-major (`col + row·R`).
    pub vertices: Vec<PatchVertex>,
    /// Triangle list, three indices per triangle.
    pub indices: Vec<u32>,
}

impl PatchMesh {
    /// Number of triangles in the index buffer.
    #[must_use]
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Raw vertex bytes for GPU upload.
    #[must_use]
    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }

    /// Raw index bytes for GPU upload.
    #[must_use]
    pub fn index_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.indices)
    }
}

/// Build the patch mesh described by `params`.
///
/// Vertex `(col, row)` is `normalize(N + (S·x + C.x)·H + (S·y + C.y)·V)` with
/// `x = col / (R-1)` and `y = row / (R-1)`. Each grid cell becomes two
/// counter-clockwise (outward-facing) triangles.
#[must_use]
pub fn generate_patch(params: &PatchParams) -> PatchMesh {
    PatchMesh {
        vertices: patch_vertices(params),
        indices: patch_indices(params.resolution),
    }
}

fn patch_vertices(params: &PatchParams) -> Vec<PatchVertex> {
    let r = params.resolution.get();
    let step = 1.0 / f64::from(r - 1);
    let mut vertices = Vec::with_capacity(params.resolution.vertex_count());

    for row in 0..r {
        for col in 0..r {
            let x = f64::from(col) * step;
            let y = f64::from(row) * step;
            let local = DVec2::new(
                params.side_length * x + params.corner.x,
                params.side_length * y + params.corner.y,
            );
            let p = params.basis.sphere_point(local).as_vec3().to_array();
            vertices.push(PatchVertex {
                position: p,
                normal: p,
            });
        }
    }

    vertices
}

fn patch_indices(resolution: PatchResolution) -> Vec<u32> {
    let r = resolution.get();
    let mut indices = Vec::with_capacity(resolution.triangle_count() * 3);

    for row in 0..r - 1 {
        for col in 0..r - 1 {
            let i = col + row * r;
            indices.extend_from_slice(&[i, i + r + 1, i + r]);
            indices.extend_from_slice(&[i, i + 1, i + 1 + r]);
        }
    }

    indices
}
