//! The six faces of a cube-sphere and their orthonormal bases.

use glam::{DVec2, DVec3};

/// The six faces of the cube that forms the cube-sphere.
///
/// Each variant corresponds to a face whose outward normal points
/// along the named axis direction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum CubeFace {
    /// +X face
    PosX = 0,
    /// −X face
    NegX = 1,
    /// +Y face
    PosY = 2,
    /// −Y face
    NegY = 3,
    /// +Z face
    PosZ = 4,
    /// −Z face
    NegZ = 5,
}

impl CubeFace {
    /// All six faces in canonical order.
    pub const ALL: [CubeFace; 6] = [
        CubeFace::PosX,
        CubeFace::NegX,
        CubeFace::PosY,
        CubeFace::NegY,
        CubeFace::PosZ,
        CubeFace::NegZ,
    ];

    /// Position of this face in [`CubeFace::ALL`].
    #[must_use]
    pub fn index(self) -> usize {
        self as usize
    }

    /// The opposite face (e.g., `PosX` → `NegX`).
    #[must_use]
    pub fn opposite(self) -> CubeFace {
        match self {
            CubeFace::PosX => CubeFace::NegX,
            CubeFace::NegX => CubeFace::PosX,
            CubeFace::PosY => CubeFace::NegY,
            CubeFace::NegY => CubeFace::PosY,
            CubeFace::PosZ => CubeFace::NegZ,
            CubeFace::NegZ => CubeFace::PosZ,
        }
    }

    /// Outward-pointing unit normal for this face.
    #[must_use]
    pub fn normal(self) -> DVec3 {
        match self {
            CubeFace::PosX => DVec3::X,
            CubeFace::NegX => DVec3::NEG_X,
            CubeFace::PosY => DVec3::Y,
            CubeFace::NegY => DVec3::NEG_Y,
            CubeFace::PosZ => DVec3::Z,
            CubeFace::NegZ => DVec3::NEG_Z,
        }
    }

    /// Horizontal axis: the normal's components rotated one place, `(n.y, n.z, n.x)`.
    #[must_use]
    pub fn horizontal(self) -> DVec3 {
        let n = self.normal();
        DVec3::new(n.y, n.z, n.x)
    }

    /// Vertical axis: `normal × horizontal`.
    #[must_use]
    pub fn vertical(self) -> DVec3 {
        self.normal().cross(self.horizontal())
    }

    /// The full orthonormal basis used to parameterize this face.
    #[must_use]
    pub fn basis(self) -> FaceBasis {
        FaceBasis {
            normal: self.normal(),
            horizontal: self.horizontal(),
            vertical: self.vertical(),
        }
    }
}

/// Orthonormal frame for a face-local `[-1, 1]²` parameterization.
///
/// `horizontal × vertical == normal`, so counter-clockwise triangles in
/// face-local space face outward.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FaceBasis {
    /// Outward unit normal; the face centre on the unit cube.
    pub normal: DVec3,
    /// Direction of increasing face-local `x`.
    pub horizontal: DVec3,
    /// Direction of increasing face-local `y`.
    pub vertical: DVec3,
}

impl FaceBasis {
    /// Point on the unit cube surface for a face-local coordinate.
    #[inline]
    #[must_use]
    pub fn cube_point(&self, local: DVec2) -> DVec3 {
        self.normal + local.x * self.horizontal + local.y * self.vertical
    }

    /// Point on the unit sphere for a face-local coordinate.
    #[inline]
    #[must_use]
    pub fn sphere_point(&self, local: DVec2) -> DVec3 {
        self.cube_point(local).normalize()
    }
}
