//! The four sub-regions produced when a patch splits.

use glam::DVec2;

/// One quarter of a patch. `+y` in face-local space is north.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Quadrant {
    NorthWest,
    NorthEast,
    SouthEast,
    SouthWest,
}

impl Quadrant {
    /// All four quadrants in child storage order.
    pub const ALL: [Quadrant; 4] = [
        Quadrant::NorthWest,
        Quadrant::NorthEast,
        Quadrant::SouthEast,
        Quadrant::SouthWest,
    ];

    /// Minimum corner of this quadrant for a parent patch with the given
    /// minimum `corner` and `side_length`.
    #[must_use]
    pub fn child_corner(self, corner: DVec2, side_length: f64) -> DVec2 {
        let half = side_length * 0.5;
        match self {
            Quadrant::SouthWest => corner,
            Quadrant::SouthEast => corner + DVec2::new(half, 0.0),
            Quadrant::NorthWest => corner + DVec2::new(0.0, half),
            Quadrant::NorthEast => corner + DVec2::new(half, half),
        }
    }
}
