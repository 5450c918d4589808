//! Geometry error types.

/// Errors raised when building patch parameters.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GeometryError {
    /// A patch grid needs at least two vertices per side.
    #[error("patch resolution must be at least 2, got {0}")]
    ResolutionTooSmall(u32),

    /// The grid would not fit in 32-bit vertex indices.
    #[error("patch resolution {0} overflows u32 vertex indices")]
    ResolutionTooLarge(u32),
}
