use thiserror::Error;

/// Result type for geometry operations
pub type Result<T> = std::result::Result<T, Error>;

/// Fatal errors of geometry processing.
///
/// Malformed surfaces are not errors: triangulation reports them through
/// [`crate::TriangulationDefect`] so callers can drop the surface and go on.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Plane is invalid: cannot {0} points")]
    InvalidPlane(&'static str),

    #[error("Boundary index {index} is out of range for {len} vertices")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("Face {face} is not horizontal (normal xy magnitude {magnitude:.6})")]
    NonHorizontalFace { face: usize, magnitude: f64 },

    #[error("Empty mesh: {0}")]
    EmptyMesh(String),

    #[error("No vertex found within {radius} units of ({x}, {y})")]
    NoVertexNearAnchor { x: f64, y: f64, radius: f64 },

    #[error("Triangulation failed: {0}")]
    TriangulationError(String),
}
