//! CityJSON-Lite Geometry Processing
//!
//! Plane fitting, surface triangulation with polygon repair, mesh merging
//! and repair, and footprint extraction for city models, using earcutr and
//! i_overlay for the 2D work and nalgebra for the 3D math.

pub mod anchor;
pub mod error;
pub mod flatten;
pub mod mesh;
pub mod plane;
pub mod polygon;
pub mod repair;
pub mod triangulation;

// Re-export nalgebra types for convenience
pub use nalgebra::{Matrix4, Point2, Point3, Vector2, Vector3};

pub use anchor::{height_at_xy, icon_anchor, DEFAULT_SEARCH_RADII};
pub use error::{Error, Result};
pub use flatten::{flatten, orient_faces_z_up};
pub use mesh::Mesh;
pub use plane::Plane;
pub use polygon::Polygon2D;
pub use repair::{merge_meshes, repair_mesh};
pub use triangulation::{triangulate_surface, SurfaceResult, TriangulationDefect};
