// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Typed geometries owned by city objects.
//!
//! A geometry keeps its own vertex array; boundaries index into it. The
//! global vertex array only exists at serialization time, see
//! [`GeometryContainer`](crate::GeometryContainer).

use cityjson_lite_geometry::{triangulate_surface, Mesh};
use nalgebra::Point3;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};

/// Geometry types written by this crate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GeometryKind {
    MultiPoint,
    MultiSurface,
}

/// Recursively nested boundary lists whose leaves are vertex indices.
///
/// For a multi-surface: surfaces, then rings (first one outer), then indices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Boundaries {
    Indices(Vec<u32>),
    Nested(Vec<Boundaries>),
}

impl Boundaries {
    /// Visit every index, depth first
    pub fn for_each_index(&self, f: &mut impl FnMut(u32)) {
        match self {
            Boundaries::Indices(indices) => indices.iter().copied().for_each(f),
            Boundaries::Nested(children) => {
                for child in children {
                    child.for_each_index(f);
                }
            }
        }
    }

    /// Rebuild the same nesting with every index passed through `f`
    pub fn try_map(&self, f: &mut impl FnMut(u32) -> Result<u32>) -> Result<Boundaries> {
        Ok(match self {
            Boundaries::Indices(indices) => {
                Boundaries::Indices(indices.iter().map(|&i| f(i)).collect::<Result<_>>()?)
            }
            Boundaries::Nested(children) => Boundaries::Nested(
                children
                    .iter()
                    .map(|child| child.try_map(f))
                    .collect::<Result<_>>()?,
            ),
        })
    }

    pub fn index_count(&self) -> usize {
        let mut count = 0;
        self.for_each_index(&mut |_| count += 1);
        count
    }

    fn children(&self) -> &[Boundaries] {
        match self {
            Boundaries::Nested(children) => children,
            Boundaries::Indices(_) => &[],
        }
    }

    fn indices(&self) -> &[u32] {
        match self {
            Boundaries::Indices(indices) => indices,
            Boundaries::Nested(_) => &[],
        }
    }
}

/// A geometry with a level of detail, a local vertex array and boundaries
#[derive(Debug, Clone, PartialEq)]
pub struct Geometry {
    pub kind: GeometryKind,
    pub lod: u32,
    pub vertices: Vec<Point3<f64>>,
    pub boundaries: Boundaries,
}

impl Geometry {
    /// Build a geometry, checking that every index is in range
    pub fn new(
        kind: GeometryKind,
        lod: u32,
        vertices: Vec<Point3<f64>>,
        boundaries: Boundaries,
    ) -> Result<Self> {
        let geometry = Self {
            kind,
            lod,
            vertices,
            boundaries,
        };
        geometry.validate()?;
        Ok(geometry)
    }

    /// One surface with a single triangular ring per mesh face
    pub fn multi_surface_from_mesh(lod: u32, mesh: &Mesh) -> Self {
        let surfaces = mesh
            .indices
            .iter()
            .map(|face| Boundaries::Nested(vec![Boundaries::Indices(face.to_vec())]))
            .collect();
        Self {
            kind: GeometryKind::MultiSurface,
            lod,
            vertices: mesh.positions.clone(),
            boundaries: Boundaries::Nested(surfaces),
        }
    }

    pub fn multi_point(lod: u32, points: Vec<Point3<f64>>) -> Self {
        let indices = (0..points.len() as u32).collect();
        Self {
            kind: GeometryKind::MultiPoint,
            lod,
            vertices: points,
            boundaries: Boundaries::Indices(indices),
        }
    }

    /// Fail if a boundary index is outside the vertex array
    pub fn validate(&self) -> Result<()> {
        let len = self.vertices.len();
        let mut bad = None;
        self.boundaries.for_each_index(&mut |index| {
            if index as usize >= len && bad.is_none() {
                bad = Some(index);
            }
        });
        match bad {
            Some(index) => Err(Error::BoundaryIndexOutOfRange { index, len }),
            None => Ok(()),
        }
    }

    /// Triangle mesh of the geometry.
    ///
    /// Points yield a mesh without faces. Surfaces that cannot be
    /// triangulated are left out.
    pub fn to_mesh(&self) -> Result<Mesh> {
        self.validate()?;
        match self.kind {
            GeometryKind::MultiPoint => Ok(Mesh::from_parts(self.vertices.clone(), Vec::new())?),
            GeometryKind::MultiSurface => {
                let mut mesh = Mesh::new();
                for surface in self.boundaries.children() {
                    let rings = surface.children();
                    let Some((outer, holes)) = rings.split_first() else {
                        continue;
                    };
                    let holes: Vec<Vec<u32>> =
                        holes.iter().map(|ring| ring.indices().to_vec()).collect();
                    match triangulate_surface(&self.vertices, outer.indices(), &holes)? {
                        Ok(part) => mesh.merge(&part),
                        Err(defect) => debug!(%defect, "dropping surface"),
                    }
                }
                Ok(mesh)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quad_mesh() -> Mesh {
        Mesh::from_parts(
            vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(1.0, 1.0, 0.0),
                Point3::new(0.0, 1.0, 0.0),
            ],
            vec![[0, 1, 2], [0, 2, 3]],
        )
        .unwrap()
    }

    #[test]
    fn mesh_faces_become_surfaces() {
        let geometry = Geometry::multi_surface_from_mesh(2, &quad_mesh());
        let json = serde_json::to_string(&geometry.boundaries).unwrap();
        assert_eq!(json, "[[[0,1,2]],[[0,2,3]]]");
        assert_eq!(geometry.boundaries.index_count(), 6);

        let mesh = geometry.to_mesh().unwrap();
        assert_eq!(mesh.triangle_count(), 2);
        assert_eq!(mesh.indices[0], [0, 1, 2]);
    }

    #[test]
    fn quads_are_triangulated() {
        let mut geometry = Geometry::multi_surface_from_mesh(1, &quad_mesh());
        geometry.boundaries =
            Boundaries::Nested(vec![Boundaries::Nested(vec![Boundaries::Indices(vec![
                0, 1, 2, 3,
            ])])]);
        assert_eq!(geometry.to_mesh().unwrap().triangle_count(), 2);
    }

    #[test]
    fn out_of_range_index_is_rejected() {
        let result = Geometry::new(
            GeometryKind::MultiPoint,
            0,
            vec![Point3::origin()],
            Boundaries::Indices(vec![0, 1]),
        );
        assert!(matches!(
            result,
            Err(Error::BoundaryIndexOutOfRange { index: 1, len: 1 })
        ));
    }

    #[test]
    fn points_have_no_faces() {
        let geometry = Geometry::multi_point(0, vec![Point3::new(1.0, 2.0, 3.0)]);
        let mesh = geometry.to_mesh().unwrap();
        assert_eq!(mesh.vertex_count(), 1);
        assert!(mesh.is_empty());
    }
}
