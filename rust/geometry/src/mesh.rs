// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Mesh data structures

use nalgebra::{Matrix4, Point3, Vector3};

use crate::{Error, Result};

/// Triangle mesh in world coordinates.
///
/// Positions stay in f64: city models live in projected coordinate systems
/// with values in the hundreds of thousands, and vertices are later
/// deduplicated by exact equality.
#[derive(Debug, Clone, PartialEq)]
pub struct Mesh {
    /// Vertex positions
    pub positions: Vec<Point3<f64>>,
    /// Triangle indices
    pub indices: Vec<[u32; 3]>,
}

impl Mesh {
    /// Create a new empty mesh
    pub fn new() -> Self {
        Self {
            positions: Vec::new(),
            indices: Vec::new(),
        }
    }

    /// Create a mesh with capacity
    pub fn with_capacity(vertex_count: usize, triangle_count: usize) -> Self {
        Self {
            positions: Vec::with_capacity(vertex_count),
            indices: Vec::with_capacity(triangle_count),
        }
    }

    /// Build a mesh from raw parts, checking every index
    pub fn from_parts(positions: Vec<Point3<f64>>, indices: Vec<[u32; 3]>) -> Result<Self> {
        let mesh = Self { positions, indices };
        mesh.validate_indices()?;
        Ok(mesh)
    }

    /// Add a vertex and return its index
    #[inline]
    pub fn add_vertex(&mut self, position: Point3<f64>) -> u32 {
        self.positions.push(position);
        (self.positions.len() - 1) as u32
    }

    /// Add a triangle
    #[inline]
    pub fn add_triangle(&mut self, i0: u32, i1: u32, i2: u32) {
        self.indices.push([i0, i1, i2]);
    }

    /// Merge another mesh into this one
    #[inline]
    pub fn merge(&mut self, other: &Mesh) {
        if other.is_empty() {
            return;
        }

        let vertex_offset = self.positions.len() as u32;

        self.positions.reserve(other.positions.len());
        self.indices.reserve(other.indices.len());

        self.positions.extend_from_slice(&other.positions);
        self.indices.extend(
            other
                .indices
                .iter()
                .map(|t| [t[0] + vertex_offset, t[1] + vertex_offset, t[2] + vertex_offset]),
        );
    }

    /// Batch merge multiple meshes at once (more efficient than individual merges)
    #[inline]
    pub fn merge_all(&mut self, meshes: &[Mesh]) {
        let total_positions: usize = meshes.iter().map(|m| m.positions.len()).sum();
        let total_indices: usize = meshes.iter().map(|m| m.indices.len()).sum();

        self.positions.reserve(total_positions);
        self.indices.reserve(total_indices);

        for mesh in meshes {
            self.merge(mesh);
        }
    }

    /// Get vertex count
    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    /// Get triangle count
    #[inline]
    pub fn triangle_count(&self) -> usize {
        self.indices.len()
    }

    /// Check if mesh is empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty() || self.indices.is_empty()
    }

    /// The three corners of a triangle
    #[inline]
    pub fn triangle(&self, face: usize) -> [Point3<f64>; 3] {
        let [a, b, c] = self.indices[face];
        [
            self.positions[a as usize],
            self.positions[b as usize],
            self.positions[c as usize],
        ]
    }

    /// Unnormalized face normal (length is twice the triangle area)
    #[inline]
    pub fn face_normal(&self, face: usize) -> Vector3<f64> {
        let [a, b, c] = self.triangle(face);
        (b - a).cross(&(c - a))
    }

    /// Reverse the winding of one face
    #[inline]
    pub fn flip_face(&mut self, face: usize) {
        self.indices[face].swap(1, 2);
    }

    /// Calculate bounds (min, max)
    pub fn bounds(&self) -> (Point3<f64>, Point3<f64>) {
        if self.positions.is_empty() {
            return (Point3::origin(), Point3::origin());
        }

        let mut min = Point3::new(f64::MAX, f64::MAX, f64::MAX);
        let mut max = Point3::new(f64::MIN, f64::MIN, f64::MIN);

        for p in &self.positions {
            min = min.inf(p);
            max = max.sup(p);
        }

        (min, max)
    }

    /// Average of all vertex positions
    pub fn centroid(&self) -> Point3<f64> {
        if self.positions.is_empty() {
            return Point3::origin();
        }

        let sum = self
            .positions
            .iter()
            .fold(Vector3::zeros(), |acc, p| acc + p.coords);
        Point3::from(sum / self.positions.len() as f64)
    }

    /// Apply an affine transform to every vertex
    pub fn transform(&mut self, matrix: &Matrix4<f64>) {
        for p in &mut self.positions {
            *p = matrix.transform_point(p);
        }
        // Mirroring transforms turn faces inside out
        if matrix.fixed_view::<3, 3>(0, 0).clone_owned().determinant() < 0.0 {
            for face in &mut self.indices {
                face.swap(1, 2);
            }
        }
    }

    /// Signed volume enclosed by the faces (meaningful for closed meshes)
    pub fn signed_volume(&self) -> f64 {
        let faces: Vec<usize> = (0..self.indices.len()).collect();
        self.signed_volume_of(&faces)
    }

    /// Signed volume enclosed by a subset of the faces.
    ///
    /// Measured from the first corner of the first face rather than the world
    /// origin to keep precision with large projected coordinates.
    pub fn signed_volume_of(&self, faces: &[usize]) -> f64 {
        let Some(&first) = faces.first() else {
            return 0.0;
        };
        let reference = self.triangle(first)[0];
        faces
            .iter()
            .map(|&f| {
                let [a, b, c] = self.triangle(f);
                let (a, b, c) = (a - reference, b - reference, c - reference);
                a.dot(&b.cross(&c))
            })
            .sum::<f64>()
            / 6.0
    }

    /// Check that every index points to an existing vertex
    pub fn validate_indices(&self) -> Result<()> {
        let len = self.positions.len();
        for face in &self.indices {
            for &index in face {
                if index as usize >= len {
                    return Err(Error::IndexOutOfRange {
                        index: index as usize,
                        len,
                    });
                }
            }
        }
        Ok(())
    }

    /// Drop vertices that no face references, keeping their order
    pub fn remove_unreferenced_vertices(&mut self) {
        let mut remap = vec![u32::MAX; self.positions.len()];
        let mut positions = Vec::with_capacity(self.positions.len());
        for face in &mut self.indices {
            for index in face.iter_mut() {
                let slot = &mut remap[*index as usize];
                if *slot == u32::MAX {
                    *slot = positions.len() as u32;
                    positions.push(self.positions[*index as usize]);
                }
                *index = *slot;
            }
        }
        self.positions = positions;
    }

    /// Clear the mesh
    #[inline]
    pub fn clear(&mut self) {
        self.positions.clear();
        self.indices.clear();
    }
}

impl Default for Mesh {
    fn default() -> Self {
        Self::new()
    }
}
