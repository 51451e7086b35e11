// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Global vertex deduplication across geometries.
//!
//! All local vertex arrays are concatenated, exact duplicates are merged
//! (keeping the order of first occurrence) and every boundary is re-indexed
//! into the shared array.

use nalgebra::Point3;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::geometry::{Boundaries, Geometry, GeometryKind};

/// A geometry as written in a CityJSON document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeometryRecord {
    #[serde(rename = "type")]
    pub kind: GeometryKind,
    pub lod: String,
    pub boundaries: Boundaries,
}

/// Bit pattern used as the equality key, with `-0.0` folded onto `0.0`
#[inline]
fn vertex_key(p: &Point3<f64>) -> [u64; 3] {
    let bits = |v: f64| if v == 0.0 { 0.0f64.to_bits() } else { v.to_bits() };
    [bits(p.x), bits(p.y), bits(p.z)]
}

/// Geometries sharing one deduplicated vertex array
#[derive(Debug)]
pub struct GeometryContainer<'a> {
    geometries: Vec<&'a Geometry>,
    unique_vertices: Vec<Point3<f64>>,
    boundaries: Vec<Boundaries>,
}

impl<'a> GeometryContainer<'a> {
    pub fn new(geometries: impl IntoIterator<Item = &'a Geometry>) -> Result<Self> {
        let geometries: Vec<&Geometry> = geometries.into_iter().collect();

        let total: usize = geometries.iter().map(|g| g.vertices.len()).sum();
        let mut lookup: FxHashMap<[u64; 3], u32> = FxHashMap::default();
        let mut unique_vertices = Vec::new();
        let mut mapping = Vec::with_capacity(total);
        let mut offsets = Vec::with_capacity(geometries.len());

        for geometry in &geometries {
            offsets.push(mapping.len());
            for vertex in &geometry.vertices {
                let index = *lookup.entry(vertex_key(vertex)).or_insert_with(|| {
                    unique_vertices.push(*vertex);
                    (unique_vertices.len() - 1) as u32
                });
                mapping.push(index);
            }
        }

        let boundaries = geometries
            .iter()
            .zip(&offsets)
            .map(|(geometry, &offset)| {
                let len = geometry.vertices.len();
                geometry.boundaries.try_map(&mut |index| {
                    if index as usize >= len {
                        return Err(Error::BoundaryIndexOutOfRange { index, len });
                    }
                    Ok(mapping[offset + index as usize])
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            geometries,
            unique_vertices,
            boundaries,
        })
    }

    pub fn unique_vertices(&self) -> &[Point3<f64>] {
        &self.unique_vertices
    }

    /// Re-indexed boundaries, in the order the geometries were given
    pub fn boundaries(&self) -> &[Boundaries] {
        &self.boundaries
    }

    pub fn len(&self) -> usize {
        self.geometries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.geometries.is_empty()
    }

    /// Mean of the unique vertices rounded to the scale grid, zero when
    /// there are no vertices
    pub fn optimal_translate(&self, scale: [f64; 3]) -> [f64; 3] {
        if self.unique_vertices.is_empty() {
            return [0.0; 3];
        }
        let n = self.unique_vertices.len() as f64;
        let sum = self
            .unique_vertices
            .iter()
            .fold([0.0; 3], |acc, p| [acc[0] + p.x, acc[1] + p.y, acc[2] + p.z]);
        std::array::from_fn(|axis| (sum[axis] / n / scale[axis]).round() * scale[axis])
    }

    pub fn geometry_records(&self) -> Vec<GeometryRecord> {
        self.geometries
            .iter()
            .zip(&self.boundaries)
            .map(|(geometry, boundaries)| GeometryRecord {
                kind: geometry.kind,
                lod: geometry.lod.to_string(),
                boundaries: boundaries.clone(),
            })
            .collect()
    }

    /// Unique vertices as integers on the `scale` grid around `translate`
    pub fn quantized_vertices(&self, scale: [f64; 3], translate: [f64; 3]) -> Vec<[i64; 3]> {
        self.unique_vertices
            .iter()
            .map(|p| {
                let q = |v: f64, axis: usize| ((v - translate[axis]) / scale[axis]).round() as i64;
                [q(p.x, 0), q(p.y, 1), q(p.z, 2)]
            })
            .collect()
    }
}
