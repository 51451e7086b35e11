// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Surface triangulation
//!
//! Turns a surface given as index rings into a shared vertex array into a
//! triangle mesh. Rings are projected on their best-fit plane, repaired in
//! 2D when needed, ear-clipped with earcutr (ring edges are kept as
//! triangle edges) and mapped back to 3D.
//!
//! Malformed surfaces are reported as a [`TriangulationDefect`], never as an
//! [`Error`]: callers drop the surface and continue. Only broken input
//! invariants (an index outside the vertex array) are fatal.

use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use thiserror::Error as ThisError;

use crate::polygon::{compute_signed_area, Polygon2D, VERTEX_TOLERANCE};
use crate::{Error, Mesh, Plane, Point2, Point3, Result};

/// Why a surface could not be triangulated.
#[derive(ThisError, Debug, Clone, PartialEq)]
pub enum TriangulationDefect {
    #[error("surface has {0} distinct points, at least 3 are needed")]
    TooFewPoints(usize),

    #[error("surface points are not coplanar")]
    NonPlanar,

    #[error("surface has no area left after repair")]
    Degenerate,

    #[error("ear clipping failed: {0}")]
    EarClipping(String),
}

/// Outcome of triangulating one surface
pub type SurfaceResult = std::result::Result<Mesh, TriangulationDefect>;

/// Minimum triangle area kept after triangulation
const MIN_TRIANGLE_AREA: f64 = 1e-12;

/// Triangulate a simple polygon (no holes)
/// Returns triangle indices into the input points
#[inline]
pub fn triangulate_polygon(points: &[Point2<f64>]) -> Result<Vec<usize>> {
    triangulate_polygon_with_holes(points, &[])
}

/// Triangulate a polygon with holes
/// Returns triangle indices into the combined vertex array (outer + all holes)
pub fn triangulate_polygon_with_holes(
    outer: &[Point2<f64>],
    holes: &[Vec<Point2<f64>>],
) -> Result<Vec<usize>> {
    if outer.len() < 3 {
        return Err(Error::TriangulationError(
            "Need at least 3 points in outer boundary".to_string(),
        ));
    }

    // FAST PATH: Triangle - no triangulation needed
    if outer.len() == 3 && holes.is_empty() {
        return Ok(vec![0, 1, 2]);
    }

    // Flatten vertices for earcutr
    let total_points: usize = outer.len() + holes.iter().map(|h| h.len()).sum::<usize>();
    let mut vertices = Vec::with_capacity(total_points * 2);

    for p in outer {
        vertices.push(p.x);
        vertices.push(p.y);
    }

    // Add holes and track their start indices
    let mut hole_indices = Vec::with_capacity(holes.len());
    for hole in holes {
        hole_indices.push(vertices.len() / 2);
        for p in hole {
            vertices.push(p.x);
            vertices.push(p.y);
        }
    }

    earcutr::earcut(&vertices, &hole_indices, 2)
        .map_err(|e| Error::TriangulationError(format!("{:?}", e)))
}

/// Triangulate one valid 2D polygon.
///
/// Near-coincident vertices are merged before ear clipping, and triangles
/// whose centroid is not inside the polygon (or that have no area) are
/// dropped afterwards. Returns the points used and the triangles into them.
pub fn triangulate_polygon_2d(
    polygon: &Polygon2D,
) -> std::result::Result<(Vec<Point2<f64>>, Vec<[u32; 3]>), TriangulationDefect> {
    let polygon = polygon.dedup_vertices(VERTEX_TOLERANCE);
    if polygon.outer.len() < 3 {
        return Err(TriangulationDefect::TooFewPoints(polygon.outer.len()));
    }

    let indices = triangulate_polygon_with_holes(&polygon.outer, &polygon.holes)
        .map_err(|e| TriangulationDefect::EarClipping(e.to_string()))?;

    let points: Vec<Point2<f64>> = polygon.rings().flatten().copied().collect();

    let mut triangles = Vec::with_capacity(indices.len() / 3);
    for tri in indices.chunks_exact(3) {
        let corners = [points[tri[0]], points[tri[1]], points[tri[2]]];
        if compute_signed_area(&corners).abs() <= MIN_TRIANGLE_AREA {
            continue;
        }
        let centroid = Point2::from((corners[0].coords + corners[1].coords + corners[2].coords) / 3.0);
        if !polygon.contains(&centroid) {
            continue;
        }
        triangles.push([tri[0] as u32, tri[1] as u32, tri[2] as u32]);
    }

    Ok(compact(points, triangles))
}

/// Merge points that land on the same tolerance grid cell and drop points
/// no triangle uses
fn compact(points: Vec<Point2<f64>>, triangles: Vec<[u32; 3]>) -> (Vec<Point2<f64>>, Vec<[u32; 3]>) {
    let mut cells: FxHashMap<(i64, i64), u32> = FxHashMap::default();
    let mut remap: Vec<Option<u32>> = vec![None; points.len()];
    let mut kept = Vec::new();

    let mut out = Vec::with_capacity(triangles.len());
    for tri in triangles {
        let mut mapped = [0u32; 3];
        for (slot, &index) in mapped.iter_mut().zip(&tri) {
            *slot = *remap[index as usize].get_or_insert_with(|| {
                let p = points[index as usize];
                let cell = (
                    (p.x / VERTEX_TOLERANCE).round() as i64,
                    (p.y / VERTEX_TOLERANCE).round() as i64,
                );
                *cells.entry(cell).or_insert_with(|| {
                    kept.push(p);
                    (kept.len() - 1) as u32
                })
            });
        }
        if mapped[0] != mapped[1] && mapped[1] != mapped[2] && mapped[0] != mapped[2] {
            out.push(mapped);
        }
    }

    (kept, out)
}

/// Triangulate a surface given by an outer ring and holes, all as indices
/// into `vertices`.
///
/// The outer `Result` carries fatal errors (an index out of range). The
/// inner one is the triangulation outcome: a [`TriangulationDefect`] means
/// the surface should be skipped.
pub fn triangulate_surface(
    vertices: &[Point3<f64>],
    outer: &[u32],
    holes: &[Vec<u32>],
) -> Result<SurfaceResult> {
    for &index in outer.iter().chain(holes.iter().flatten()) {
        if index as usize >= vertices.len() {
            return Err(Error::IndexOutOfRange {
                index: index as usize,
                len: vertices.len(),
            });
        }
    }

    // FAST PATH: a triangle is its own triangulation
    if outer.len() == 3 && holes.is_empty() {
        let positions = outer.iter().map(|&i| vertices[i as usize]).collect();
        return Ok(Ok(Mesh {
            positions,
            indices: vec![[0, 1, 2]],
        }));
    }

    let mut unique: SmallVec<[u32; 16]> = SmallVec::new();
    for &index in outer.iter().chain(holes.iter().flatten()) {
        if !unique.contains(&index) {
            unique.push(index);
        }
    }
    if unique.len() < 3 {
        return Ok(Err(TriangulationDefect::TooFewPoints(unique.len())));
    }

    let fit_points: Vec<Point3<f64>> = unique.iter().map(|&i| vertices[i as usize]).collect();
    let plane = Plane::fit(&fit_points);
    if !plane.is_valid() {
        return Ok(Err(TriangulationDefect::NonPlanar));
    }

    let ring_to_2d = |ring: &[u32]| -> Result<Vec<Point2<f64>>> {
        let points: Vec<Point3<f64>> = ring.iter().map(|&i| vertices[i as usize]).collect();
        plane.project(&points)
    };
    let polygon = Polygon2D::new(
        ring_to_2d(outer)?,
        holes
            .iter()
            .map(|h| ring_to_2d(h))
            .collect::<Result<Vec<_>>>()?,
    );

    let parts = if polygon.is_valid() {
        vec![polygon]
    } else {
        polygon.make_valid()
    };

    let mut points_2d: Vec<Point2<f64>> = Vec::new();
    let mut indices: Vec<[u32; 3]> = Vec::new();
    let mut last_defect = TriangulationDefect::Degenerate;
    for part in &parts {
        match triangulate_polygon_2d(part) {
            Ok((points, triangles)) => {
                let offset = points_2d.len() as u32;
                points_2d.extend(points);
                indices.extend(
                    triangles
                        .into_iter()
                        .map(|t| [t[0] + offset, t[1] + offset, t[2] + offset]),
                );
            }
            Err(defect) => last_defect = defect,
        }
    }

    if indices.is_empty() {
        return Ok(Err(last_defect));
    }

    let positions = plane.unproject(&points_2d)?;
    Ok(Ok(Mesh { positions, indices }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::polygon::point_in_contour;

    fn square_with_hole() -> (Vec<Point3<f64>>, Vec<u32>, Vec<Vec<u32>>) {
        let vertices = vec![
            Point3::new(0.0, 0.0, 2.0),
            Point3::new(4.0, 0.0, 2.0),
            Point3::new(4.0, 4.0, 2.0),
            Point3::new(0.0, 4.0, 2.0),
            Point3::new(1.0, 1.0, 2.0),
            Point3::new(1.0, 3.0, 2.0),
            Point3::new(3.0, 3.0, 2.0),
            Point3::new(3.0, 1.0, 2.0),
        ];
        (vertices, vec![0, 1, 2, 3], vec![vec![4, 5, 6, 7]])
    }

    #[test]
    fn test_triangle_fast_path_keeps_order() {
        let vertices = vec![
            Point3::new(5.0, 1.0, 0.0),
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 5.0, 3.0),
            Point3::new(9.0, 9.0, 9.0),
        ];
        let mesh = triangulate_surface(&vertices, &[2, 0, 1], &[]).unwrap().unwrap();
        assert_eq!(mesh.indices, vec![[0, 1, 2]]);
        assert_eq!(mesh.positions, vec![vertices[2], vertices[0], vertices[1]]);
    }

    #[test]
    fn test_no_triangle_inside_hole() {
        let (vertices, outer, holes) = square_with_hole();
        let mesh = triangulate_surface(&vertices, &outer, &holes).unwrap().unwrap();
        assert!(mesh.triangle_count() >= 8);

        let hole: Vec<Point2<f64>> = holes[0]
            .iter()
            .map(|&i| Point2::new(vertices[i as usize].x, vertices[i as usize].y))
            .collect();
        for face in 0..mesh.triangle_count() {
            let [a, b, c] = mesh.triangle(face);
            let centroid = Point2::new((a.x + b.x + c.x) / 3.0, (a.y + b.y + c.y) / 3.0);
            assert!(!point_in_contour(&centroid, &hole));
            assert!((a.z - 2.0).abs() < 1e-9);
        }

        let area: f64 = (0..mesh.triangle_count())
            .map(|f| mesh.face_normal(f).norm() / 2.0)
            .sum();
        assert!((area - 12.0).abs() < 1e-9);
    }

    #[test]
    fn test_non_planar_surface_is_a_defect() {
        let vertices = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(1.0, 1.0, 5.0),
            Point3::new(0.0, 1.0, -5.0),
        ];
        let outcome = triangulate_surface(&vertices, &[0, 1, 2, 3], &[]).unwrap();
        assert_eq!(outcome, Err(TriangulationDefect::NonPlanar));
    }

    #[test]
    fn test_repeated_vertex_surface_is_a_defect() {
        let vertices = vec![Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 0.0, 0.0)];
        let outcome = triangulate_surface(&vertices, &[0, 1, 0, 1], &[]).unwrap();
        assert_eq!(outcome, Err(TriangulationDefect::TooFewPoints(2)));
    }

    #[test]
    fn test_out_of_range_index_is_fatal() {
        let vertices = vec![Point3::new(0.0, 0.0, 0.0)];
        let result = triangulate_surface(&vertices, &[0, 1, 2, 3], &[]);
        assert!(matches!(result, Err(Error::IndexOutOfRange { index: 1, len: 1 })));
    }

    #[test]
    fn test_self_intersecting_surface_is_repaired() {
        let vertices = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(2.0, 2.0, 0.0),
            Point3::new(2.0, 0.0, 0.0),
            Point3::new(0.0, 2.0, 0.0),
        ];
        let mesh = triangulate_surface(&vertices, &[0, 1, 2, 3], &[]).unwrap().unwrap();
        let area: f64 = (0..mesh.triangle_count())
            .map(|f| mesh.face_normal(f).norm() / 2.0)
            .sum();
        assert!((area - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_concave_polygon() {
        let outer = vec![
            Point2::new(0.0, 0.0),
            Point2::new(4.0, 0.0),
            Point2::new(4.0, 4.0),
            Point2::new(2.0, 1.0),
            Point2::new(0.0, 4.0),
        ];
        let (points, triangles) = triangulate_polygon_2d(&Polygon2D::new(outer, Vec::new())).unwrap();
        assert_eq!(points.len(), 5);
        assert_eq!(triangles.len(), 3);
    }
}
