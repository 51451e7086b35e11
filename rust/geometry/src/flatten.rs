// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Footprints: horizontal meshes built from 3D meshes

use crate::polygon::{compute_signed_area, ensure_ccw, union_contours};
use crate::triangulation::triangulate_polygon_2d;
use crate::{Error, Mesh, Point2, Point3, Result};

/// Largest horizontal component of a unit face normal for a face that still
/// counts as horizontal
const HORIZONTAL_TOLERANCE: f64 = 1e-3;

/// Make every face of a horizontal mesh point up.
///
/// Fails if a face is not horizontal. Faces without area are left alone.
pub fn orient_faces_z_up(mesh: &mut Mesh) -> Result<()> {
    for face in 0..mesh.triangle_count() {
        let normal = mesh.face_normal(face);
        let length = normal.norm();
        if length <= f64::EPSILON {
            continue;
        }
        let normal = normal / length;
        let magnitude = normal.xy().norm();
        if magnitude >= HORIZONTAL_TOLERANCE {
            return Err(Error::NonHorizontalFace { face, magnitude });
        }
        if normal.z < 0.0 {
            mesh.flip_face(face);
        }
    }
    Ok(())
}

/// Flatten a mesh to its footprint.
///
/// All triangles are projected on the XY plane and merged into polygons,
/// which are triangulated again at height `z` (the lowest vertex when not
/// given). The result faces up.
pub fn flatten(mesh: &Mesh, z: Option<f64>) -> Result<Mesh> {
    if mesh.is_empty() {
        return Err(Error::EmptyMesh("cannot flatten an empty mesh".to_string()));
    }

    let height = z.unwrap_or_else(|| mesh.bounds().0.z);

    let contours: Vec<Vec<Point2<f64>>> = (0..mesh.triangle_count())
        .filter_map(|face| {
            let triangle: Vec<Point2<f64>> = mesh
                .triangle(face)
                .iter()
                .map(|p| Point2::new(p.x, p.y))
                .collect();
            (compute_signed_area(&triangle).abs() > 0.0).then(|| ensure_ccw(&triangle))
        })
        .collect();

    let mut footprint = Mesh::new();
    for polygon in union_contours(&contours) {
        // Parts that cannot be triangulated have no area to contribute
        let Ok((points, triangles)) = triangulate_polygon_2d(&polygon) else {
            continue;
        };
        let offset = footprint.vertex_count() as u32;
        footprint
            .positions
            .extend(points.iter().map(|p| Point3::new(p.x, p.y, height)));
        footprint.indices.extend(
            triangles
                .into_iter()
                .map(|t| [t[0] + offset, t[1] + offset, t[2] + offset]),
        );
    }

    if footprint.is_empty() {
        return Err(Error::EmptyMesh("mesh has no footprint".to_string()));
    }

    orient_faces_z_up(&mut footprint)?;
    Ok(footprint)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn box_mesh() -> Mesh {
        let p = |x: f64, y: f64, z: f64| Point3::new(x, y, z);
        let positions = vec![
            p(0.0, 0.0, 1.0),
            p(2.0, 0.0, 1.0),
            p(2.0, 1.0, 1.0),
            p(0.0, 1.0, 1.0),
            p(0.0, 0.0, 3.0),
            p(2.0, 0.0, 3.0),
            p(2.0, 1.0, 3.0),
            p(0.0, 1.0, 3.0),
        ];
        let indices = vec![
            [0, 2, 1],
            [0, 3, 2],
            [4, 5, 6],
            [4, 6, 7],
            [0, 1, 5],
            [0, 5, 4],
            [1, 2, 6],
            [1, 6, 5],
            [2, 3, 7],
            [2, 7, 6],
            [3, 0, 4],
            [3, 4, 7],
        ];
        Mesh::from_parts(positions, indices).unwrap()
    }

    #[test]
    fn test_flatten_box() {
        let footprint = flatten(&box_mesh(), None).unwrap();
        assert!(footprint.positions.iter().all(|p| p.z == 1.0));
        let area: f64 = (0..footprint.triangle_count())
            .map(|f| {
                let n = footprint.face_normal(f);
                assert!(n.z > 0.0);
                n.norm() / 2.0
            })
            .sum();
        assert!((area - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_flatten_at_given_height() {
        let footprint = flatten(&box_mesh(), Some(-4.0)).unwrap();
        assert!(footprint.positions.iter().all(|p| p.z == -4.0));
    }

    #[test]
    fn test_flatten_empty_fails() {
        assert!(matches!(flatten(&Mesh::new(), None), Err(Error::EmptyMesh(_))));
    }

    #[test]
    fn test_orient_flips_downward_faces() {
        let mut mesh = Mesh::from_parts(
            vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(0.0, 1.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
            ],
            vec![[0, 1, 2]],
        )
        .unwrap();
        assert!(mesh.face_normal(0).z < 0.0);
        orient_faces_z_up(&mut mesh).unwrap();
        assert!(mesh.face_normal(0).z > 0.0);
    }

    #[test]
    fn test_orient_rejects_walls() {
        let mut mesh = Mesh::from_parts(
            vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(1.0, 0.0, 1.0),
            ],
            vec![[0, 1, 2]],
        )
        .unwrap();
        assert!(matches!(
            orient_faces_z_up(&mut mesh),
            Err(Error::NonHorizontalFace { face: 0, .. })
        ));
    }
}
