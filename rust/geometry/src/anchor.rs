// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Icon anchors: where a map marker for a mesh should sit

use crate::{Error, Mesh, Point3, Result};

/// Search radii tried in order around the anchor XY position
pub const DEFAULT_SEARCH_RADII: [f64; 5] = [1.0, 3.0, 10.0, 30.0, 100.0];

/// Highest vertex Z within the first radius that contains any vertex
pub fn height_at_xy(mesh: &Mesh, x: f64, y: f64, radii: &[f64]) -> Result<f64> {
    for &radius in radii {
        let r2 = radius * radius;
        let highest = mesh
            .positions
            .iter()
            .filter(|p| (p.x - x).powi(2) + (p.y - y).powi(2) <= r2)
            .map(|p| p.z)
            .fold(None, |acc: Option<f64>, z| Some(acc.map_or(z, |a| a.max(z))));
        if let Some(z) = highest {
            return Ok(z);
        }
    }

    Err(Error::NoVertexNearAnchor {
        x,
        y,
        radius: radii.last().copied().unwrap_or(0.0),
    })
}

/// Anchor at the bounding-box XY center, on top of the mesh, raised by `z_offset`
pub fn icon_anchor(mesh: &Mesh, radii: &[f64], z_offset: f64) -> Result<Point3<f64>> {
    if mesh.positions.is_empty() {
        return Err(Error::EmptyMesh("cannot anchor an icon on an empty mesh".to_string()));
    }
    let (min, max) = mesh.bounds();
    let x = (min.x + max.x) / 2.0;
    let y = (min.y + max.y) / 2.0;
    let z = height_at_xy(mesh, x, y, radii)?;
    Ok(Point3::new(x, y, z + z_offset))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn far_apart() -> Mesh {
        Mesh::from_parts(
            vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(50.0, 0.0, 7.0),
                Point3::new(0.0, 50.0, 3.0),
                Point3::new(26.0, 25.0, 4.0),
            ],
            vec![[0, 1, 2]],
        )
        .unwrap()
    }

    #[test]
    fn test_nearest_radius_wins() {
        let mesh = far_apart();
        // Only the vertex at (26, 25) is within 1 unit of (25, 25)
        assert_eq!(height_at_xy(&mesh, 25.0, 25.0, &DEFAULT_SEARCH_RADII).unwrap(), 4.0);
        // From the origin, radius 1 only sees the origin vertex
        assert_eq!(height_at_xy(&mesh, 0.0, 0.0, &DEFAULT_SEARCH_RADII).unwrap(), 0.0);
    }

    #[test]
    fn test_anchor_adds_offset() {
        let anchor = icon_anchor(&far_apart(), &DEFAULT_SEARCH_RADII, 2.0).unwrap();
        assert_eq!(anchor, Point3::new(25.0, 25.0, 6.0));
    }

    #[test]
    fn test_no_vertex_in_reach_is_an_error() {
        let mesh = far_apart();
        assert!(matches!(
            height_at_xy(&mesh, 500.0, 500.0, &DEFAULT_SEARCH_RADII),
            Err(Error::NoVertexNearAnchor { radius, .. }) if radius == 100.0
        ));
    }
}
