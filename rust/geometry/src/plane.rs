// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Best-fit plane through a point set
//!
//! The plane is fitted with a singular value decomposition of the centered
//! points. It carries an orthonormal in-plane basis so that points can be
//! moved to 2D for polygon work and back to 3D afterwards.

use nalgebra::DMatrix;

use crate::{Error, Point2, Point3, Result, Vector3};

/// Minimum `(σ0 - σ2) / σ0` for a point set to count as planar
pub const PLANARITY_THRESHOLD: f64 = 0.999;

/// A fitted plane with its 2D coordinate system
#[derive(Debug, Clone, PartialEq)]
pub struct Plane {
    valid: bool,
    /// Point of the plane closest to the world origin
    pub origin: Point3<f64>,
    /// Unit normal (zero for an invalid plane)
    pub normal: Vector3<f64>,
    /// First in-plane axis
    pub u: Vector3<f64>,
    /// Second in-plane axis
    pub v: Vector3<f64>,
}

impl Plane {
    fn invalid() -> Self {
        Self {
            valid: false,
            origin: Point3::origin(),
            normal: Vector3::zeros(),
            u: Vector3::zeros(),
            v: Vector3::zeros(),
        }
    }

    /// Fit a plane through the points.
    ///
    /// Fewer than 3 points, or points that are not close enough to a common
    /// plane, give an invalid plane instead of an error.
    pub fn fit(points: &[Point3<f64>]) -> Self {
        if points.len() < 3 {
            return Self::invalid();
        }

        let n = points.len() as f64;
        let centroid = points
            .iter()
            .fold(Vector3::zeros(), |acc, p| acc + p.coords)
            / n;

        let centered = DMatrix::<f64>::from_fn(points.len(), 3, |row, col| {
            points[row][col] - centroid[col]
        });

        let svd = centered.svd(false, true);
        let Some(v_t) = svd.v_t else {
            return Self::invalid();
        };

        // Sort explicitly, SVD routines do not all agree on the order
        let mut order: [usize; 3] = [0, 1, 2];
        order.sort_by(|&a, &b| svd.singular_values[b].total_cmp(&svd.singular_values[a]));
        let sigma = order.map(|i| svd.singular_values[i]);

        let smallest = order[2];
        let mut normal = Vector3::new(v_t[(smallest, 0)], v_t[(smallest, 1)], v_t[(smallest, 2)]);
        let norm = normal.norm();
        if !norm.is_finite() || norm < 1e-12 {
            return Self::invalid();
        }
        normal /= norm;

        // Plane equation n.x + d = 0 through the centroid
        let d = -normal.dot(&centroid);
        let origin = Point3::from(-d / normal.norm_squared() * normal);

        let (u, v) = in_plane_basis(&normal);

        // Collinear points pass the ratio test but do not span a plane
        let valid = sigma[0] > 0.0
            && sigma[1] > sigma[0] * 1e-9
            && (sigma[0] - sigma[2]) / sigma[0] > PLANARITY_THRESHOLD;

        Self {
            valid,
            origin,
            normal,
            u,
            v,
        }
    }

    /// Whether the fitted points were coplanar enough to use the plane
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// Project 3D points into plane coordinates
    pub fn project(&self, points: &[Point3<f64>]) -> Result<Vec<Point2<f64>>> {
        if !self.valid {
            return Err(Error::InvalidPlane("project"));
        }
        Ok(points
            .iter()
            .map(|p| {
                let shifted = p - self.origin;
                Point2::new(shifted.dot(&self.u), shifted.dot(&self.v))
            })
            .collect())
    }

    /// Map plane coordinates back to 3D.
    ///
    /// Only exact for points that lie on the plane.
    pub fn unproject(&self, points: &[Point2<f64>]) -> Result<Vec<Point3<f64>>> {
        if !self.valid {
            return Err(Error::InvalidPlane("unproject"));
        }
        Ok(points
            .iter()
            .map(|p| self.origin + self.u * p.x + self.v * p.y)
            .collect())
    }
}

fn in_plane_basis(normal: &Vector3<f64>) -> (Vector3<f64>, Vector3<f64>) {
    let mut arbitrary = Vector3::new(1.0, 0.0, 0.0);
    let abs_normal = normal.abs();
    if (arbitrary - abs_normal).amax() < 1e-8 {
        arbitrary = Vector3::new(0.0, 1.0, 0.0);
    }
    let u = normal.cross(&arbitrary).normalize();
    let v = normal.cross(&u);
    (u, v)
}
