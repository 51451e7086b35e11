// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! 2D polygons with holes
//!
//! Validity checks and repair for projected surfaces, built on the i_overlay
//! crate. A repair may split one polygon into several disjoint ones.

use i_overlay::core::fill_rule::FillRule;
use i_overlay::core::overlay_rule::OverlayRule;
use i_overlay::float::single::SingleFloatOverlay;
use nalgebra::Point2;

/// Minimum area threshold - polygons smaller than this are considered degenerate
const MIN_AREA_THRESHOLD: f64 = 1e-10;

/// Tolerance used to merge near-coincident ring vertices
pub const VERTEX_TOLERANCE: f64 = 1e-6;

/// A polygon made of an outer ring and zero or more holes.
///
/// Rings are open: the last point is not a copy of the first.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Polygon2D {
    pub outer: Vec<Point2<f64>>,
    pub holes: Vec<Vec<Point2<f64>>>,
}

impl Polygon2D {
    pub fn new(outer: Vec<Point2<f64>>, holes: Vec<Vec<Point2<f64>>>) -> Self {
        Self { outer, holes }
    }

    /// Iterate over the outer ring followed by the holes
    pub fn rings(&self) -> impl Iterator<Item = &Vec<Point2<f64>>> {
        std::iter::once(&self.outer).chain(self.holes.iter())
    }

    /// Check that the polygon is simple: no repeated points, no degenerate
    /// rings, no crossing or touching edges and every hole inside the outer ring.
    pub fn is_valid(&self) -> bool {
        for ring in self.rings() {
            if !is_valid_contour(ring) || has_repeated_points(ring) {
                return false;
            }
        }

        let edges: Vec<(usize, usize, Point2<f64>, Point2<f64>)> = self
            .rings()
            .enumerate()
            .flat_map(|(r, ring)| {
                let n = ring.len();
                (0..n).map(move |i| (r, i, ring[i], ring[(i + 1) % n]))
            })
            .collect();

        for (a, &(ring_a, i, a0, a1)) in edges.iter().enumerate() {
            for &(ring_b, j, b0, b1) in edges.iter().skip(a + 1) {
                if ring_a == ring_b {
                    let n = self.ring_len(ring_a);
                    // Neighbouring edges share exactly one endpoint
                    if j == i + 1 || (i == 0 && j == n - 1) {
                        continue;
                    }
                }
                if segments_intersect(&a0, &a1, &b0, &b1) {
                    return false;
                }
            }
        }

        self.holes
            .iter()
            .all(|hole| point_in_contour(&hole[0], &self.outer))
    }

    fn ring_len(&self, ring: usize) -> usize {
        if ring == 0 {
            self.outer.len()
        } else {
            self.holes[ring - 1].len()
        }
    }

    /// Restore validity with a boolean difference of the outer ring and the
    /// holes. Self-intersecting rings are resolved with the non-zero rule, so
    /// the result can hold several polygons (or none for a degenerate input).
    pub fn make_valid(&self) -> Vec<Polygon2D> {
        let outer = remove_repeated_points(&self.outer, 0.0);
        if outer.len() < 3 {
            return Vec::new();
        }

        let subject = vec![contour_to_path(&outer)];
        let clip: Vec<Vec<[f64; 2]>> = self
            .holes
            .iter()
            .map(|h| remove_repeated_points(h, 0.0))
            .filter(|h| h.len() >= 3)
            .map(|h| contour_to_path(&ensure_ccw(&h)))
            .collect();

        let shapes = subject.overlay(&clip, OverlayRule::Difference, FillRule::NonZero);
        shapes_to_polygons(&shapes)
    }

    /// Strict containment: inside the outer ring and outside every hole
    pub fn contains(&self, point: &Point2<f64>) -> bool {
        point_in_contour(point, &self.outer)
            && !self.holes.iter().any(|hole| point_in_contour(point, hole))
    }

    /// Drop vertices closer than `tolerance` to their predecessor in every ring
    pub fn dedup_vertices(&self, tolerance: f64) -> Polygon2D {
        Polygon2D {
            outer: remove_repeated_points(&self.outer, tolerance),
            holes: self
                .holes
                .iter()
                .map(|h| remove_repeated_points(h, tolerance))
                .filter(|h| h.len() >= 3)
                .collect(),
        }
    }

    /// Signed area of the outer ring minus the hole areas
    pub fn area(&self) -> f64 {
        compute_signed_area(&self.outer).abs()
            - self
                .holes
                .iter()
                .map(|h| compute_signed_area(h).abs())
                .sum::<f64>()
    }
}

/// Union a set of contours into polygons with holes (non-zero fill rule)
pub fn union_contours(contours: &[Vec<Point2<f64>>]) -> Vec<Polygon2D> {
    let mut valid = contours
        .iter()
        .filter(|c| is_valid_contour(c))
        .map(|c| contour_to_path(&ensure_ccw(c)));

    let Some(first) = valid.next() else {
        return Vec::new();
    };
    let subject = vec![first];
    let clip: Vec<Vec<[f64; 2]>> = valid.collect();

    let shapes = subject.overlay(&clip, OverlayRule::Union, FillRule::NonZero);
    shapes_to_polygons(&shapes)
}

/// Check if a contour is valid (has area, not degenerate)
pub fn is_valid_contour(contour: &[Point2<f64>]) -> bool {
    if contour.len() < 3 {
        return false;
    }

    let area = compute_signed_area(contour).abs();
    area > MIN_AREA_THRESHOLD
}

/// Compute the signed area of a 2D contour
/// Positive = counter-clockwise, Negative = clockwise
pub fn compute_signed_area(contour: &[Point2<f64>]) -> f64 {
    if contour.len() < 3 {
        return 0.0;
    }

    let mut area = 0.0;
    let n = contour.len();

    for i in 0..n {
        let j = (i + 1) % n;
        area += contour[i].x * contour[j].y;
        area -= contour[j].x * contour[i].y;
    }

    area * 0.5
}

/// Ensure contour has counter-clockwise winding (positive area)
pub fn ensure_ccw(contour: &[Point2<f64>]) -> Vec<Point2<f64>> {
    if compute_signed_area(contour) < 0.0 {
        contour.iter().rev().cloned().collect()
    } else {
        contour.to_vec()
    }
}

/// Ensure contour has clockwise winding (for holes)
pub fn ensure_cw(contour: &[Point2<f64>]) -> Vec<Point2<f64>> {
    if compute_signed_area(contour) > 0.0 {
        contour.iter().rev().cloned().collect()
    } else {
        contour.to_vec()
    }
}

/// Check if a point is inside a contour using ray casting
pub fn point_in_contour(point: &Point2<f64>, contour: &[Point2<f64>]) -> bool {
    if contour.len() < 3 {
        return false;
    }

    let mut inside = false;
    let n = contour.len();

    let mut j = n - 1;
    for i in 0..n {
        let pi = &contour[i];
        let pj = &contour[j];

        if ((pi.y > point.y) != (pj.y > point.y))
            && (point.x < (pj.x - pi.x) * (point.y - pi.y) / (pj.y - pi.y) + pi.x)
        {
            inside = !inside;
        }
        j = i;
    }

    inside
}

/// Remove consecutive points closer than `tolerance`, including a closing
/// point equal to the first one
pub fn remove_repeated_points(contour: &[Point2<f64>], tolerance: f64) -> Vec<Point2<f64>> {
    let mut result: Vec<Point2<f64>> = Vec::with_capacity(contour.len());
    for p in contour {
        match result.last() {
            Some(last) if (p - last).norm() <= tolerance => {}
            _ => result.push(*p),
        }
    }
    while result.len() > 1 {
        let first = result[0];
        match result.last() {
            Some(last) if (first - last).norm() <= tolerance => {
                result.pop();
            }
            _ => break,
        }
    }
    result
}

fn has_repeated_points(contour: &[Point2<f64>]) -> bool {
    for (i, p) in contour.iter().enumerate() {
        if contour[i + 1..].iter().any(|q| q == p) {
            return true;
        }
    }
    false
}

fn orientation(a: &Point2<f64>, b: &Point2<f64>, c: &Point2<f64>) -> f64 {
    (b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x)
}

fn on_segment(a: &Point2<f64>, b: &Point2<f64>, p: &Point2<f64>) -> bool {
    p.x >= a.x.min(b.x) && p.x <= a.x.max(b.x) && p.y >= a.y.min(b.y) && p.y <= a.y.max(b.y)
}

/// Closed segment intersection test, touching counts as intersecting
fn segments_intersect(a0: &Point2<f64>, a1: &Point2<f64>, b0: &Point2<f64>, b1: &Point2<f64>) -> bool {
    let d1 = orientation(b0, b1, a0);
    let d2 = orientation(b0, b1, a1);
    let d3 = orientation(a0, a1, b0);
    let d4 = orientation(a0, a1, b1);

    if ((d1 > 0.0 && d2 < 0.0) || (d1 < 0.0 && d2 > 0.0))
        && ((d3 > 0.0 && d4 < 0.0) || (d3 < 0.0 && d4 > 0.0))
    {
        return true;
    }

    (d1 == 0.0 && on_segment(b0, b1, a0))
        || (d2 == 0.0 && on_segment(b0, b1, a1))
        || (d3 == 0.0 && on_segment(a0, a1, b0))
        || (d4 == 0.0 && on_segment(a0, a1, b1))
}

// ============================================================================
// Internal Helper Functions
// ============================================================================

/// Convert a Point2 contour to i_overlay path format
fn contour_to_path(contour: &[Point2<f64>]) -> Vec<[f64; 2]> {
    contour.iter().map(|p| [p.x, p.y]).collect()
}

/// Convert i_overlay result shapes back to polygons
///
/// i_overlay returns Vec<Vec<Vec<[f64; 2]>>> where:
/// - Outer Vec: list of shapes
/// - Middle Vec: list of contours per shape (first is outer, rest are holes)
/// - Inner Vec: list of points per contour
fn shapes_to_polygons(shapes: &[Vec<Vec<[f64; 2]>>]) -> Vec<Polygon2D> {
    let to_points = |contour: &Vec<[f64; 2]>| -> Vec<Point2<f64>> {
        contour.iter().map(|p| Point2::new(p[0], p[1])).collect()
    };

    shapes
        .iter()
        .filter_map(|shape| {
            let outer = to_points(shape.first()?);
            if !is_valid_contour(&outer) {
                return None;
            }
            let holes = shape
                .iter()
                .skip(1)
                .map(to_points)
                .filter(|h| is_valid_contour(h))
                .map(|h| ensure_cw(&h))
                .collect();
            Some(Polygon2D::new(ensure_ccw(&outer), holes))
        })
        .collect()
}
