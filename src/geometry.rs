// Copyright 2026 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! Small geometric helpers shared by the scatterer and the link optimizer.

use std::f64::consts::PI;

use nalgebra::{Matrix4, Point2, Point3, Vector2, Vector3};
use rand::Rng;
use rand::rngs::StdRng;

/// Separation vectors shorter than this are treated as coincident bodies.
pub const MIN_SEPARATION_SQUARED: f64 = 1e-12;

/// Sine of the angle between two segments below which they count as
/// parallel.
const PARALLEL_EPSILON: f64 = 1e-10;

/// Extent of an axis-aligned box with half extents `half` along the unit
/// direction `dir`.
pub fn support_extent(half: &Vector3<f64>, dir: &Vector3<f64>) -> f64 {
    (half.x * dir.x).abs() + (half.y * dir.y).abs() + (half.z * dir.z).abs()
}

/// Distance two boxes' centres must keep along `dir` so the boxes do not
/// overlap, plus `margin`.
pub fn min_separation(
    half_a: &Vector3<f64>,
    half_b: &Vector3<f64>,
    dir: &Vector3<f64>,
    margin: f64,
) -> f64 {
    support_extent(half_a, dir) + support_extent(half_b, dir) + margin
}

/// Uniformly distributed unit vector; confined to the xy plane when `planar`.
pub fn random_unit_direction(rng: &mut StdRng, planar: bool) -> Vector3<f64> {
    let angle = rng.random::<f64>() * 2.0 * PI;
    if planar {
        return Vector3::new(angle.cos(), angle.sin(), 0.0);
    }
    let z = rng.random::<f64>() * 2.0 - 1.0;
    let r = (1.0 - z * z).max(0.0).sqrt();
    Vector3::new(r * angle.cos(), r * angle.sin(), z)
}

/// Flatten a world-space point into the 2-D view plane.
pub fn project(projection: &Matrix4<f64>, point: &Point3<f64>) -> Point2<f64> {
    let p = projection.transform_point(point);
    Point2::new(p.x, p.y)
}

fn cross_2d(a: &Vector2<f64>, b: &Vector2<f64>) -> f64 {
    a.x * b.y - a.y * b.x
}

/// A projected connector path.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Segment2 {
    pub start: Point2<f64>,
    pub end: Point2<f64>,
}

impl Segment2 {
    pub fn new(start: Point2<f64>, end: Point2<f64>) -> Self {
        Self { start, end }
    }

    pub fn squared_length(&self) -> f64 {
        (self.end - self.start).norm_squared()
    }

    /// Parameters `(t, u)` of the closest points between the lines through
    /// `self` and `other`, so that `start + t * (end - start)` on each line.
    /// `None` when the lines are parallel or either segment is degenerate.
    pub fn closest_point_params(&self, other: &Segment2) -> Option<(f64, f64)> {
        let d1 = self.end - self.start;
        let d2 = other.end - other.start;

        let denom = cross_2d(&d1, &d2);
        if denom.abs() <= PARALLEL_EPSILON * d1.norm() * d2.norm() {
            return None;
        }

        let w = other.start - self.start;
        let t = cross_2d(&w, &d2) / denom;
        let u = cross_2d(&w, &d1) / denom;
        Some((t, u))
    }

    /// Whether the two segments intersect strictly inside both of them.
    /// Touching at an endpoint or overlapping collinearly is not a crossing.
    pub fn crosses(&self, other: &Segment2) -> bool {
        match self.closest_point_params(other) {
            Some((t, u)) => t > 0.0 && t < 1.0 && u > 0.0 && u < 1.0,
            None => false,
        }
    }
}
