use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};

/// An orthorhombic periodic simulation cell, fully periodic in all three
/// directions (`pp pp pp` in dump-format terms).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PeriodicCell {
    pub lo: Vector3<f64>,
    pub hi: Vector3<f64>,
}

impl PeriodicCell {
    pub fn new(lo: Vector3<f64>, hi: Vector3<f64>) -> Self {
        Self { lo, hi }
    }

    /// A cubic cell with origin at zero.
    pub fn cubic(edge: f64) -> Self {
        Self {
            lo: Vector3::zeros(),
            hi: Vector3::new(edge, edge, edge),
        }
    }

    pub fn lengths(&self) -> Vector3<f64> {
        self.hi - self.lo
    }

    pub fn center(&self) -> Point3<f64> {
        Point3::from((self.lo + self.hi) / 2.0)
    }

    /// Wraps a point back into the primary image.
    pub fn wrap(&self, point: &Point3<f64>) -> Point3<f64> {
        let lengths = self.lengths();
        let mut wrapped = *point;
        for axis in 0..3 {
            let len = lengths[axis];
            if len > 0.0 {
                wrapped[axis] -= len * ((wrapped[axis] - self.lo[axis]) / len).floor();
            }
        }
        wrapped
    }

    /// Applies the minimum-image convention to a displacement vector.
    pub fn min_image(&self, delta: &Vector3<f64>) -> Vector3<f64> {
        let lengths = self.lengths();
        let mut image = *delta;
        for axis in 0..3 {
            let len = lengths[axis];
            if len > 0.0 {
                image[axis] -= len * (image[axis] / len).round();
            }
        }
        image
    }

    /// Minimum-image distance between two points.
    pub fn distance(&self, a: &Point3<f64>, b: &Point3<f64>) -> f64 {
        self.min_image(&(b - a)).norm()
    }
}
