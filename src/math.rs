//! Shared 3D math helpers built on top of `vek`.

use vek::{Mat3, Vec3};

/// Position and orientation of a rigid body or shape, in world space.
///
/// Rotation is kept as an orthonormal 3x3 matrix rather than a quaternion: the solver and
/// integrator both need a matrix (to build the world-space inverse inertia tensor and the
/// half-step/full-step rotation update), so storing one avoids a matrix/quaternion round trip
/// every tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Iso3 {
    /// Translation component.
    pub translation: Vec3<f64>,
    /// Rotation component, expected to always be orthonormal.
    pub rotation: Mat3<f64>,
}

impl Iso3 {
    /// Construct from a translation and a rotation matrix.
    pub fn new(translation: Vec3<f64>, rotation: Mat3<f64>) -> Self {
        Self {
            translation,
            rotation,
        }
    }

    /// Construct at `translation` with identity rotation.
    pub fn from_position(translation: Vec3<f64>) -> Self {
        Self {
            translation,
            rotation: Mat3::identity(),
        }
    }

    /// Identity isometry.
    pub fn identity() -> Self {
        Self {
            translation: Vec3::zero(),
            rotation: Mat3::identity(),
        }
    }

    /// Transform a point from local space into world space.
    pub fn transform_point(&self, point: Vec3<f64>) -> Vec3<f64> {
        self.translation + self.rotation * point
    }

    /// Transform a direction vector from local space into world space, ignoring translation.
    pub fn transform_vector(&self, vector: Vec3<f64>) -> Vec3<f64> {
        self.rotation * vector
    }

    /// Inverse-transform a world-space point into local space.
    pub fn inverse_transform_point(&self, point: Vec3<f64>) -> Vec3<f64> {
        self.rotation.transposed() * (point - self.translation)
    }

    /// Inverse-transform a world-space direction vector into local space.
    pub fn inverse_transform_vector(&self, vector: Vec3<f64>) -> Vec3<f64> {
        self.rotation.transposed() * vector
    }

    /// The isometry's rotation matrix, for building the world-space inverse inertia tensor.
    pub fn rotation_matrix(&self) -> Mat3<f64> {
        self.rotation
    }
}

/// Build the skew-symmetric "cross product matrix" `[v]_x` such that `[v]_x * w == v.cross(w)`.
///
/// Used throughout the contact solver to turn `r x (something)` into a matrix so the effective
/// inverse-mass operator (the "K-matrix") can be assembled as a sum of matrix products.
pub fn cross_matrix(v: Vec3<f64>) -> Mat3<f64> {
    Mat3::new(
        0.0, -v.z, v.y, //
        v.z, 0.0, -v.x, //
        -v.y, v.x, 0.0,
    )
}

/// Re-orthonormalise a rotation matrix that has drifted from numerical integration error.
///
/// Gram-Schmidt on the matrix columns: renormalise the first axis, make the second orthogonal to
/// it, derive the third as their cross product.
pub fn orthonormalize(mat: Mat3<f64>) -> Mat3<f64> {
    let mut x = Vec3::new(mat.cols.x.x, mat.cols.x.y, mat.cols.x.z);
    let mut y = Vec3::new(mat.cols.y.x, mat.cols.y.y, mat.cols.y.z);

    x = x.normalized();
    y -= x * x.dot(y);
    y = y.normalized();
    let z = x.cross(y);

    Mat3::new(
        x.x, y.x, z.x, //
        x.y, y.y, z.y, //
        x.z, y.z, z.z,
    )
}

/// `None` if any component of `v` is NaN or infinite.
pub fn finite_or_none(v: Vec3<f64>) -> Option<Vec3<f64>> {
    if v.x.is_finite() && v.y.is_finite() && v.z.is_finite() {
        Some(v)
    } else {
        None
    }
}
