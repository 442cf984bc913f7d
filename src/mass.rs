//! Deriving mass, inertia, and centre-of-mass offset from a shape and a density.

use vek::{Mat3, Vec3};

use crate::shape::Shape;

/// Mass and inertia derived from a shape at a given density.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MassProperties {
    /// Total mass.
    pub mass: f64,
    /// Inertia tensor about the centre of mass, in the shape's local axes.
    pub inertia: Mat3<f64>,
    /// Offset from the shape's modelling origin to its centre of mass.
    pub center_of_mass: Vec3<f64>,
}

impl MassProperties {
    /// Mass properties of an immovable body: zero mass, zero (i.e. infinite when inverted)
    /// inertia, no offset.
    pub fn static_body() -> Self {
        Self {
            mass: 0.0,
            inertia: Mat3::zero(),
            center_of_mass: Vec3::zero(),
        }
    }

    /// Inverse mass, `0.0` for a static/kinematic (zero-mass) body.
    pub fn inv_mass(&self) -> f64 {
        if self.mass > 0.0 {
            1.0 / self.mass
        } else {
            0.0
        }
    }

    /// Inverse of the inertia tensor, zero matrix for a static body.
    pub fn inv_inertia(&self) -> Mat3<f64> {
        if self.mass > 0.0 {
            self.inertia.inverted()
        } else {
            Mat3::zero()
        }
    }
}

/// Compute mass properties for a shape at the given density.
///
/// Primitive shapes (sphere, box, cylinder) use closed-form inertia tensors. Polytopes,
/// triangles, and compounds fall back to an enclosing-box approximation of the same density and
/// volume: exact Mirtich-style polyhedral integration is not implemented, matching the reduced
/// scope this crate targets for those shape kinds.
pub fn mass_properties(shape: &Shape, density: f64) -> MassProperties {
    match shape {
        Shape::Sphere { radius } => sphere_mass(*radius, density),
        Shape::Box { half_extents } => box_mass(*half_extents, density),
        Shape::Cylinder {
            radius,
            half_height,
        } => cylinder_mass(*radius, *half_height, density),
        Shape::Polytope(_) | Shape::Triangle { .. } | Shape::Compound(_) => {
            let aabb = shape.local_aabb();
            let half_extents = (aabb.max - aabb.min) * 0.5;
            let center_of_mass = (aabb.max + aabb.min) * 0.5;
            let mut props = box_mass(half_extents, density);
            props.center_of_mass = center_of_mass;
            props
        }
    }
}

fn sphere_mass(radius: f64, density: f64) -> MassProperties {
    let volume = (4.0 / 3.0) * std::f64::consts::PI * radius.powi(3);
    let mass = density * volume;
    let i = 0.4 * mass * radius * radius;
    MassProperties {
        mass,
        inertia: Mat3::new(i, 0.0, 0.0, 0.0, i, 0.0, 0.0, 0.0, i),
        center_of_mass: Vec3::zero(),
    }
}

fn box_mass(half_extents: Vec3<f64>, density: f64) -> MassProperties {
    let size = half_extents * 2.0;
    let volume = size.x * size.y * size.z;
    let mass = density * volume;
    let r = half_extents;
    // Standard box inertia about its centre: I_xx = (1/3) m (r_y^2 + r_z^2), etc., matching the
    // closed-form moment-of-inertia formulas used for box primitives.
    let ixx = (1.0 / 3.0) * mass * (r.y * r.y + r.z * r.z);
    let iyy = (1.0 / 3.0) * mass * (r.x * r.x + r.z * r.z);
    let izz = (1.0 / 3.0) * mass * (r.x * r.x + r.y * r.y);
    MassProperties {
        mass,
        inertia: Mat3::new(ixx, 0.0, 0.0, 0.0, iyy, 0.0, 0.0, 0.0, izz),
        center_of_mass: Vec3::zero(),
    }
}

fn cylinder_mass(radius: f64, half_height: f64, density: f64) -> MassProperties {
    let height = half_height * 2.0;
    let volume = std::f64::consts::PI * radius * radius * height;
    let mass = density * volume;
    // Axis along local Y.
    let i_axis = 0.5 * mass * radius * radius;
    let i_radial = (1.0 / 12.0) * mass * (3.0 * radius * radius + height * height);
    MassProperties {
        mass,
        inertia: Mat3::new(
            i_radial, 0.0, 0.0, //
            0.0, i_axis, 0.0, //
            0.0, 0.0, i_radial,
        ),
        center_of_mass: Vec3::zero(),
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn sphere_mass_matches_volume_formula() {
        let props = sphere_mass(1.0, 1.0);
        assert_relative_eq!(props.mass, (4.0 / 3.0) * std::f64::consts::PI, epsilon = 1e-9);
    }

    #[test]
    fn static_body_has_zero_inverse_mass() {
        let props = MassProperties::static_body();
        assert_eq!(props.inv_mass(), 0.0);
    }

    #[test]
    fn box_inertia_is_diagonal_and_positive() {
        let props = box_mass(Vec3::new(1.0, 2.0, 3.0), 1.0);
        assert!(props.inertia.cols.x.x > 0.0);
        assert!(props.inertia.cols.y.y > 0.0);
        assert!(props.inertia.cols.z.z > 0.0);
    }
}
