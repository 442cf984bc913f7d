//! Impulse-based contact solver: relative-velocity resolution with a friction cone, plus
//! positional push-out for resting contacts.

use vek::{Mat3, Vec3};

use crate::{
    body::RigidBody,
    material::{Material, MaterialTable},
    math::cross_matrix,
    narrowphase::ContactManifold,
};

/// Tunables the solver needs that are not per-body or per-material.
#[derive(Debug, Clone, Copy)]
pub struct SolverParams {
    /// Relative speed along the contact normal below which resting-contact decay of restitution
    /// and tangential elasticity kicks in.
    pub max_resting_speed: f64,
    /// Maximum distance a single tick's push-out may move a body.
    pub max_push_out_distance: f64,
    /// Current world gravity, used by push-out's energy-draining velocity correction.
    pub gravity: Vec3<f64>,
}

impl Default for SolverParams {
    fn default() -> Self {
        Self {
            max_resting_speed: 0.01,
            max_push_out_distance: 0.001,
            gravity: Vec3::new(0.0, -9.81, 0.0),
        }
    }
}

/// Effective inverse-mass operator ("K-matrix") contribution of one body at a contact point:
/// `inv_mass * I - [r]_x * inv_inertia_world * [r]_x`, where `r` is the point relative to the
/// body's centre of mass.
fn k_matrix_contribution(body: &RigidBody, world_point: Vec3<f64>) -> Mat3<f64> {
    if body.inv_mass() == 0.0 {
        return Mat3::zero();
    }
    let r = world_point - body.pose.translation;
    let rx = cross_matrix(r);
    Mat3::<f64>::identity() * body.inv_mass() - rx * body.inv_inertia_world() * rx
}

fn velocity_at_point(body: &RigidBody, world_point: Vec3<f64>) -> Vec3<f64> {
    let r = world_point - body.pose.translation;
    body.linear_velocity + body.angular_velocity.cross(r)
}

/// Resolve one contact point between `a` and `b`, applying impulses to both and returning the
/// push-out distance each should receive along the normal (A negative, B positive) if the
/// contact classifies as resting.
pub fn resolve_contact(
    a: &mut RigidBody,
    b: &mut RigidBody,
    manifold: &ContactManifold,
    point_index: usize,
    materials: &dyn MaterialTable,
    params: &SolverParams,
    dt: f64,
) {
    let point = manifold.points[point_index];
    let normal = manifold.normal;

    let world_a = a.pose.transform_point(point.local_point_a);
    let world_b = b.pose.transform_point(point.local_point_b);
    let contact_point = 0.5 * (world_a + world_b);

    let mat_a = materials.material(manifold.material_a).copied_or_default();
    let mat_b = materials.material(manifold.material_b).copied_or_default();

    let rel_velocity = velocity_at_point(b, contact_point) - velocity_at_point(a, contact_point);
    let rel_normal_speed = rel_velocity.dot(normal);

    // Separating already; nothing to resolve beyond (possibly) push-out below.
    if rel_normal_speed > 0.0 {
        maybe_push_out(a, b, normal, point.depth, params, true);
        return;
    }

    let tangent_velocity = rel_velocity - normal * rel_normal_speed;
    let tangent_speed = tangent_velocity.magnitude();
    let tangent = if tangent_speed > 1e-9 {
        tangent_velocity / tangent_speed
    } else {
        Vec3::zero()
    };

    let k = k_matrix_contribution(a, contact_point) + k_matrix_contribution(b, contact_point);

    let mut elasticity_n = mat_a.elasticity.min(mat_b.elasticity);
    let mut elasticity_t = mat_a.tangential_elasticity.min(mat_b.tangential_elasticity);
    let static_friction = mat_a.static_friction.max(mat_b.static_friction);
    let dynamic_friction = mat_a.dynamic_friction.max(mat_b.dynamic_friction);

    let resting = rel_normal_speed.abs() < params.max_resting_speed;
    if resting {
        // Linear blend towards zero restitution/tangential-elasticity as the normal speed
        // approaches the resting threshold from below.
        elasticity_n = 1.0 - (elasticity_n - 1.0) * rel_normal_speed / params.max_resting_speed;
        if tangent_speed < params.max_resting_speed {
            elasticity_t =
                -1.0 + (elasticity_t + 1.0) * tangent_speed / params.max_resting_speed;
        }
    }

    let k_normal = normal.dot(k * normal);
    if k_normal <= 1e-12 {
        return;
    }

    let pi = -(rel_normal_speed / k_normal) * normal;
    let pii = -(k.inverted() * rel_velocity);
    let p_diff = pii - pi;

    let mut impulse = pi * (1.0 + elasticity_n) + p_diff * (1.0 + elasticity_t);

    let impulse_n = impulse.dot(normal);
    let impulse_t_vec = impulse - normal * impulse_n;
    let impulse_t = impulse_t_vec.magnitude();

    if impulse_t > static_friction * impulse_n.max(0.0) {
        let denom = p_diff.dot(tangent).abs() - dynamic_friction * p_diff.dot(normal);
        if denom.abs() > 1e-12 {
            let kappa =
                dynamic_friction * (1.0 + elasticity_n) * normal.dot(pi) / denom;
            impulse = pi * (1.0 + elasticity_n) + p_diff * kappa;
        }
    }

    let inv_dt = if dt > 1e-9 { 1.0 / dt } else { 0.0 };
    a.apply_world_collision_impulse_at(-impulse * inv_dt, contact_point);
    b.apply_world_collision_impulse_at(impulse * inv_dt, contact_point);

    maybe_push_out(a, b, normal, point.depth, params, resting);
}

fn maybe_push_out(
    a: &mut RigidBody,
    b: &mut RigidBody,
    normal: Vec3<f64>,
    depth: f64,
    params: &SolverParams,
    resting: bool,
) {
    if !resting || depth <= 0.0 {
        return;
    }
    let dist = depth.min(params.max_push_out_distance);

    let mass_a = if a.inv_mass() > 0.0 { 1.0 / a.inv_mass() } else { 0.0 };
    let mass_b = if b.inv_mass() > 0.0 { 1.0 / b.inv_mass() } else { 0.0 };

    let (frac_a, frac_b) = match (a.inv_mass() > 0.0, b.inv_mass() > 0.0) {
        (false, _) => (0.0, 1.0),
        (_, false) => (1.0, 0.0),
        (true, true) => {
            let total = mass_a + mass_b;
            (mass_b / total, mass_a / total)
        }
    };

    a.push_out(-normal * (dist * frac_a), params.gravity);
    b.push_out(normal * (dist * frac_b), params.gravity);
}

/// Small helper so a missing material id degrades to the default rather than panicking the
/// solver mid-tick.
trait MaterialLookupExt {
    fn copied_or_default(self) -> Material;
}

impl MaterialLookupExt for Option<&Material> {
    fn copied_or_default(self) -> Material {
        self.copied().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        body::MotionKind,
        material::SliceMaterialTable,
        math::Iso3,
        shape::Shape,
    };

    use super::*;

    #[test]
    fn resting_contact_does_not_gain_energy() {
        let mut a = RigidBody::new(
            Shape::sphere(1.0),
            Iso3::from_position(Vec3::new(0.0, 1.0, 0.0)),
            MotionKind::Dynamic,
            1.0,
        );
        let mut b = RigidBody::fixed(
            Shape::cuboid(Vec3::new(10.0, 1.0, 10.0)),
            Iso3::from_position(Vec3::new(0.0, -1.0, 0.0)),
        );

        let manifold = crate::narrowphase::collide(&a, &b).expect("touching");
        let materials = SliceMaterialTable::default();
        let params = SolverParams::default();

        let energy_before = a.energy(params.gravity);
        resolve_contact(&mut a, &mut b, &manifold, 0, &materials, &params, 1.0 / 60.0);
        let energy_after = a.energy(params.gravity);

        assert!(energy_after <= energy_before + 1e-6);
    }
}
