//! Rigid body state, accumulators, and the per-tick integration step.

use std::sync::Arc;

use vek::{Aabb, Mat3, Vec3};

use crate::{
    material::MaterialId,
    mass::MassProperties,
    math::{cross_matrix, finite_or_none, orthonormalize, Iso3},
    shape::Shape,
};

/// How a body participates in simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotionKind {
    /// Infinite mass, never moved by the solver or integrator; may still be repositioned by the
    /// owning application between ticks.
    Static,
    /// Infinite mass for collision purposes but its pose is driven externally (animation,
    /// scripted motion) rather than by accumulated forces.
    Keyframed,
    /// Normal simulated body: finite mass, integrated every tick.
    Dynamic,
}

/// Awake/asleep state used to skip integration and collision response for bodies at rest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SleepState {
    /// Actively integrated and collision-tested.
    Awake,
    /// Frozen in place; woken by an impulse from a still-awake contact or an explicit API call.
    Asleep,
}

/// A single rigid body.
#[derive(Debug, Clone)]
pub struct RigidBody {
    /// World-space pose (centre-of-mass frame).
    pub pose: Iso3,
    /// Linear velocity of the centre of mass.
    pub linear_velocity: Vec3<f64>,
    /// Angular velocity.
    pub angular_velocity: Vec3<f64>,
    /// Accumulated world-space force for this tick; reset to gravity at the start of the next.
    pub force: Vec3<f64>,
    /// Accumulated world-space torque for this tick; reset to zero at the start of the next.
    pub torque: Vec3<f64>,

    mass_properties: MassProperties,
    /// World-space inverse inertia tensor, refreshed every tick from `pose` and the object-space
    /// tensor.
    inv_inertia_world: Mat3<f64>,

    /// Immutable collision geometry.
    pub shape: Arc<Shape>,
    /// Local-space AABB cache copied from `shape` at construction.
    local_aabb: Aabb<f64>,

    /// Static / keyframed / dynamic.
    pub motion_kind: MotionKind,
    /// Awake / asleep.
    pub sleep_state: SleepState,
    /// Surface material used by the contact solver.
    pub material_id: MaterialId,
    /// Broadphase collision group; two bodies in group `0` always collide (no group filtering).
    pub collision_group: u32,
    /// Linear velocity damping applied per unit time (fraction of velocity removed per second).
    pub linear_damping: f64,
    /// Angular velocity damping, same convention as `linear_damping`.
    pub angular_damping: f64,
    /// Opaque payload for the owning application; never read by this crate.
    pub user_data: u128,
}

impl RigidBody {
    /// Build a new body at the given pose.
    pub fn new(shape: Arc<Shape>, pose: Iso3, motion_kind: MotionKind, density: f64) -> Self {
        let mass_properties = match motion_kind {
            MotionKind::Dynamic => crate::mass::mass_properties(&shape, density),
            MotionKind::Static | MotionKind::Keyframed => MassProperties::static_body(),
        };
        let local_aabb = shape.local_aabb();
        let inv_inertia_world = world_inv_inertia(&mass_properties, &pose);

        Self {
            pose,
            linear_velocity: Vec3::zero(),
            angular_velocity: Vec3::zero(),
            force: Vec3::zero(),
            torque: Vec3::zero(),
            mass_properties,
            inv_inertia_world,
            shape,
            local_aabb,
            motion_kind,
            sleep_state: SleepState::Awake,
            material_id: 0,
            collision_group: 0,
            linear_damping: 0.0,
            angular_damping: 0.0,
            user_data: 0,
        }
    }

    /// Build a static (infinite mass) body.
    pub fn fixed(shape: Arc<Shape>, pose: Iso3) -> Self {
        Self::new(shape, pose, MotionKind::Static, 1.0)
    }

    /// Inverse mass; zero for static/keyframed bodies.
    pub fn inv_mass(&self) -> f64 {
        self.mass_properties.inv_mass()
    }

    /// World-space inverse inertia tensor, current as of the last `refresh_derived` call.
    pub fn inv_inertia_world(&self) -> Mat3<f64> {
        self.inv_inertia_world
    }

    /// World-space AABB, transformed from the shape's local bounds by the current pose.
    pub fn world_aabb(&self) -> Aabb<f64> {
        transform_aabb(self.local_aabb, &self.pose)
    }

    /// Radius of a sphere centred on the body that contains its local bounds, for collision
    /// paths (like terrain) that only take a sphere regardless of the body's actual shape.
    pub fn bounding_sphere_radius(&self) -> f64 {
        match self.shape.as_ref() {
            Shape::Sphere { radius } => *radius,
            _ => (self.local_aabb.max - self.local_aabb.min).magnitude() * 0.5,
        }
    }

    /// World-space AABB expanded by the predicted displacement over `dt`, used by the
    /// broadphase so a fast-moving body's endpoints are updated ahead of the narrowphase.
    pub fn predicted_world_aabb(&self, dt: f64) -> Aabb<f64> {
        let aabb = self.world_aabb();
        let delta = self.linear_velocity * dt;
        let min = Vec3::partial_min(aabb.min, aabb.min + delta);
        let max = Vec3::partial_max(aabb.max, aabb.max + delta);
        Aabb { min, max }
    }

    /// Apply a world-space force at the centre of mass, accumulated until the next integration.
    pub fn apply_world_force(&mut self, force: Vec3<f64>) {
        self.force += force;
    }

    /// Apply a world-space torque, accumulated until the next integration.
    pub fn apply_world_torque(&mut self, torque: Vec3<f64>) {
        self.torque += torque;
    }

    /// Apply a world-space force at a world-space point, contributing both force and the torque
    /// it induces about the centre of mass.
    pub fn apply_world_force_at(&mut self, force: Vec3<f64>, at: Vec3<f64>) {
        self.force += force;
        self.torque += (at - self.pose.translation).cross(force);
    }

    /// Apply a collision impulse at a world-space point.
    ///
    /// Before accumulating, cancels any opposing component already present in the force/torque
    /// accumulator, matching the "collision impulse" application used by the solver: a contact
    /// impulse should not be partially undone by an opposing impulse queued earlier in the same
    /// tick (e.g. from a different contact on the same body).
    pub fn apply_world_collision_impulse_at(&mut self, impulse: Vec3<f64>, at: Vec3<f64>) {
        cancel_opposing(&mut self.force, impulse);
        self.force += impulse;

        let torque = (at - self.pose.translation).cross(impulse);
        cancel_opposing(&mut self.torque, torque);
        self.torque += torque;
    }

    /// Directly set the pose, bypassing integration. Used by callers repositioning a body
    /// between ticks (teleport, keyframed animation).
    pub fn set_pose(&mut self, pose: Iso3) {
        self.pose = pose;
        self.refresh_derived();
    }

    /// Directly set linear velocity.
    pub fn set_linear_velocity(&mut self, v: Vec3<f64>) {
        self.linear_velocity = v;
    }

    /// Directly set angular velocity.
    pub fn set_angular_velocity(&mut self, w: Vec3<f64>) {
        self.angular_velocity = w;
    }

    /// Recompute the world-space inverse inertia tensor from the current pose. Must be called
    /// any time `pose` changes outside of `step`.
    pub fn refresh_derived(&mut self) {
        self.inv_inertia_world = world_inv_inertia(&self.mass_properties, &self.pose);
    }

    /// Reset the per-tick accumulators to the constant contribution of gravity, ready for the
    /// next `step`. Called by the engine once per tick before user code applies forces.
    pub fn reset_accumulators(&mut self, gravity_force: Vec3<f64>) {
        self.force = gravity_force;
        self.torque = Vec3::zero();
    }

    /// Push the body's position directly by `delta`, without touching velocity, and report the
    /// gravitational potential energy this displacement added (positive if the push worked
    /// against gravity). Used by the solver's positional correction pass.
    ///
    /// Per the resolved energy-draining behaviour: the fraction of kinetic energy equal to the
    /// energy added by the push is removed from the body's linear velocity, so positional
    /// correction does not inject energy into a resting stack.
    pub fn push_out(&mut self, delta: Vec3<f64>, gravity: Vec3<f64>) {
        self.pose.translation += delta;
        self.refresh_derived();

        if self.mass_properties.mass <= 0.0 {
            return;
        }

        let energy_added = -delta.dot(gravity) * self.mass_properties.mass;
        if energy_added <= 0.0 {
            return;
        }

        let vel_sq = self.linear_velocity.magnitude_squared();
        if vel_sq <= 1e-12 {
            return;
        }
        let kinetic = 0.5 * self.mass_properties.mass * vel_sq;
        let dvel_sq = (energy_added / (0.5 * self.mass_properties.mass)).min(vel_sq);
        let scale = 1.0 - (dvel_sq / vel_sq).max(0.0).sqrt();
        let _ = kinetic;
        self.linear_velocity *= scale.max(0.0);
    }

    /// Whether this body's pose/velocity currently contains NaN or infinite values.
    pub fn is_degenerate(&self) -> bool {
        finite_or_none(self.pose.translation).is_none()
            || finite_or_none(self.linear_velocity).is_none()
            || finite_or_none(self.angular_velocity).is_none()
    }

    /// Advance the body one tick of `dt` seconds using second-order (midpoint) angular
    /// integration and explicit linear integration.
    ///
    /// If the body is found to be in a degenerate (NaN/infinite) state at entry, it is put to
    /// sleep with zeroed velocities and integration is skipped for this tick; the caller is
    /// expected to log this condition.
    pub fn step(&mut self, dt: f64) {
        if self.motion_kind != MotionKind::Dynamic || self.sleep_state == SleepState::Asleep {
            return;
        }

        if self.is_degenerate() {
            self.sleep_state = SleepState::Asleep;
            self.linear_velocity = Vec3::zero();
            self.angular_velocity = Vec3::zero();
            return;
        }

        let inv_mass = self.mass_properties.inv_mass();

        // Linear: a = F/m, v += a*dt, pos += v*dt + 0.5*dt^2*a.
        let accel = self.force * inv_mass;
        self.linear_velocity += accel * dt
            - self.linear_velocity * (self.linear_damping * dt).min(1.0);
        self.pose.translation += self.linear_velocity * dt + accel * (0.5 * dt * dt);

        self.step_angular_order2(dt);

        self.angular_velocity -= self.angular_velocity * (self.angular_damping * dt).min(1.0);

        self.refresh_derived();
    }

    /// Second-order (midpoint) angular integrator.
    ///
    /// Advances angular momentum by the accumulated torque, derives angular velocity at the
    /// half-step from the half-step world inertia tensor, then applies the *midpoint* angular
    /// velocity over the *full* step to the *original* orientation.
    fn step_angular_order2(&mut self, dt: f64) {
        let inv_inertia_obj = self.mass_properties.inv_inertia();
        let half_dt = 0.5 * dt;

        let mut angular_momentum = {
            let inertia_obj = self.mass_properties.inertia;
            let local_w = self.pose.inverse_transform_vector(self.angular_velocity);
            inertia_obj * local_w
        };
        let local_torque = self.pose.inverse_transform_vector(self.torque);
        angular_momentum += local_torque * dt;

        let rot0 = self.pose.rotation_matrix();
        let ang_vel0 = rot0 * (inv_inertia_obj * angular_momentum);

        // Half-step rotation matrix: R += half_dt * [w]_x * R.
        let half_step_rot = rot0 + cross_matrix(ang_vel0) * rot0 * half_dt;
        let half_step_rot = orthonormalize(half_step_rot);

        let half_step_inv_inertia_world =
            half_step_rot * inv_inertia_obj * half_step_rot.transposed();
        let mid_ang_vel = half_step_inv_inertia_world * (rot0 * angular_momentum);

        // Full step using the midpoint angular velocity applied to the original orientation.
        let full_step_rot = rot0 + cross_matrix(mid_ang_vel) * rot0 * dt;
        let full_step_rot = orthonormalize(full_step_rot);

        self.pose.rotation = full_step_rot;
        self.angular_velocity = mid_ang_vel;
    }

    /// Kinetic + potential energy of this body, for the energy-bound testable property.
    pub fn energy(&self, gravity: Vec3<f64>) -> f64 {
        let linear = 0.5 * self.mass_properties.mass * self.linear_velocity.magnitude_squared();
        let local_w = self.pose.inverse_transform_vector(self.angular_velocity);
        let angular = 0.5 * local_w.dot(self.mass_properties.inertia * local_w);
        let potential = -self.mass_properties.mass * gravity.dot(self.pose.translation);
        linear + angular + potential
    }
}

fn world_inv_inertia(mass_properties: &MassProperties, pose: &Iso3) -> Mat3<f64> {
    let r = pose.rotation_matrix();
    r * mass_properties.inv_inertia() * r.transposed()
}

fn transform_aabb(local: Aabb<f64>, pose: &Iso3) -> Aabb<f64> {
    let corners = [
        Vec3::new(local.min.x, local.min.y, local.min.z),
        Vec3::new(local.min.x, local.min.y, local.max.z),
        Vec3::new(local.min.x, local.max.y, local.min.z),
        Vec3::new(local.min.x, local.max.y, local.max.z),
        Vec3::new(local.max.x, local.min.y, local.min.z),
        Vec3::new(local.max.x, local.min.y, local.max.z),
        Vec3::new(local.max.x, local.max.y, local.min.z),
        Vec3::new(local.max.x, local.max.y, local.max.z),
    ];

    let mut min = Vec3::broadcast(f64::INFINITY);
    let mut max = Vec3::broadcast(f64::NEG_INFINITY);
    for c in corners {
        let p = pose.transform_point(c);
        min = Vec3::partial_min(min, p);
        max = Vec3::partial_max(max, p);
    }
    Aabb { min, max }
}

/// Subtract from `accumulator` any component of itself that opposes `addition`, so that adding
/// `addition` afterwards never partially cancels a previously-accumulated impulse in the same
/// tick.
fn cancel_opposing(accumulator: &mut Vec3<f64>, addition: Vec3<f64>) {
    let len_sq = addition.magnitude_squared();
    if len_sq <= 1e-18 {
        return;
    }
    let inward = accumulator.dot(addition);
    if inward < 0.0 {
        *accumulator -= addition * (inward / len_sq);
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    fn unit_sphere_dynamic() -> RigidBody {
        RigidBody::new(Shape::sphere(1.0), Iso3::identity(), MotionKind::Dynamic, 1.0)
    }

    #[test]
    fn static_body_has_zero_inverse_mass() {
        let body = RigidBody::fixed(Shape::cuboid(Vec3::one()), Iso3::identity());
        assert_eq!(body.inv_mass(), 0.0);
    }

    #[test]
    fn free_fall_one_tick_matches_kinematics() {
        let mut body = unit_sphere_dynamic();
        let gravity = Vec3::new(0.0, -9.81, 0.0);
        body.reset_accumulators(gravity * body.mass_properties.mass);
        body.step(1.0 / 60.0);

        let expected_v = gravity.y * (1.0 / 60.0);
        assert_relative_eq!(body.linear_velocity.y, expected_v, epsilon = 1e-9);
    }

    #[test]
    fn cancel_opposing_zeroes_out_exact_opposite() {
        let mut acc = Vec3::new(1.0, 0.0, 0.0);
        cancel_opposing(&mut acc, Vec3::new(-1.0, 0.0, 0.0));
        assert_relative_eq!(acc.x, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn degenerate_state_is_detected() {
        let mut body = unit_sphere_dynamic();
        body.linear_velocity = Vec3::new(f64::NAN, 0.0, 0.0);
        assert!(body.is_degenerate());
        body.step(1.0 / 60.0);
        assert_eq!(body.sleep_state, SleepState::Asleep);
    }
}
