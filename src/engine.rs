//! Body registry, external-collaborator traits, and the per-tick step loop.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use slotmap::SlotMap;
use smallvec::SmallVec;
use vek::Vec3;

use crate::{
    body::{MotionKind, RigidBody, SleepState},
    broadphase::Broadphase,
    error::{PhysicsError, Result},
    material::{MaterialTable, SliceMaterialTable},
    narrowphase::{self, ContactManifold},
    solver::{self, SolverParams},
};

slotmap::new_key_type! {
    /// Stable, generation-checked handle to a registered body.
    ///
    /// Distinct from the dense `u32` index the broadphase/overlap-table use internally: a
    /// removed body's slot can be reused by a later registration without callers who still hold
    /// the old handle silently addressing the wrong body.
    pub struct BodyHandle;
}

/// World gravity, sampled once per tick from a pluggable field rather than hard-coded.
pub trait GravityField {
    /// Acceleration due to gravity at `position`.
    fn gravity_at(&self, position: Vec3<f64>) -> Vec3<f64>;
}

/// Uniform gravity, sufficient for every scenario this crate targets.
#[derive(Debug, Clone, Copy)]
pub struct ConstantGravity(pub Vec3<f64>);

impl GravityField for ConstantGravity {
    fn gravity_at(&self, _position: Vec3<f64>) -> Vec3<f64> {
        self.0
    }
}

/// A contact reported by a terrain collider external to this crate's body set.
#[derive(Debug, Clone, Copy)]
pub struct TerrainContact {
    /// World-space contact point.
    pub point: Vec3<f64>,
    /// World-space outward normal.
    pub normal: Vec3<f64>,
    /// Penetration depth.
    pub depth: f64,
}

/// Static terrain collision, consumed as an interface so this crate need not depend on a terrain
/// data format or heightfield crate.
pub trait TerrainCollider {
    /// Test a sphere (the shape every dynamic body is conservatively tested against for terrain
    /// purposes) against the terrain, returning a contact if penetrating.
    fn collide_sphere(&self, centre: Vec3<f64>, radius: f64) -> Option<TerrainContact>;
}

/// Terrain collider that never reports a contact, for scenes without terrain.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoTerrain;

impl TerrainCollider for NoTerrain {
    fn collide_sphere(&self, _centre: Vec3<f64>, _radius: f64) -> Option<TerrainContact> {
        None
    }
}

/// Called before a contact is resolved; returning `false` cancels the contact entirely for this
/// tick (no impulse, no push-out).
pub trait PreCollisionObserver {
    /// Inspect the about-to-be-resolved manifold. Return `false` to skip it this tick.
    fn on_pre_collision(&mut self, a: BodyHandle, b: BodyHandle, manifold: &ContactManifold) -> bool;
}

/// Called after a contact has been resolved, for gameplay/audio/particle hookups.
pub trait PostCollisionObserver {
    /// Inspect a manifold that was just resolved.
    fn on_post_collision(&mut self, a: BodyHandle, b: BodyHandle, manifold: &ContactManifold);
}

/// Engine configuration, serde-friendly so an embedding application can hot-reload it from
/// whatever configuration format it likes (loading it from disk is outside this crate's scope).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineSettings {
    /// Fixed timestep target, seconds.
    pub time_step: f64,
    /// Uniform gravity acceleration, used when no custom [`GravityField`] is supplied.
    pub gravity: Vec3<f64>,
    /// Maximum number of simultaneously live dynamic bodies the broadphase is sized for.
    pub collision_capacity: usize,
    /// Relative speed along the contact normal below which resting-contact decay kicks in.
    pub max_resting_speed: f64,
    /// Maximum distance a single tick's positional push-out may move a body.
    pub max_push_out_distance: f64,
    /// Consecutive below-threshold ticks before an otherwise-idle body is put to sleep.
    pub sleep_ticks_threshold: u32,
    /// Speed (linear or angular, whichever is larger in its own units) below which a body counts
    /// as idle for sleep-threshold purposes.
    pub sleep_speed_threshold: f64,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            time_step: 1.0 / 120.0,
            gravity: Vec3::new(0.0, -9.81, 0.0),
            collision_capacity: 1024,
            max_resting_speed: 0.01,
            max_push_out_distance: 0.001,
            sleep_ticks_threshold: 30,
            sleep_speed_threshold: 0.01,
        }
    }
}

impl EngineSettings {
    fn validate(&self) -> Result<()> {
        if !(self.time_step > 0.0) {
            return Err(PhysicsError::Configuration {
                field: "time_step",
                reason: "must be positive".into(),
            });
        }
        if self.collision_capacity == 0 {
            return Err(PhysicsError::Configuration {
                field: "collision_capacity",
                reason: "must be at least 1".into(),
            });
        }
        if self.max_resting_speed < 0.0 {
            return Err(PhysicsError::Configuration {
                field: "max_resting_speed",
                reason: "must be non-negative".into(),
            });
        }
        Ok(())
    }
}

struct BodySlot {
    body: RigidBody,
    dense_index: u32,
    idle_ticks: u32,
}

/// Owns the set of registered bodies and drives broadphase, narrowphase, the solver, and
/// integration forward one fixed timestep at a time.
pub struct Engine {
    settings: EngineSettings,
    bodies: SlotMap<BodyHandle, BodySlot>,
    dense_to_handle: Vec<Option<BodyHandle>>,
    free_dense: Vec<u32>,
    broadphase: Broadphase,
    manifolds: HashMap<(BodyHandle, BodyHandle), ContactManifold>,
    materials: Box<dyn MaterialTable>,
    pub pre_collision: Option<Box<dyn PreCollisionObserver>>,
    pub post_collision: Option<Box<dyn PostCollisionObserver>>,
}

impl Engine {
    /// Build a new engine. Fails if `settings` contains an invalid value.
    pub fn new(settings: EngineSettings) -> Result<Self> {
        settings.validate()?;
        let capacity = settings.collision_capacity;
        Ok(Self {
            settings,
            bodies: SlotMap::with_key(),
            dense_to_handle: Vec::with_capacity(capacity),
            free_dense: Vec::new(),
            broadphase: Broadphase::new(capacity),
            manifolds: HashMap::new(),
            materials: Box::new(SliceMaterialTable::default()),
            pre_collision: None,
            post_collision: None,
        })
    }

    /// Replace the material table used to resolve [`crate::material::MaterialId`]s during
    /// solving.
    pub fn set_material_table(&mut self, table: impl MaterialTable + 'static) {
        self.materials = Box::new(table);
    }

    /// Register a body, returning its stable handle.
    pub fn add_body(&mut self, body: RigidBody) -> Result<BodyHandle> {
        let dense_index = if let Some(i) = self.free_dense.pop() {
            i
        } else {
            let i = self.dense_to_handle.len() as u32;
            if i as usize >= self.settings.collision_capacity {
                return Err(PhysicsError::CapacityExhausted {
                    capacity: self.settings.collision_capacity,
                });
            }
            self.dense_to_handle.push(None);
            i
        };

        let aabb = body.world_aabb();
        let handle = self.bodies.insert(BodySlot {
            body,
            dense_index,
            idle_ticks: 0,
        });
        self.dense_to_handle[dense_index as usize] = Some(handle);
        self.broadphase.add_body(dense_index, aabb);

        Ok(handle)
    }

    /// Deregister a body.
    pub fn remove_body(&mut self, handle: BodyHandle) -> Result<()> {
        let slot = self.bodies.remove(handle).ok_or(PhysicsError::UnknownBody)?;
        self.dense_to_handle[slot.dense_index as usize] = None;
        self.free_dense.push(slot.dense_index);

        let live = self.dense_to_handle.iter().enumerate().filter_map(|(i, h)| {
            h.map(|_| i as u32)
        });
        self.broadphase.remove_body(slot.dense_index, live);

        self.manifolds.retain(|&(a, b), _| a != handle && b != handle);

        Ok(())
    }

    /// Borrow a registered body.
    pub fn body(&self, handle: BodyHandle) -> Option<&RigidBody> {
        self.bodies.get(handle).map(|s| &s.body)
    }

    /// Mutably borrow a registered body. Callers changing `pose` directly must call
    /// [`RigidBody::refresh_derived`] themselves, or use [`RigidBody::set_pose`].
    pub fn body_mut(&mut self, handle: BodyHandle) -> Option<&mut RigidBody> {
        self.bodies.get_mut(handle).map(|s| &mut s.body)
    }

    /// Number of currently registered bodies.
    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    /// Debug-only bijection check between the broadphase's active-pair list and its overlap
    /// table, forwarded for integration tests that drive the engine as a black box.
    #[cfg(debug_assertions)]
    pub fn verify_broadphase(&self) {
        self.broadphase.verify();
    }

    /// Advance the simulation by one `settings.time_step`.
    pub fn step(&mut self, gravity_field: &dyn GravityField, terrain: &dyn TerrainCollider) {
        let dt = self.settings.time_step;

        for (_, slot) in self.bodies.iter_mut() {
            if slot.body.motion_kind != MotionKind::Dynamic {
                continue;
            }
            let gravity = gravity_field.gravity_at(slot.body.pose.translation);
            let gravity_force = gravity * mass_of(&slot.body);
            slot.body.reset_accumulators(gravity_force);
        }

        self.update_broadphase(dt);

        self.manifolds.clear();
        for &(da, db) in self.broadphase.active_pairs() {
            let (ha, hb) = match (self.dense_to_handle[da as usize], self.dense_to_handle[db as usize]) {
                (Some(a), Some(b)) => (a, b),
                _ => continue,
            };

            let manifold = {
                let a = &self.bodies[ha].body;
                let b = &self.bodies[hb].body;
                if a.motion_kind != MotionKind::Dynamic && b.motion_kind != MotionKind::Dynamic {
                    continue;
                }
                narrowphase::collide(a, b)
            };

            if let Some(manifold) = manifold {
                if let Some(observer) = self.pre_collision.as_mut() {
                    if !observer.on_pre_collision(ha, hb, &manifold) {
                        continue;
                    }
                }
                self.manifolds.insert((ha, hb), manifold);
            }
        }

        self.resolve_terrain(terrain);
        self.resolve_contacts(dt);

        for (_, slot) in self.bodies.iter_mut() {
            if slot.body.is_degenerate() {
                log::error!("body produced a NaN/infinite state; forcing asleep");
                slot.body.sleep_state = SleepState::Asleep;
                slot.body.linear_velocity = Vec3::zero();
                slot.body.angular_velocity = Vec3::zero();
                continue;
            }
            slot.body.step(dt);
            update_sleep(slot, &self.settings);
        }
    }

    fn update_broadphase(&mut self, dt: f64) {
        for (handle, slot) in self.bodies.iter() {
            if slot.body.motion_kind == MotionKind::Dynamic
                && slot.body.sleep_state == SleepState::Asleep
            {
                continue;
            }
            let aabb = slot.body.predicted_world_aabb(dt);
            self.broadphase.update_body(slot.dense_index, aabb);
            let _ = handle;
        }
    }

    fn resolve_terrain(&mut self, terrain: &dyn TerrainCollider) {
        for (_, slot) in self.bodies.iter_mut() {
            if slot.body.motion_kind != MotionKind::Dynamic {
                continue;
            }
            let radius = slot.body.bounding_sphere_radius();
            if let Some(contact) = terrain.collide_sphere(slot.body.pose.translation, radius) {
                // Treat terrain as an infinite-mass counterpart: push the body out along the
                // terrain normal and kill the inward velocity component directly, since there
                // is no second RigidBody to run through the full contact solver with.
                let inward = slot.body.linear_velocity.dot(contact.normal);
                if inward < 0.0 {
                    slot.body.linear_velocity -= contact.normal * inward;
                }
                slot.body
                    .push_out(contact.normal * contact.depth, self.settings.gravity);
            }
        }
    }

    fn resolve_contacts(&mut self, dt: f64) {
        let params = SolverParams {
            max_resting_speed: self.settings.max_resting_speed,
            max_push_out_distance: self.settings.max_push_out_distance,
            gravity: self.settings.gravity,
        };

        // Most ticks only have a handful of simultaneously resolving contacts, so a couple of
        // them live inline rather than spilling to the heap.
        let pairs: SmallVec<[(BodyHandle, BodyHandle); 8]> =
            self.manifolds.keys().copied().collect();
        for (ha, hb) in pairs {
            let manifold = match self.manifolds.get(&(ha, hb)) {
                Some(m) => m.clone(),
                None => continue,
            };

            let point_count = manifold.points.len();
            for i in 0..point_count {
                let (a, b) = match self.two_bodies_mut(ha, hb) {
                    Some(pair) => pair,
                    None => break,
                };
                solver::resolve_contact(
                    &mut a.body,
                    &mut b.body,
                    &manifold,
                    i,
                    self.materials.as_ref(),
                    &params,
                    dt,
                );
            }

            if let Some(observer) = self.post_collision.as_mut() {
                observer.on_post_collision(ha, hb, &manifold);
            }
        }
    }

    /// Borrow two distinct bodies mutably at once.
    ///
    /// `SlotMap` has no safe disjoint-pair accessor, so this splits the borrow via a raw
    /// pointer; sound because `a != b` is guaranteed by the caller (manifold pairs always key
    /// two distinct dense indices) and `SlotMap::get_mut` never aliases storage between
    /// different live keys.
    fn two_bodies_mut(&mut self, a: BodyHandle, b: BodyHandle) -> Option<(&mut BodySlot, &mut BodySlot)> {
        debug_assert_ne!(a, b);
        let map_ptr = &mut self.bodies as *mut SlotMap<BodyHandle, BodySlot>;
        unsafe {
            let slot_a = (*map_ptr).get_mut(a)? as *mut BodySlot;
            let slot_b = (*map_ptr).get_mut(b)?;
            Some((&mut *slot_a, slot_b))
        }
    }
}

fn mass_of(body: &RigidBody) -> f64 {
    if body.inv_mass() > 0.0 {
        1.0 / body.inv_mass()
    } else {
        0.0
    }
}

fn update_sleep(slot: &mut BodySlot, settings: &EngineSettings) {
    if slot.body.motion_kind != MotionKind::Dynamic {
        return;
    }
    let speed = slot
        .body
        .linear_velocity
        .magnitude()
        .max(slot.body.angular_velocity.magnitude());

    if speed < settings.sleep_speed_threshold {
        slot.idle_ticks += 1;
        if slot.idle_ticks >= settings.sleep_ticks_threshold
            && slot.body.sleep_state == SleepState::Awake
        {
            log::debug!("body going to sleep after {} idle ticks", slot.idle_ticks);
            slot.body.sleep_state = SleepState::Asleep;
            slot.body.linear_velocity = Vec3::zero();
            slot.body.angular_velocity = Vec3::zero();
        }
    } else {
        if slot.body.sleep_state == SleepState::Asleep {
            log::debug!("body woken by motion above sleep threshold");
        }
        slot.idle_ticks = 0;
        slot.body.sleep_state = SleepState::Awake;
    }
}
