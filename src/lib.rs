//! A three-dimensional rigid-body physics core: sweep-and-prune broadphase, SAT narrowphase
//! contact generation, and an impulse-based contact solver with positional push-out.
//!
//! Scene parsing, rendering, and editor/plugin-host integration are explicitly out of scope;
//! this crate is the simulation kernel an embedding application drives each tick.

pub mod body;
pub mod broadphase;
pub mod engine;
pub mod error;
pub mod math;
pub mod material;
pub mod mass;
pub mod narrowphase;
pub mod overlap_table;
pub mod shape;
pub mod solver;

pub use body::{MotionKind, RigidBody, SleepState};
pub use engine::{
    BodyHandle, ConstantGravity, Engine, EngineSettings, GravityField, NoTerrain,
    PostCollisionObserver, PreCollisionObserver, TerrainCollider, TerrainContact,
};
pub use error::{PhysicsError, Result};
pub use material::{Material, MaterialId, MaterialTable, SliceMaterialTable};
pub use narrowphase::{ContactManifold, ContactPoint};
pub use shape::Shape;
