//! End-to-end scenario tests driving the full engine step loop.

use std::sync::Arc;

use approx::assert_relative_eq;
use impulse3d::{
    math::Iso3, BodyHandle, ConstantGravity, Engine, EngineSettings, MotionKind, NoTerrain,
    RigidBody, Shape,
};
use vek::{Mat3, Vec3};

fn pose_at(position: Vec3<f64>) -> Iso3 {
    Iso3::from_position(position)
}

fn engine_with_defaults() -> Engine {
    Engine::new(EngineSettings::default()).expect("default settings are valid")
}

fn step_n(engine: &mut Engine, n: u32) {
    let gravity = ConstantGravity(engine_gravity());
    let terrain = NoTerrain;
    for _ in 0..n {
        engine.step(&gravity, &terrain);
    }
}

fn engine_gravity() -> Vec3<f64> {
    EngineSettings::default().gravity
}

#[test]
fn free_fall_matches_projectile_kinematics() {
    let mut engine = engine_with_defaults();
    let start_height = 50.0;
    let handle: BodyHandle = engine
        .add_body(RigidBody::new(
            Shape::sphere(0.5),
            pose_at(Vec3::new(0.0, start_height, 0.0)),
            MotionKind::Dynamic,
            1.0,
        ))
        .unwrap();

    let dt = EngineSettings::default().time_step;
    let ticks = 60;
    step_n(&mut engine, ticks);

    let body = engine.body(handle).unwrap();
    let elapsed = dt * ticks as f64;
    let expected_v = engine_gravity().y * elapsed;

    // Loose tolerance: the midpoint/semi-implicit integrator does not match continuous
    // kinematics bit for bit, only to within a fraction of a timestep's worth of acceleration.
    assert!((body.linear_velocity.y - expected_v).abs() < 1.0);
    assert!(body.pose.translation.y < start_height);
}

#[test]
fn two_sphere_head_on_elastic_collision_exchanges_velocities() {
    let mut settings = EngineSettings::default();
    settings.gravity = Vec3::zero();
    let mut engine = Engine::new(settings).unwrap();

    let mut table = impulse3d::SliceMaterialTable::default();
    let bouncy = table.push(impulse3d::Material {
        elasticity: 1.0,
        static_friction: 0.0,
        dynamic_friction: 0.0,
        ..Default::default()
    });
    engine.set_material_table(table);

    let mut a = RigidBody::new(
        Shape::sphere(0.5),
        pose_at(Vec3::new(-2.0, 0.0, 0.0)),
        MotionKind::Dynamic,
        1.0,
    );
    a.material_id = bouncy;
    a.linear_velocity = Vec3::new(1.0, 0.0, 0.0);

    let mut b = RigidBody::new(
        Shape::sphere(0.5),
        pose_at(Vec3::new(2.0, 0.0, 0.0)),
        MotionKind::Dynamic,
        1.0,
    );
    b.material_id = bouncy;
    b.linear_velocity = Vec3::new(-1.0, 0.0, 0.0);

    let ha = engine.add_body(a).unwrap();
    let hb = engine.add_body(b).unwrap();

    let gravity = ConstantGravity(Vec3::zero());
    let terrain = NoTerrain;
    for _ in 0..400 {
        engine.step(&gravity, &terrain);
    }

    let a = engine.body(ha).unwrap();
    let b = engine.body(hb).unwrap();

    // Equal-mass, perfectly elastic, head-on: the two bodies fully exchange velocities.
    assert_relative_eq!(a.linear_velocity.x, -1.0, epsilon = 1e-3);
    assert_relative_eq!(b.linear_velocity.x, 1.0, epsilon = 1e-3);
    assert_relative_eq!(a.linear_velocity.y, 0.0, epsilon = 1e-3);
    assert_relative_eq!(b.linear_velocity.y, 0.0, epsilon = 1e-3);
}

#[test]
fn box_stack_of_two_settles_at_rest_within_one_percent_of_rest_height() {
    let mut settings = EngineSettings::default();
    settings.gravity = Vec3::new(0.0, -10.0, 0.0);
    let mut engine = Engine::new(settings).unwrap();

    let mut table = impulse3d::SliceMaterialTable::default();
    let grippy = table.push(impulse3d::Material {
        elasticity: 0.0,
        static_friction: 0.5,
        dynamic_friction: 0.5,
        ..Default::default()
    });
    engine.set_material_table(table);

    let mut ground = RigidBody::fixed(
        Shape::cuboid(Vec3::new(10.0, 0.5, 10.0)),
        pose_at(Vec3::new(0.0, -0.5, 0.0)),
    );
    ground.material_id = grippy;
    engine.add_body(ground).unwrap();

    // Bottom cube at rest on the ground, top cube dropped from 0.1 units above it.
    let mut bottom = RigidBody::new(
        Shape::cuboid(Vec3::broadcast(0.5)),
        pose_at(Vec3::new(0.0, 0.5, 0.0)),
        MotionKind::Dynamic,
        1.0,
    );
    bottom.material_id = grippy;
    let bottom_handle = engine.add_body(bottom).unwrap();

    let mut top = RigidBody::new(
        Shape::cuboid(Vec3::broadcast(0.5)),
        pose_at(Vec3::new(0.0, 1.6, 0.0)),
        MotionKind::Dynamic,
        1.0,
    );
    top.material_id = grippy;
    let top_handle = engine.add_body(top).unwrap();

    // 2 simulated seconds at the default 1/120 time step.
    step_n(&mut engine, 240);

    let bottom = engine.body(bottom_handle).unwrap();
    let top = engine.body(top_handle).unwrap();

    assert!(bottom.linear_velocity.magnitude() < 0.01);
    assert!(top.linear_velocity.magnitude() < 0.01);

    let stack_height = top.pose.translation.y + 0.5;
    assert!(
        (stack_height - 2.0).abs() < 0.02,
        "stack height {stack_height} not within 1% of 2.0"
    );
}

#[test]
fn sphere_on_thirty_degree_frictionless_incline_slides_at_gravity_component() {
    let mut settings = EngineSettings::default();
    settings.gravity = Vec3::new(0.0, -10.0, 0.0);
    let mut engine = Engine::new(settings).unwrap();

    let mut table = impulse3d::SliceMaterialTable::default();
    let frictionless = table.push(impulse3d::Material {
        elasticity: 0.0,
        static_friction: 0.0,
        dynamic_friction: 0.0,
        ..Default::default()
    });
    engine.set_material_table(table);

    // A large triangle tilted 30 degrees about the Z axis: its local +Y face normal maps to
    // world (-sin30, cos30, 0), and its local +X tangent (the uphill direction) maps into the
    // XY-plane, so a body released on it slides along world X while descending along Y.
    let theta: f64 = std::f64::consts::FRAC_PI_6;
    let (sin, cos) = theta.sin_cos();
    let rotation = Mat3::new(
        cos, -sin, 0.0, //
        sin, cos, 0.0, //
        0.0, 0.0, 1.0,
    );
    let incline_pose = Iso3::new(Vec3::zero(), rotation);

    let vertices = [
        Vec3::new(-100.0, 0.0, -100.0),
        Vec3::new(100.0, 0.0, -100.0),
        Vec3::new(0.0, 0.0, 200.0),
    ];
    let mut incline = RigidBody::fixed(Arc::new(Shape::Triangle { vertices }), incline_pose);
    incline.material_id = frictionless;
    engine.add_body(incline).unwrap();

    // Placed a hair above the slope (along its normal) near the local origin, which the
    // triangle's interior covers, to start as close as possible to "released on the incline".
    let radius = 0.5;
    let normal_world = incline_pose.transform_vector(Vec3::unit_y());
    let start = incline_pose.transform_point(Vec3::zero()) + normal_world * (radius + 1e-3);

    let mut ball = RigidBody::new(Shape::sphere(radius), pose_at(start), MotionKind::Dynamic, 1.0);
    ball.material_id = frictionless;
    let handle = engine.add_body(ball).unwrap();

    step_n(&mut engine, 120);

    let body = engine.body(handle).unwrap();
    let tangent_world = incline_pose.transform_vector(Vec3::unit_x());

    // Frictionless and inelastic: once resting on the slope, velocity should lie almost entirely
    // along the slope's tangent direction, with magnitude close to g*sin(30 deg)*1s = 5 m/s.
    let along_slope = body.linear_velocity.dot(tangent_world);
    let expected = 10.0 * theta.sin();
    assert_relative_eq!(along_slope.abs(), expected, epsilon = expected * 0.05);
}

#[test]
fn broadphase_overlap_table_bijection_holds_through_many_add_remove_cycles() {
    let mut settings = EngineSettings::default();
    settings.collision_capacity = 128;
    let mut engine = Engine::new(settings).unwrap();

    let mut handles = Vec::new();
    for i in 0..100 {
        let body = RigidBody::new(
            Shape::sphere(0.25),
            pose_at(Vec3::new((i % 10) as f64 * 0.4, (i / 10) as f64 * 0.4, 0.0)),
            MotionKind::Dynamic,
            1.0,
        );
        handles.push(engine.add_body(body).unwrap());
        engine.verify_broadphase();
    }

    step_n(&mut engine, 5);
    engine.verify_broadphase();

    for (i, handle) in handles.iter().enumerate() {
        if i % 2 == 0 {
            engine.remove_body(*handle).unwrap();
            engine.verify_broadphase();
        }
    }

    step_n(&mut engine, 5);
    engine.verify_broadphase();

    assert_eq!(engine.body_count(), 50);
}

#[test]
fn resting_body_eventually_sleeps() {
    let mut settings = EngineSettings::default();
    settings.sleep_ticks_threshold = 10;
    let mut engine = Engine::new(settings).unwrap();

    let ground = RigidBody::fixed(
        Shape::cuboid(Vec3::new(10.0, 0.5, 10.0)),
        pose_at(Vec3::new(0.0, -0.5, 0.0)),
    );
    engine.add_body(ground).unwrap();

    let handle = engine
        .add_body(RigidBody::new(
            Shape::sphere(0.5),
            pose_at(Vec3::new(0.0, 0.55, 0.0)),
            MotionKind::Dynamic,
            1.0,
        ))
        .unwrap();

    step_n(&mut engine, 400);

    let body = engine.body(handle).unwrap();
    assert_eq!(body.sleep_state, impulse3d::SleepState::Asleep);
}
