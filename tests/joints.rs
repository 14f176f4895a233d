use approx::assert_relative_eq;
use pivot2d::na;
use pivot2d::prelude::*;

fn default_world() -> (IntegrationParameters, IslandSolver, RigidBodySet, JointSet) {
    (
        IntegrationParameters::default(),
        IslandSolver::new(),
        RigidBodySet::new(),
        JointSet::new(),
    )
}

fn step_n(
    n: usize,
    gravity: Vector<Real>,
    params: &IntegrationParameters,
    solver: &mut IslandSolver,
    bodies: &mut RigidBodySet,
    joints: &mut JointSet,
) {
    for _ in 0..n {
        solver.step(&gravity, params, bodies, joints);
    }
}

#[test]
fn distance_joint_holds_separation_under_gravity() {
    let (params, mut solver, mut bodies, mut joints) = default_world();

    let h1 = bodies.insert(RigidBodyBuilder::new_dynamic().translation(0.0, 0.0).build());
    let h2 = bodies.insert(RigidBodyBuilder::new_dynamic().translation(5.0, 0.0).build());
    let joint = DistanceJoint::new(Point::origin(), Point::origin(), 5.0);
    joints.insert(&mut bodies, h1, Some(h2), joint);

    step_n(
        120,
        Vector::new(0.0, -10.0),
        &params,
        &mut solver,
        &mut bodies,
        &mut joints,
    );

    let separation = (bodies[h2].world_com() - bodies[h1].world_com()).norm();
    assert!(
        (separation - 5.0).abs() <= params.allowed_linear_error,
        "separation drifted to {separation}"
    );
}

#[test]
fn disabling_warmstart_zeroes_the_carried_impulse() {
    let (mut params, mut solver, mut bodies, mut joints) = default_world();

    let h1 = bodies.insert(RigidBodyBuilder::new_static().build());
    let h2 = bodies.insert(RigidBodyBuilder::new_dynamic().translation(0.0, -5.0).build());
    let joint = DistanceJoint::new(Point::origin(), Point::origin(), 5.0);
    let jh = joints.insert(&mut bodies, h1, Some(h2), joint);

    // A hanging body loads the joint: the accumulated impulse is nonzero.
    step_n(
        5,
        Vector::new(0.0, -10.0),
        &params,
        &mut solver,
        &mut bodies,
        &mut joints,
    );
    let loaded = joints[jh].params.as_distance_joint().unwrap().impulse;
    assert!(loaded != 0.0);

    // With warm-starting disabled and the system at rest, nothing ever
    // accumulates again: the impulse is exactly zero after the step.
    params.warmstart_coeff = 0.0;
    bodies[h2].set_linvel(Vector::zeros());
    bodies[h2].set_angvel(0.0);
    step_n(
        1,
        Vector::zeros(),
        &params,
        &mut solver,
        &mut bodies,
        &mut joints,
    );
    assert_eq!(joints[jh].params.as_distance_joint().unwrap().impulse, 0.0);
}

#[test]
fn position_solve_is_idempotent_at_the_fixed_point() {
    let (params, mut solver, mut bodies, mut joints) = default_world();

    let h1 = bodies.insert(RigidBodyBuilder::new_dynamic().translation(0.0, 0.0).build());
    let h2 = bodies.insert(RigidBodyBuilder::new_dynamic().translation(5.0, 0.0).build());
    let joint = DistanceJoint::new(Point::origin(), Point::origin(), 5.0);
    joints.insert(&mut bodies, h1, Some(h2), joint);

    // Already exactly satisfied, no gravity: the step must leave the
    // positions untouched.
    let before1 = bodies[h1].world_com();
    let before2 = bodies[h2].world_com();
    step_n(
        3,
        Vector::zeros(),
        &params,
        &mut solver,
        &mut bodies,
        &mut joints,
    );
    assert_relative_eq!(bodies[h1].world_com(), before1, epsilon = 1.0e-5);
    assert_relative_eq!(bodies[h2].world_com(), before2, epsilon = 1.0e-5);
}

#[test]
fn rope_impulse_never_goes_positive() {
    let (params, mut solver, mut bodies, mut joints) = default_world();

    let h1 = bodies.insert(RigidBodyBuilder::new_static().build());
    let h2 = bodies.insert(RigidBodyBuilder::new_dynamic().translation(3.0, 0.0).build());
    let joint = RopeJoint::new(Point::origin(), Point::origin(), 5.0);
    let jh = joints.insert(&mut bodies, h1, Some(h2), joint);

    for _ in 0..240 {
        solver.step(
            &Vector::new(0.0, -10.0),
            &params,
            &mut bodies,
            &mut joints,
        );
        let rope = joints[jh].params.as_rope_joint().unwrap();
        assert!(
            rope.impulse <= 0.0,
            "a rope can pull but never push (impulse = {})",
            rope.impulse
        );
    }

    // The body swung past the limit at some point and the rope caught it.
    let distance = bodies[h2].world_com().coords.norm();
    assert!(distance <= 5.0 + 10.0 * params.allowed_linear_error);
}

#[test]
fn limit_state_transition_resets_the_limit_impulse() {
    let (params, mut solver, mut bodies, mut joints) = default_world();

    let h1 = bodies.insert(RigidBodyBuilder::new_static().build());
    let h2 = bodies.insert(
        RigidBodyBuilder::new_dynamic()
            .translation(0.0, 0.0)
            .angvel(10.0)
            .build(),
    );
    let joint = RevoluteJoint::new(Point::origin(), Point::origin(), 0.0)
        .with_limits([-0.5, 0.5]);
    let jh = joints.insert(&mut bodies, h1, Some(h2), joint);

    // Spin into the upper limit until the limit impulse is loaded.
    let mut hit_upper = false;
    for _ in 0..60 {
        solver.step(&Vector::zeros(), &params, &mut bodies, &mut joints);
        let rev = joints[jh].params.as_revolute_joint().unwrap();
        if rev.limit_state() == LimitState::AtUpper && rev.impulse.z != 0.0 {
            hit_upper = true;
            break;
        }
    }
    assert!(hit_upper, "the joint never reached its upper limit");

    // Spin back: as soon as the limit deactivates, the stale limit impulse
    // must be gone.
    bodies[h2].set_angvel(-10.0);
    let mut deactivated = false;
    for _ in 0..60 {
        solver.step(&Vector::zeros(), &params, &mut bodies, &mut joints);
        let rev = joints[jh].params.as_revolute_joint().unwrap();
        if rev.limit_state() == LimitState::Inactive {
            assert_eq!(rev.impulse.z, 0.0);
            deactivated = true;
            break;
        }
    }
    assert!(deactivated, "the joint never left its limit");
}

#[test]
fn locked_revolute_limit_holds_the_reference_angle() {
    let (params, mut solver, mut bodies, mut joints) = default_world();

    let h1 = bodies.insert(RigidBodyBuilder::new_static().build());
    let h2 = bodies.insert(RigidBodyBuilder::new_dynamic().translation(2.0, 0.0).build());
    // Anchor away from the dynamic body's center of mass so gravity exerts
    // a torque about the anchor.
    let joint = RevoluteJoint::from_world_anchor(&bodies[h1], &bodies[h2], Point::origin())
        .with_limits([0.0, 0.0]);
    joints.insert(&mut bodies, h1, Some(h2), joint);

    step_n(
        240,
        Vector::new(0.0, -10.0),
        &params,
        &mut solver,
        &mut bodies,
        &mut joints,
    );

    let angle = bodies[h2].sweep().a;
    assert!(
        angle.abs() <= 2.0 * params.allowed_angular_error,
        "the locked joint rotated to {angle}"
    );
}

#[test]
fn prismatic_joint_locks_rotation_and_limits_translation() {
    let (params, mut solver, mut bodies, mut joints) = default_world();

    let h1 = bodies.insert(RigidBodyBuilder::new_static().build());
    let h2 = bodies.insert(RigidBodyBuilder::new_dynamic().translation(0.0, 0.0).build());
    let axis = na::Unit::new_normalize(Vector::new(0.0, 1.0));
    let joint = PrismaticJoint::from_world_frame(&bodies[h1], &bodies[h2], Point::origin(), axis)
        .with_limits([-1.0, 0.0]);
    let jh = joints.insert(&mut bodies, h1, Some(h2), joint);

    step_n(
        240,
        Vector::new(3.0, -10.0),
        &params,
        &mut solver,
        &mut bodies,
        &mut joints,
    );

    let com = bodies[h2].world_com();
    // Sideways gravity cannot push the slider off its axis.
    assert!(com.x.abs() <= 10.0 * params.allowed_linear_error);
    // The body slid down and rests on the lower limit.
    let prismatic = joints[jh].params.as_prismatic_joint().unwrap();
    let translation = prismatic.translation(&bodies[h1], &bodies[h2]);
    assert!(translation >= -1.0 - 10.0 * params.allowed_linear_error);
    assert!(translation <= 0.0 + 10.0 * params.allowed_linear_error);
    assert!(bodies[h2].sweep().a.abs() <= params.allowed_angular_error);
}

#[test]
fn weld_joint_freezes_the_relative_pose() {
    let (params, mut solver, mut bodies, mut joints) = default_world();

    let h1 = bodies.insert(RigidBodyBuilder::new_dynamic().translation(0.0, 0.0).build());
    let h2 = bodies.insert(RigidBodyBuilder::new_dynamic().translation(1.0, 0.0).build());
    let joint = WeldJoint::from_world_anchor(&bodies[h1], &bodies[h2], Point::new(0.5, 0.0));
    joints.insert(&mut bodies, h1, Some(h2), joint);

    // Kick one body; the pair should move as a single rigid object.
    bodies[h1].set_linvel(Vector::new(0.0, 3.0));
    bodies[h1].set_angvel(2.0);

    step_n(
        120,
        Vector::zeros(),
        &params,
        &mut solver,
        &mut bodies,
        &mut joints,
    );

    let relative_angle = bodies[h2].sweep().a - bodies[h1].sweep().a;
    assert!(relative_angle.abs() <= 2.0 * params.allowed_angular_error);
    let separation = (bodies[h2].world_com() - bodies[h1].world_com()).norm();
    assert!((separation - 1.0).abs() <= 10.0 * params.allowed_linear_error);
}

#[test]
fn wheel_joint_keeps_the_body_on_its_axle_line() {
    let (params, mut solver, mut bodies, mut joints) = default_world();

    let h1 = bodies.insert(RigidBodyBuilder::new_static().build());
    let h2 = bodies.insert(RigidBodyBuilder::new_dynamic().translation(0.0, -1.0).build());
    let axis = na::Unit::new_normalize(Vector::new(0.0, 1.0));
    let joint = WheelJoint::from_world_frame(&bodies[h1], &bodies[h2], Point::new(0.0, -1.0), axis)
        .with_suspension(4.0, 0.7);
    joints.insert(&mut bodies, h1, Some(h2), joint);

    step_n(
        240,
        Vector::new(2.0, -10.0),
        &params,
        &mut solver,
        &mut bodies,
        &mut joints,
    );

    // The suspension lets the body bob along the axis, never off it.
    let com = bodies[h2].world_com();
    assert!(com.x.abs() <= 10.0 * params.allowed_linear_error);
    assert!(com.y < -1.0, "the suspension should sag under gravity");
}

#[test]
fn pulley_joint_preserves_the_total_cable_length() {
    let (params, mut solver, mut bodies, mut joints) = default_world();

    let h1 = bodies.insert(RigidBodyBuilder::new_dynamic().translation(-2.0, 0.0).build());
    let h2 = bodies.insert(
        RigidBodyBuilder::new_dynamic()
            .translation(2.0, 0.0)
            .mass(3.0)
            .build(),
    );
    let ratio = 1.5;
    let joint = PulleyJoint::new(
        &bodies[h1],
        &bodies[h2],
        Point::new(-2.0, 4.0),
        Point::new(2.0, 4.0),
        Point::new(-2.0, 0.0),
        Point::new(2.0, 0.0),
        ratio,
    );
    let constant = joint.length1 + ratio * joint.length2;
    let jh = joints.insert(&mut bodies, h1, Some(h2), joint);

    step_n(
        30,
        Vector::new(0.0, -10.0),
        &params,
        &mut solver,
        &mut bodies,
        &mut joints,
    );

    let pulley = joints[jh].params.as_pulley_joint().unwrap();
    let total = pulley.current_length1(&bodies[h1]) + ratio * pulley.current_length2(&bodies[h2]);
    assert!(
        (total - constant).abs() <= 10.0 * params.allowed_linear_error,
        "cable length drifted from {constant} to {total}"
    );
    // The heavier side dropped, hoisting the lighter one.
    assert!(bodies[h2].world_com().y < 0.0);
    assert!(bodies[h1].world_com().y > 0.0);
}

#[test]
fn gear_joint_couples_the_two_wheel_angles() {
    let (params, mut solver, mut bodies, mut joints) = default_world();

    let ground = bodies.insert(RigidBodyBuilder::new_static().build());
    let wheel1 = bodies.insert(
        RigidBodyBuilder::new_dynamic()
            .translation(-1.0, 0.0)
            .angvel(5.0)
            .build(),
    );
    let wheel2 = bodies.insert(RigidBodyBuilder::new_dynamic().translation(1.0, 0.0).build());

    let rev1 = RevoluteJoint::from_world_anchor(
        &bodies[ground],
        &bodies[wheel1],
        Point::new(-1.0, 0.0),
    );
    let rev2 = RevoluteJoint::from_world_anchor(
        &bodies[ground],
        &bodies[wheel2],
        Point::new(1.0, 0.0),
    );
    let j1 = joints.insert(&mut bodies, ground, Some(wheel1), rev1);
    let j2 = joints.insert(&mut bodies, ground, Some(wheel2), rev2);

    let ratio = 2.0;
    let gear = joints.insert_gear(&mut bodies, j1, j2, ratio);
    let constant = joints[gear].params.as_gear_joint().unwrap().constant();

    step_n(
        240,
        Vector::zeros(),
        &params,
        &mut solver,
        &mut bodies,
        &mut joints,
    );

    let coordinate = bodies[wheel1].sweep().a + ratio * bodies[wheel2].sweep().a;
    assert!(
        (coordinate - constant).abs() <= 2.0 * params.allowed_linear_error,
        "gear coordinate drifted from {constant} to {coordinate}"
    );
    // The second wheel is actually spinning, in opposition.
    assert!(bodies[wheel2].angvel() < -0.1);
}

#[test]
fn mouse_joint_impulse_never_exceeds_the_force_budget() {
    let (params, mut solver, mut bodies, mut joints) = default_world();

    let h = bodies.insert(RigidBodyBuilder::new_dynamic().build());
    let max_force = 10.0;
    let joint = MouseJoint::new(&bodies[h], Point::origin(), max_force);
    let jh = joints.insert(&mut bodies, h, None, joint);

    joints
        .get_mut_wake(jh, &mut bodies)
        .unwrap()
        .params
        .as_mouse_joint_mut()
        .unwrap()
        .set_target(Point::new(100.0, 0.0));

    let budget = max_force * params.dt;
    for _ in 0..120 {
        solver.step(&Vector::zeros(), &params, &mut bodies, &mut joints);
        let mouse = joints[jh].params.as_mouse_joint().unwrap();
        assert!(
            mouse.impulse.norm() <= budget * 1.0001,
            "the drag impulse exceeded its budget"
        );
    }

    // The body is being dragged toward the target all the same.
    assert!(bodies[h].world_com().x > 1.0);
}

#[test]
fn motor_joint_steers_within_its_budget() {
    let (params, mut solver, mut bodies, mut joints) = default_world();

    let h1 = bodies.insert(RigidBodyBuilder::new_static().build());
    let h2 = bodies.insert(RigidBodyBuilder::new_dynamic().translation(0.0, 0.0).build());
    let mut motor = MotorJoint::new(&bodies[h1], &bodies[h2])
        .with_max_force_and_torque(50.0, 10.0);
    motor.linear_offset = Vector::new(3.0, 0.0);
    let jh = joints.insert(&mut bodies, h1, Some(h2), motor);

    let budget = 50.0 * params.dt;
    for _ in 0..240 {
        solver.step(&Vector::zeros(), &params, &mut bodies, &mut joints);
        let motor = joints[jh].params.as_motor_joint().unwrap();
        assert!(motor.linear_impulse.norm() <= budget * 1.0001);
    }

    assert_relative_eq!(bodies[h2].world_com().x, 3.0, epsilon = 0.1);
}

#[test]
fn angle_joint_locks_the_relative_angle_only() {
    let (params, mut solver, mut bodies, mut joints) = default_world();

    let h1 = bodies.insert(RigidBodyBuilder::new_dynamic().build());
    let h2 = bodies.insert(RigidBodyBuilder::new_dynamic().translation(4.0, 0.0).build());
    let joint = AngleJoint::from_current_angle(&bodies[h1], &bodies[h2]);
    joints.insert(&mut bodies, h1, Some(h2), joint);

    bodies[h1].set_angvel(3.0);
    let com1_before = bodies[h1].world_com();

    step_n(
        120,
        Vector::zeros(),
        &params,
        &mut solver,
        &mut bodies,
        &mut joints,
    );

    // The spin is shared so the relative angle stays locked, and the bodies
    // never pull on each other positionally.
    let relative = bodies[h2].sweep().a - bodies[h1].sweep().a;
    assert!(relative.abs() <= params.allowed_angular_error);
    assert_relative_eq!(bodies[h1].world_com(), com1_before, epsilon = 1.0e-5);
}

#[test]
fn overloaded_joint_breaks_and_disables_itself() {
    let (params, mut solver, mut bodies, mut joints) = default_world();

    let h1 = bodies.insert(RigidBodyBuilder::new_static().build());
    let h2 = bodies.insert(
        RigidBodyBuilder::new_dynamic()
            .translation(0.0, -5.0)
            .mass(100.0)
            .build(),
    );
    let joint = DistanceJoint::new(Point::origin(), Point::origin(), 5.0);
    let jh = joints.insert(&mut bodies, h1, Some(h2), joint);
    // A hundred-kilogram body hangs from a joint rated for a feather.
    joints[jh].break_force = 1.0;

    let mut broke = Vec::new();
    for _ in 0..10 {
        broke = solver.step(&Vector::new(0.0, -10.0), &params, &mut bodies, &mut joints);
        if !broke.is_empty() {
            break;
        }
    }

    assert_eq!(broke.len(), 1);
    assert_eq!(broke[0].0, jh);
    assert!(broke[0].1 > 1.0);
    assert!(!joints[jh].enabled);

    // A disabled joint stops constraining: the body now free-falls.
    let y_before = bodies[h2].world_com().y;
    step_n(
        30,
        Vector::new(0.0, -10.0),
        &params,
        &mut solver,
        &mut bodies,
        &mut joints,
    );
    assert!(bodies[h2].world_com().y < y_before - 0.5);
}
