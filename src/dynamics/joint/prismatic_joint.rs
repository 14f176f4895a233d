use crate::dynamics::joint::LimitState;
use crate::dynamics::solver::SolverData;
use crate::dynamics::RigidBody;
use crate::math::{Point, Real, SdpMatrix2, SdpMatrix3, Vector};
use crate::utils::{self, WBasis, WCross, WDot};
use na::{Unit, Vector3};

/// A joint that constrains the relative motion of two bodies to a
/// translation along one axis fixed in the first body's frame.
///
/// Perpendicular translation and relative rotation are locked. The
/// translation along the axis is free, and can be limited and/or motorized.
/// When the translation limit is active the three rows are solved as one
/// 3x3 block with the same clamp-and-resolve elimination as the revolute
/// joint's limit.
#[derive(Copy, Clone, Debug)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct PrismaticJoint {
    /// Where the joint is attached on the first body, expressed in the first
    /// body's local frame.
    pub local_anchor1: Point<Real>,
    /// Where the joint is attached on the second body, expressed in the
    /// second body's local frame.
    pub local_anchor2: Point<Real>,
    /// The sliding axis, expressed in the first body's local frame.
    pub local_axis1: Unit<Vector<Real>>,
    /// The relative angle locked by this joint.
    pub reference_angle: Real,
    /// Is the translation limit enabled?
    pub limits_enabled: bool,
    /// The `[lower, upper]` bounds of the translation along the axis.
    pub limits: [Real; 2],
    /// Is the translation motor enabled?
    pub motor_enabled: bool,
    /// The translation velocity the motor tries to reach.
    pub motor_target_vel: Real,
    /// The maximum force the motor can exert.
    pub motor_max_force: Real,
    /// The accumulated impulse applied by this joint: the perpendicular row
    /// in `x`, the angular row in `y`, the limit row in `z`.
    pub impulse: Vector3<Real>,
    /// The accumulated impulse applied by the motor.
    pub motor_impulse: Real,

    // Solver state, populated by `init_velocity_constraints`.
    index1: usize,
    index2: usize,
    local_com1: Point<Real>,
    local_com2: Point<Real>,
    im1: Real,
    im2: Real,
    ii1: Real,
    ii2: Real,
    axis: Vector<Real>,
    perp: Vector<Real>,
    s1: Real,
    s2: Real,
    a1: Real,
    a2: Real,
    k: SdpMatrix3,
    motor_mass: Real,
    limit_state: LimitState,
}

impl PrismaticJoint {
    /// Creates a new prismatic joint from the local anchors, the local
    /// sliding axis of the first body, and the locked relative angle.
    pub fn new(
        local_anchor1: Point<Real>,
        local_anchor2: Point<Real>,
        local_axis1: Unit<Vector<Real>>,
        reference_angle: Real,
    ) -> Self {
        Self {
            local_anchor1,
            local_anchor2,
            local_axis1,
            reference_angle,
            limits_enabled: false,
            limits: [0.0, 0.0],
            motor_enabled: false,
            motor_target_vel: 0.0,
            motor_max_force: 0.0,
            impulse: na::zero(),
            motor_impulse: 0.0,
            index1: 0,
            index2: 0,
            local_com1: Point::origin(),
            local_com2: Point::origin(),
            im1: 0.0,
            im2: 0.0,
            ii1: 0.0,
            ii2: 0.0,
            axis: na::zero(),
            perp: na::zero(),
            s1: 0.0,
            s2: 0.0,
            a1: 0.0,
            a2: 0.0,
            k: SdpMatrix3::zero(),
            motor_mass: 0.0,
            limit_state: LimitState::Inactive,
        }
    }

    /// Creates a new prismatic joint from a world-space anchor and axis,
    /// with the current relative angle as reference.
    pub fn from_world_frame(
        rb1: &RigidBody,
        rb2: &RigidBody,
        anchor: Point<Real>,
        axis: Unit<Vector<Real>>,
    ) -> Self {
        let local_anchor1 = rb1.position().inverse_transform_point(&anchor);
        let local_anchor2 = rb2.position().inverse_transform_point(&anchor);
        let local_axis1 = Unit::new_unchecked(rb1.position().inverse_transform_vector(&axis));
        let reference_angle = rb2.sweep().a - rb1.sweep().a;
        Self::new(local_anchor1, local_anchor2, local_axis1, reference_angle)
    }

    /// Enables the translation limit with the given `[lower, upper]` bounds.
    pub fn with_limits(mut self, limits: [Real; 2]) -> Self {
        assert!(
            limits[0] <= limits[1],
            "The lower translation limit cannot be greater than the upper limit."
        );
        self.limits_enabled = true;
        self.limits = limits;
        self
    }

    /// Enables the translation motor with the given target velocity and
    /// maximum force.
    pub fn with_motor(mut self, target_vel: Real, max_force: Real) -> Self {
        assert!(max_force >= 0.0, "The maximum motor force cannot be negative.");
        self.motor_enabled = true;
        self.motor_target_vel = target_vel;
        self.motor_max_force = max_force;
        self
    }

    /// The current translation along the joint axis.
    pub fn translation(&self, rb1: &RigidBody, rb2: &RigidBody) -> Real {
        let anchor1 = rb1.position().transform_point(&self.local_anchor1);
        let anchor2 = rb2.position().transform_point(&self.local_anchor2);
        let axis = rb1.position() * self.local_axis1.into_inner();
        (anchor2 - anchor1).gdot(axis)
    }

    /// The limit state computed by the last constraint initialization.
    pub fn limit_state(&self) -> LimitState {
        self.limit_state
    }

    pub(crate) fn init_velocity_constraints(
        &mut self,
        rb1: &RigidBody,
        rb2: &RigidBody,
        data: &mut SolverData,
    ) {
        self.index1 = rb1.active_set_offset;
        self.index2 = rb2.active_set_offset;
        self.local_com1 = rb1.local_com();
        self.local_com2 = rb2.local_com();
        self.im1 = rb1.effective_inv_mass;
        self.im2 = rb2.effective_inv_mass;
        self.ii1 = rb1.effective_inv_inertia;
        self.ii2 = rb2.effective_inv_inertia;

        let position1 = data.positions[self.index1];
        let position2 = data.positions[self.index2];
        let q1 = position1.rotation();
        let q2 = position2.rotation();

        let r1 = q1 * (self.local_anchor1 - self.local_com1);
        let r2 = q2 * (self.local_anchor2 - self.local_com2);
        let d = (position2.c - position1.c) + (r2 - r1);

        let (im1, im2, ii1, ii2) = (self.im1, self.im2, self.ii1, self.ii2);

        // Jacobian direction along the free axis.
        self.axis = q1 * self.local_axis1.into_inner();
        self.a1 = (d + r1).gcross(self.axis);
        self.a2 = r2.gcross(self.axis);
        self.motor_mass = utils::inv(im1 + im2 + ii1 * self.a1 * self.a1 + ii2 * self.a2 * self.a2);

        // Jacobian direction perpendicular to the free axis.
        self.perp = self.axis.orthonormal_vector();
        self.s1 = (d + r1).gcross(self.perp);
        self.s2 = r2.gcross(self.perp);

        let k22 = ii1 + ii2;
        self.k = SdpMatrix3::new(
            im1 + im2 + ii1 * self.s1 * self.s1 + ii2 * self.s2 * self.s2,
            ii1 * self.s1 + ii2 * self.s2,
            ii1 * self.s1 * self.a1 + ii2 * self.s2 * self.a2,
            // Both bodies have fixed rotation: keep the angular row
            // invertible, its impulse stays zero anyway.
            if k22 == 0.0 { 1.0 } else { k22 },
            ii1 * self.a1 + ii2 * self.a2,
            im1 + im2 + ii1 * self.a1 * self.a1 + ii2 * self.a2 * self.a2,
        );

        if self.limits_enabled {
            let translation = self.axis.gdot(d);
            let [lower, upper] = self.limits;

            if (upper - lower).abs() < 2.0 * data.params.allowed_linear_error {
                self.limit_state = LimitState::Equal;
            } else if translation <= lower {
                if self.limit_state != LimitState::AtLower {
                    self.impulse.z = 0.0;
                }
                self.limit_state = LimitState::AtLower;
            } else if translation >= upper {
                if self.limit_state != LimitState::AtUpper {
                    self.impulse.z = 0.0;
                }
                self.limit_state = LimitState::AtUpper;
            } else {
                self.limit_state = LimitState::Inactive;
                self.impulse.z = 0.0;
            }
        } else {
            self.limit_state = LimitState::Inactive;
            self.impulse.z = 0.0;
        }

        if !self.motor_enabled {
            self.motor_impulse = 0.0;
        }

        self.impulse *= data.warmstart_factor();
        self.motor_impulse *= data.warmstart_factor();

        let p = self.perp * self.impulse.x + self.axis * (self.motor_impulse + self.impulse.z);
        let l1 = self.impulse.x * self.s1
            + self.impulse.y
            + (self.motor_impulse + self.impulse.z) * self.a1;
        let l2 = self.impulse.x * self.s2
            + self.impulse.y
            + (self.motor_impulse + self.impulse.z) * self.a2;

        let mut vels1 = data.velocities[self.index1];
        let mut vels2 = data.velocities[self.index2];
        vels1.linvel -= p * im1;
        vels1.angvel -= ii1 * l1;
        vels2.linvel += p * im2;
        vels2.angvel += ii2 * l2;
        data.velocities[self.index1] = vels1;
        data.velocities[self.index2] = vels2;
    }

    pub(crate) fn solve_velocity_constraints(&mut self, data: &mut SolverData) {
        let mut vels1 = data.velocities[self.index1];
        let mut vels2 = data.velocities[self.index2];

        let (im1, im2, ii1, ii2) = (self.im1, self.im2, self.ii1, self.ii2);

        /*
         * Motor constraint.
         */
        if self.motor_enabled && self.limit_state != LimitState::Equal {
            let cdot = self.axis.gdot(vels2.linvel - vels1.linvel) + self.a2 * vels2.angvel
                - self.a1 * vels1.angvel;
            let impulse = self.motor_mass * (self.motor_target_vel - cdot);
            let old_impulse = self.motor_impulse;
            let max_impulse = self.motor_max_force * data.dt();
            self.motor_impulse = na::clamp(old_impulse + impulse, -max_impulse, max_impulse);
            let impulse = self.motor_impulse - old_impulse;

            let p = self.axis * impulse;
            vels1.linvel -= p * im1;
            vels1.angvel -= ii1 * impulse * self.a1;
            vels2.linvel += p * im2;
            vels2.angvel += ii2 * impulse * self.a2;
        }

        let cdot1 = Vector::new(
            self.perp.gdot(vels2.linvel - vels1.linvel) + self.s2 * vels2.angvel
                - self.s1 * vels1.angvel,
            vels2.angvel - vels1.angvel,
        );

        if self.limits_enabled && self.limit_state != LimitState::Inactive {
            /*
             * Locked rows and translation limit solved as one 3x3 block.
             */
            let cdot2 = self.axis.gdot(vels2.linvel - vels1.linvel) + self.a2 * vels2.angvel
                - self.a1 * vels1.angvel;
            let cdot = Vector3::new(cdot1.x, cdot1.y, cdot2);

            let f1 = self.impulse;
            self.impulse += self.k.solve33(-cdot);

            match self.limit_state {
                LimitState::AtLower => self.impulse.z = self.impulse.z.max(0.0),
                LimitState::AtUpper => self.impulse.z = self.impulse.z.min(0.0),
                _ => {}
            }

            // Re-solve the locked rows with the clamped limit impulse held
            // fixed: f2(1:2) = K22⁻¹(-Cdot1 - K12 Δfz) + f1(1:2).
            let b = -cdot1 - Vector::new(self.k.m13, self.k.m23) * (self.impulse.z - f1.z);
            let reduced = self.k.solve22(b) + Vector::new(f1.x, f1.y);
            self.impulse.x = reduced.x;
            self.impulse.y = reduced.y;

            let df = self.impulse - f1;
            let p = self.perp * df.x + self.axis * df.z;
            let l1 = df.x * self.s1 + df.y + df.z * self.a1;
            let l2 = df.x * self.s2 + df.y + df.z * self.a2;

            vels1.linvel -= p * im1;
            vels1.angvel -= ii1 * l1;
            vels2.linvel += p * im2;
            vels2.angvel += ii2 * l2;
        } else {
            /*
             * Locked rows only.
             */
            let df = self.k.solve22(-cdot1);
            self.impulse.x += df.x;
            self.impulse.y += df.y;

            let p = self.perp * df.x;
            let l1 = df.x * self.s1 + df.y;
            let l2 = df.x * self.s2 + df.y;

            vels1.linvel -= p * im1;
            vels1.angvel -= ii1 * l1;
            vels2.linvel += p * im2;
            vels2.angvel += ii2 * l2;
        }

        data.velocities[self.index1] = vels1;
        data.velocities[self.index2] = vels2;
    }

    pub(crate) fn solve_position_constraints(&mut self, data: &mut SolverData) -> bool {
        let mut position1 = data.positions[self.index1];
        let mut position2 = data.positions[self.index2];
        let q1 = position1.rotation();
        let q2 = position2.rotation();

        let (im1, im2, ii1, ii2) = (self.im1, self.im2, self.ii1, self.ii2);

        // Jacobians recomputed from the current positions: the
        // velocity-pass directions are stale here.
        let r1 = q1 * (self.local_anchor1 - self.local_com1);
        let r2 = q2 * (self.local_anchor2 - self.local_com2);
        let d = (position2.c - position1.c) + (r2 - r1);

        let axis = q1 * self.local_axis1.into_inner();
        let a1 = (d + r1).gcross(axis);
        let a2 = r2.gcross(axis);
        let perp = axis.orthonormal_vector();
        let s1 = (d + r1).gcross(perp);
        let s2 = r2.gcross(perp);

        let c1 = Vector::new(perp.gdot(d), position2.a - position1.a - self.reference_angle);
        let mut linear_error = c1.x.abs();
        let angular_error = c1.y.abs();

        let mut active = false;
        let mut c2 = 0.0;
        if self.limits_enabled {
            let translation = axis.gdot(d);
            let [lower, upper] = self.limits;
            let linear_slop = data.params.allowed_linear_error;
            let max_correction = data.params.max_linear_correction;

            if (upper - lower).abs() < 2.0 * linear_slop {
                c2 = na::clamp(translation - lower, -max_correction, max_correction);
                linear_error = linear_error.max((translation - lower).abs());
                active = true;
            } else if translation <= lower {
                c2 = na::clamp(translation - lower + linear_slop, -max_correction, 0.0);
                linear_error = linear_error.max(lower - translation);
                active = true;
            } else if translation >= upper {
                c2 = na::clamp(translation - upper - linear_slop, 0.0, max_correction);
                linear_error = linear_error.max(translation - upper);
                active = true;
            }
        }

        let impulse = if active {
            let k22 = ii1 + ii2;
            let k = SdpMatrix3::new(
                im1 + im2 + ii1 * s1 * s1 + ii2 * s2 * s2,
                ii1 * s1 + ii2 * s2,
                ii1 * s1 * a1 + ii2 * s2 * a2,
                if k22 == 0.0 { 1.0 } else { k22 },
                ii1 * a1 + ii2 * a2,
                im1 + im2 + ii1 * a1 * a1 + ii2 * a2 * a2,
            );
            k.solve33(-Vector3::new(c1.x, c1.y, c2))
        } else {
            let k22 = ii1 + ii2;
            let k = SdpMatrix2::new(
                im1 + im2 + ii1 * s1 * s1 + ii2 * s2 * s2,
                ii1 * s1 + ii2 * s2,
                if k22 == 0.0 { 1.0 } else { k22 },
            );
            let impulse2 = k.solve(-c1);
            Vector3::new(impulse2.x, impulse2.y, 0.0)
        };

        let p = perp * impulse.x + axis * impulse.z;
        let l1 = impulse.x * s1 + impulse.y + impulse.z * a1;
        let l2 = impulse.x * s2 + impulse.y + impulse.z * a2;

        position1.c -= p * im1;
        position1.a -= ii1 * l1;
        position2.c += p * im2;
        position2.a += ii2 * l2;

        data.positions[self.index1] = position1;
        data.positions[self.index2] = position2;

        linear_error <= data.params.allowed_linear_error
            && angular_error <= data.params.allowed_angular_error
    }

    /// The force applied by this joint over the last step, given the inverse
    /// timestep length of that step.
    pub fn reaction_force(&self, inv_dt: Real) -> Vector<Real> {
        (self.perp * self.impulse.x + self.axis * (self.motor_impulse + self.impulse.z)) * inv_dt
    }

    /// The torque applied by this joint over the last step.
    pub fn reaction_torque(&self, inv_dt: Real) -> Real {
        self.impulse.y * inv_dt
    }
}
