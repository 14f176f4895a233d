use crate::dynamics::joint::LimitState;
use crate::dynamics::solver::SolverData;
use crate::dynamics::RigidBody;
use crate::math::{Point, Real, SdpMatrix2, SdpMatrix3, Vector};
use crate::utils::{self, WCross};
use na::Vector3;

/// A joint that forces two anchor points to coincide while leaving the
/// relative rotation free, optionally limited and/or motorized.
///
/// The point constraint is always rigid (2 DOF). When the angle limit is
/// active the angular row is solved together with the point rows as one
/// 3x3 block, clamping the limit axis and re-solving the point rows while
/// the clamped value is held fixed.
#[derive(Copy, Clone, Debug)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct RevoluteJoint {
    /// Where the joint is attached on the first body, expressed in the first
    /// body's local frame.
    pub local_anchor1: Point<Real>,
    /// Where the joint is attached on the second body, expressed in the
    /// second body's local frame.
    pub local_anchor2: Point<Real>,
    /// The relative angle at which the joint coordinate reads zero.
    pub reference_angle: Real,
    /// Is the angle limit enabled?
    pub limits_enabled: bool,
    /// The `[lower, upper]` bounds of the relative angle, in radians.
    pub limits: [Real; 2],
    /// Is the angular motor enabled?
    pub motor_enabled: bool,
    /// The angular velocity the motor tries to reach.
    pub motor_target_vel: Real,
    /// The maximum torque the motor can exert.
    pub motor_max_torque: Real,
    /// The accumulated impulse applied by this joint: the point part in
    /// `x, y`, the limit part in `z`.
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
    r1: Vector<Real>,
    r2: Vector<Real>,
    mass: SdpMatrix3,
    motor_mass: Real,
    limit_state: LimitState,
}

impl RevoluteJoint {
    /// Creates a new revolute joint from the local anchors and the relative
    /// angle at which the joint coordinate reads zero.
    pub fn new(local_anchor1: Point<Real>, local_anchor2: Point<Real>, reference_angle: Real) -> Self {
        Self {
            local_anchor1,
            local_anchor2,
            reference_angle,
            limits_enabled: false,
            limits: [0.0, 0.0],
            motor_enabled: false,
            motor_target_vel: 0.0,
            motor_max_torque: 0.0,
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
            r1: na::zero(),
            r2: na::zero(),
            mass: SdpMatrix3::zero(),
            motor_mass: 0.0,
            limit_state: LimitState::Inactive,
        }
    }

    /// Creates a new revolute joint pinning the two bodies at the given
    /// world-space point, with the current relative angle as reference.
    pub fn from_world_anchor(rb1: &RigidBody, rb2: &RigidBody, anchor: Point<Real>) -> Self {
        let local_anchor1 = rb1.position().inverse_transform_point(&anchor);
        let local_anchor2 = rb2.position().inverse_transform_point(&anchor);
        let reference_angle = rb2.sweep().a - rb1.sweep().a;
        Self::new(local_anchor1, local_anchor2, reference_angle)
    }

    /// Enables the angle limit with the given `[lower, upper]` bounds.
    pub fn with_limits(mut self, limits: [Real; 2]) -> Self {
        assert!(
            limits[0] <= limits[1],
            "The lower angle limit cannot be greater than the upper limit."
        );
        self.limits_enabled = true;
        self.limits = limits;
        self
    }

    /// Enables the angular motor with the given target velocity and maximum
    /// torque.
    pub fn with_motor(mut self, target_vel: Real, max_torque: Real) -> Self {
        assert!(max_torque >= 0.0, "The maximum motor torque cannot be negative.");
        self.motor_enabled = true;
        self.motor_target_vel = target_vel;
        self.motor_max_torque = max_torque;
        self
    }

    /// The current joint angle relative to the reference angle.
    pub fn angle(&self, rb1: &RigidBody, rb2: &RigidBody) -> Real {
        rb2.sweep().a - rb1.sweep().a - self.reference_angle
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

        self.r1 = position1.rotation() * (self.local_anchor1 - self.local_com1);
        self.r2 = position2.rotation() * (self.local_anchor2 - self.local_com2);

        let (im1, im2, ii1, ii2) = (self.im1, self.im2, self.ii1, self.ii2);
        let (r1, r2) = (self.r1, self.r2);

        let fixed_rotation = ii1 + ii2 == 0.0;

        self.mass = SdpMatrix3::new(
            im1 + im2 + r1.y * r1.y * ii1 + r2.y * r2.y * ii2,
            -r1.y * r1.x * ii1 - r2.y * r2.x * ii2,
            -r1.y * ii1 - r2.y * ii2,
            im1 + im2 + r1.x * r1.x * ii1 + r2.x * r2.x * ii2,
            r1.x * ii1 + r2.x * ii2,
            ii1 + ii2,
        );
        self.motor_mass = utils::inv(ii1 + ii2);

        if !self.motor_enabled || fixed_rotation {
            self.motor_impulse = 0.0;
        }

        if self.limits_enabled && !fixed_rotation {
            let joint_angle = position2.a - position1.a - self.reference_angle;
            let [lower, upper] = self.limits;

            if (upper - lower).abs() < 2.0 * data.params.allowed_angular_error {
                self.limit_state = LimitState::Equal;
            } else if joint_angle <= lower {
                // Carrying an impulse across a state transition would apply
                // a stale constraint: reset it.
                if self.limit_state != LimitState::AtLower {
                    self.impulse.z = 0.0;
                }
                self.limit_state = LimitState::AtLower;
            } else if joint_angle >= upper {
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
        }

        self.impulse *= data.warmstart_factor();
        self.motor_impulse *= data.warmstart_factor();

        let p = Vector::new(self.impulse.x, self.impulse.y);
        let l = self.motor_impulse + self.impulse.z;

        let mut vels1 = data.velocities[self.index1];
        let mut vels2 = data.velocities[self.index2];
        vels1.linvel -= p * im1;
        vels1.angvel -= ii1 * (r1.gcross(p) + l);
        vels2.linvel += p * im2;
        vels2.angvel += ii2 * (r2.gcross(p) + l);
        data.velocities[self.index1] = vels1;
        data.velocities[self.index2] = vels2;
    }

    pub(crate) fn solve_velocity_constraints(&mut self, data: &mut SolverData) {
        let mut vels1 = data.velocities[self.index1];
        let mut vels2 = data.velocities[self.index2];

        let (im1, im2, ii1, ii2) = (self.im1, self.im2, self.ii1, self.ii2);
        let fixed_rotation = ii1 + ii2 == 0.0;

        /*
         * Motor constraint.
         */
        if self.motor_enabled && self.limit_state != LimitState::Equal && !fixed_rotation {
            let cdot = vels2.angvel - vels1.angvel - self.motor_target_vel;
            let impulse = -self.motor_mass * cdot;
            let old_impulse = self.motor_impulse;
            let max_impulse = self.motor_max_torque * data.dt();
            self.motor_impulse = na::clamp(old_impulse + impulse, -max_impulse, max_impulse);
            let impulse = self.motor_impulse - old_impulse;

            vels1.angvel -= ii1 * impulse;
            vels2.angvel += ii2 * impulse;
        }

        /*
         * Limit constraint, solved together with the point constraint as a
         * single 3x3 block.
         */
        if self.limits_enabled && self.limit_state != LimitState::Inactive && !fixed_rotation {
            let cdot1 = vels2.velocity_at_offset(self.r2) - vels1.velocity_at_offset(self.r1);
            let cdot2 = vels2.angvel - vels1.angvel;
            let cdot = Vector3::new(cdot1.x, cdot1.y, cdot2);
            let mut impulse = -self.mass.solve33(cdot);

            match self.limit_state {
                LimitState::Equal => {
                    self.impulse += impulse;
                }
                LimitState::AtLower => {
                    let new_impulse = self.impulse.z + impulse.z;
                    if new_impulse < 0.0 {
                        // Clamp the limit axis to zero, then re-solve the
                        // point rows with the clamped value held fixed.
                        let rhs = -cdot1
                            + Vector::new(self.mass.m13, self.mass.m23) * self.impulse.z;
                        let reduced = self.mass.solve22(rhs);
                        impulse.x = reduced.x;
                        impulse.y = reduced.y;
                        impulse.z = -self.impulse.z;
                        self.impulse.x += reduced.x;
                        self.impulse.y += reduced.y;
                        self.impulse.z = 0.0;
                    } else {
                        self.impulse += impulse;
                    }
                }
                LimitState::AtUpper => {
                    let new_impulse = self.impulse.z + impulse.z;
                    if new_impulse > 0.0 {
                        let rhs = -cdot1
                            + Vector::new(self.mass.m13, self.mass.m23) * self.impulse.z;
                        let reduced = self.mass.solve22(rhs);
                        impulse.x = reduced.x;
                        impulse.y = reduced.y;
                        impulse.z = -self.impulse.z;
                        self.impulse.x += reduced.x;
                        self.impulse.y += reduced.y;
                        self.impulse.z = 0.0;
                    } else {
                        self.impulse += impulse;
                    }
                }
                LimitState::Inactive => unreachable!(),
            }

            let p = Vector::new(impulse.x, impulse.y);
            vels1.linvel -= p * im1;
            vels1.angvel -= ii1 * (self.r1.gcross(p) + impulse.z);
            vels2.linvel += p * im2;
            vels2.angvel += ii2 * (self.r2.gcross(p) + impulse.z);
        } else {
            /*
             * Point constraint alone.
             */
            let cdot = vels2.velocity_at_offset(self.r2) - vels1.velocity_at_offset(self.r1);
            let impulse = self.mass.solve22(-cdot);

            self.impulse.x += impulse.x;
            self.impulse.y += impulse.y;

            vels1.linvel -= impulse * im1;
            vels1.angvel -= ii1 * self.r1.gcross(impulse);
            vels2.linvel += impulse * im2;
            vels2.angvel += ii2 * self.r2.gcross(impulse);
        }

        data.velocities[self.index1] = vels1;
        data.velocities[self.index2] = vels2;
    }

    pub(crate) fn solve_position_constraints(&mut self, data: &mut SolverData) -> bool {
        let mut position1 = data.positions[self.index1];
        let mut position2 = data.positions[self.index2];

        let (im1, im2, ii1, ii2) = (self.im1, self.im2, self.ii1, self.ii2);
        let fixed_rotation = ii1 + ii2 == 0.0;

        let mut angular_error = 0.0;

        /*
         * Angular limit correction.
         */
        if self.limits_enabled && self.limit_state != LimitState::Inactive && !fixed_rotation {
            let angle = position2.a - position1.a - self.reference_angle;
            let [lower, upper] = self.limits;
            let max_correction = data.params.max_angular_correction;
            let angular_slop = data.params.allowed_angular_error;
            let mut limit_impulse = 0.0;

            match self.limit_state {
                LimitState::Equal => {
                    let c = na::clamp(angle - lower, -max_correction, max_correction);
                    limit_impulse = -self.motor_mass * c;
                    angular_error = c.abs();
                }
                LimitState::AtLower => {
                    let mut c = angle - lower;
                    angular_error = -c;
                    c = na::clamp(c + angular_slop, -max_correction, 0.0);
                    limit_impulse = -self.motor_mass * c;
                }
                LimitState::AtUpper => {
                    let mut c = angle - upper;
                    angular_error = c;
                    c = na::clamp(c - angular_slop, 0.0, max_correction);
                    limit_impulse = -self.motor_mass * c;
                }
                LimitState::Inactive => unreachable!(),
            }

            position1.a -= ii1 * limit_impulse;
            position2.a += ii2 * limit_impulse;
        }

        /*
         * Point correction, with anchors recomputed from the corrected
         * angles.
         */
        let r1 = position1.rotation() * (self.local_anchor1 - self.local_com1);
        let r2 = position2.rotation() * (self.local_anchor2 - self.local_com2);
        let c = (position2.c + r2) - (position1.c + r1);
        let position_error = c.norm();

        let k = SdpMatrix2::new(
            im1 + im2 + ii1 * r1.y * r1.y + ii2 * r2.y * r2.y,
            -ii1 * r1.x * r1.y - ii2 * r2.x * r2.y,
            im1 + im2 + ii1 * r1.x * r1.x + ii2 * r2.x * r2.x,
        );
        let impulse = -k.solve(c);

        position1.c -= impulse * im1;
        position1.a -= ii1 * r1.gcross(impulse);
        position2.c += impulse * im2;
        position2.a += ii2 * r2.gcross(impulse);

        data.positions[self.index1] = position1;
        data.positions[self.index2] = position2;

        position_error <= data.params.allowed_linear_error
            && angular_error <= data.params.allowed_angular_error
    }

    /// The force applied by this joint over the last step, given the inverse
    /// timestep length of that step.
    pub fn reaction_force(&self, inv_dt: Real) -> Vector<Real> {
        Vector::new(self.impulse.x, self.impulse.y) * inv_dt
    }

    /// The torque applied by the angle limit over the last step. The motor
    /// torque is reported separately by [`Self::motor_torque`].
    pub fn reaction_torque(&self, inv_dt: Real) -> Real {
        self.impulse.z * inv_dt
    }

    /// The torque applied by the motor over the last step.
    pub fn motor_torque(&self, inv_dt: Real) -> Real {
        self.motor_impulse * inv_dt
    }
}
