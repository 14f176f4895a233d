use crate::dynamics::solver::SolverData;
use crate::dynamics::RigidBody;
use crate::math::{Point, Real, SdpMatrix2, Vector};
use crate::utils::{self, WCross};

/// A joint that drives the relative position and angle of two bodies toward
/// target offsets, under a force and torque budget.
///
/// The positional error is folded into the velocity bias (scaled by the
/// correction factor) instead of being position-corrected, and the
/// accumulated impulses are clamped to `max_force * dt` and
/// `max_torque * dt`: a motor joint can steer a body but never yank it.
#[derive(Copy, Clone, Debug)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct MotorJoint {
    /// The target position of the second body, expressed in the first
    /// body's frame.
    pub linear_offset: Vector<Real>,
    /// The target relative angle.
    pub angular_offset: Real,
    /// The maximum force the joint can exert to reach the linear target.
    pub max_force: Real,
    /// The maximum torque the joint can exert to reach the angular target.
    pub max_torque: Real,
    /// The fraction of the positional error fed back per step, in `[0, 1]`.
    pub correction_factor: Real,
    /// The accumulated linear impulse applied by this joint.
    pub linear_impulse: Vector<Real>,
    /// The accumulated angular impulse applied by this joint.
    pub angular_impulse: Real,

    // Solver state, populated by `init_velocity_constraints`.
    index1: usize,
    index2: usize,
    r1: Vector<Real>,
    r2: Vector<Real>,
    linear_error: Vector<Real>,
    angular_error: Real,
    im1: Real,
    im2: Real,
    ii1: Real,
    ii2: Real,
    linear_mass: SdpMatrix2,
    angular_mass: Real,
}

impl MotorJoint {
    /// Creates a new motor joint holding the two bodies in their current
    /// relative pose.
    pub fn new(rb1: &RigidBody, rb2: &RigidBody) -> Self {
        let linear_offset = rb1
            .position()
            .inverse_transform_point(&Point::from(rb2.position().translation.vector))
            .coords;
        let angular_offset = rb2.sweep().a - rb1.sweep().a;

        Self {
            linear_offset,
            angular_offset,
            max_force: 1.0,
            max_torque: 1.0,
            correction_factor: 0.3,
            linear_impulse: na::zero(),
            angular_impulse: 0.0,
            index1: 0,
            index2: 0,
            r1: na::zero(),
            r2: na::zero(),
            linear_error: na::zero(),
            angular_error: 0.0,
            im1: 0.0,
            im2: 0.0,
            ii1: 0.0,
            ii2: 0.0,
            linear_mass: SdpMatrix2::zero(),
            angular_mass: 0.0,
        }
    }

    /// Sets the force and torque budget of this joint.
    pub fn with_max_force_and_torque(mut self, max_force: Real, max_torque: Real) -> Self {
        assert!(
            max_force >= 0.0 && max_torque >= 0.0,
            "The maximum force and torque cannot be negative."
        );
        self.max_force = max_force;
        self.max_torque = max_torque;
        self
    }

    /// Sets the fraction of the positional error fed back per step.
    pub fn with_correction_factor(mut self, correction_factor: Real) -> Self {
        assert!(
            (0.0..=1.0).contains(&correction_factor),
            "The correction factor must lie in [0, 1]."
        );
        self.correction_factor = correction_factor;
        self
    }

    pub(crate) fn init_velocity_constraints(
        &mut self,
        rb1: &RigidBody,
        rb2: &RigidBody,
        data: &mut SolverData,
    ) {
        self.index1 = rb1.active_set_offset;
        self.index2 = rb2.active_set_offset;
        self.im1 = rb1.effective_inv_mass;
        self.im2 = rb2.effective_inv_mass;
        self.ii1 = rb1.effective_inv_inertia;
        self.ii2 = rb2.effective_inv_inertia;

        let position1 = data.positions[self.index1];
        let position2 = data.positions[self.index2];
        let q1 = position1.rotation();
        let q2 = position2.rotation();

        self.r1 = q1 * -rb1.local_com().coords;
        self.r2 = q2 * -rb2.local_com().coords;

        let (im1, im2, ii1, ii2) = (self.im1, self.im2, self.ii1, self.ii2);
        let (r1, r2) = (self.r1, self.r2);

        self.linear_mass = SdpMatrix2::new(
            im1 + im2 + ii1 * r1.y * r1.y + ii2 * r2.y * r2.y,
            -ii1 * r1.x * r1.y - ii2 * r2.x * r2.y,
            im1 + im2 + ii1 * r1.x * r1.x + ii2 * r2.x * r2.x,
        )
        .inverse_unchecked();
        self.angular_mass = utils::inv(ii1 + ii2);

        self.linear_error = (position2.c + r2) - (position1.c + r1) - q1 * self.linear_offset;
        self.angular_error = position2.a - position1.a - self.angular_offset;

        self.linear_impulse *= data.warmstart_factor();
        self.angular_impulse *= data.warmstart_factor();

        let p = self.linear_impulse;
        let mut vels1 = data.velocities[self.index1];
        let mut vels2 = data.velocities[self.index2];
        vels1.linvel -= p * im1;
        vels1.angvel -= ii1 * (r1.gcross(p) + self.angular_impulse);
        vels2.linvel += p * im2;
        vels2.angvel += ii2 * (r2.gcross(p) + self.angular_impulse);
        data.velocities[self.index1] = vels1;
        data.velocities[self.index2] = vels2;
    }

    pub(crate) fn solve_velocity_constraints(&mut self, data: &mut SolverData) {
        let mut vels1 = data.velocities[self.index1];
        let mut vels2 = data.velocities[self.index2];

        let (im1, im2, ii1, ii2) = (self.im1, self.im2, self.ii1, self.ii2);
        let h = data.dt();
        let inv_h = data.inv_dt();

        /*
         * Angular part.
         */
        {
            let cdot = vels2.angvel - vels1.angvel
                + inv_h * self.correction_factor * self.angular_error;
            let impulse = -self.angular_mass * cdot;

            let old_impulse = self.angular_impulse;
            let max_impulse = self.max_torque * h;
            self.angular_impulse = na::clamp(old_impulse + impulse, -max_impulse, max_impulse);
            let impulse = self.angular_impulse - old_impulse;

            vels1.angvel -= ii1 * impulse;
            vels2.angvel += ii2 * impulse;
        }

        /*
         * Linear part.
         */
        {
            let cdot = vels2.velocity_at_offset(self.r2) - vels1.velocity_at_offset(self.r1)
                + self.linear_error * (inv_h * self.correction_factor);
            let impulse = -(self.linear_mass * cdot);

            let old_impulse = self.linear_impulse;
            self.linear_impulse += impulse;

            let max_impulse = self.max_force * h;
            if self.linear_impulse.norm_squared() > max_impulse * max_impulse {
                self.linear_impulse *= max_impulse / self.linear_impulse.norm();
            }
            let impulse = self.linear_impulse - old_impulse;

            vels1.linvel -= impulse * im1;
            vels1.angvel -= ii1 * self.r1.gcross(impulse);
            vels2.linvel += impulse * im2;
            vels2.angvel += ii2 * self.r2.gcross(impulse);
        }

        data.velocities[self.index1] = vels1;
        data.velocities[self.index2] = vels2;
    }

    pub(crate) fn solve_position_constraints(&mut self, _data: &mut SolverData) -> bool {
        // The positional feedback lives entirely in the velocity bias.
        true
    }

    /// The force applied by this joint over the last step, given the inverse
    /// timestep length of that step.
    pub fn reaction_force(&self, inv_dt: Real) -> Vector<Real> {
        self.linear_impulse * inv_dt
    }

    /// The torque applied by this joint over the last step.
    pub fn reaction_torque(&self, inv_dt: Real) -> Real {
        self.angular_impulse * inv_dt
    }
}
