use crate::dynamics::solver::SolverData;
use crate::dynamics::RigidBody;
use crate::math::{Point, Real, Vector};
use crate::utils::{self, WBasis, WCross, WDot};
use na::{RealField, Unit};

/// A joint that constrains a point of the second body to a line fixed in
/// the first body's frame, with a spring-damper suspension along the line
/// and an optional angular motor.
///
/// The perpendicular direction is rigid (the wheel stays on its axle line);
/// the translation along the axis is only restrained by the suspension
/// spring; the relative rotation is free and can be motorized.
#[derive(Copy, Clone, Debug)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct WheelJoint {
    /// Where the joint is attached on the first body, expressed in the first
    /// body's local frame.
    pub local_anchor1: Point<Real>,
    /// Where the joint is attached on the second body, expressed in the
    /// second body's local frame.
    pub local_anchor2: Point<Real>,
    /// The suspension axis, expressed in the first body's local frame.
    pub local_axis1: Unit<Vector<Real>>,
    /// The suspension frequency, in Hertz.
    pub frequency: Real,
    /// The suspension damping ratio.
    pub damping_ratio: Real,
    /// Is the angular motor enabled?
    pub motor_enabled: bool,
    /// The angular velocity the motor tries to reach.
    pub motor_target_vel: Real,
    /// The maximum torque the motor can exert.
    pub motor_max_torque: Real,
    /// The accumulated impulse applied along the rigid (perpendicular)
    /// direction.
    pub impulse: Real,
    /// The accumulated impulse applied by the suspension spring.
    pub spring_impulse: Real,
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
    ax: Vector<Real>,
    ay: Vector<Real>,
    s_ax: Real,
    s_bx: Real,
    s_ay: Real,
    s_by: Real,
    mass: Real,
    motor_mass: Real,
    spring_mass: Real,
    bias: Real,
    gamma: Real,
}

impl WheelJoint {
    /// Creates a new wheel joint from the local anchors and the local
    /// suspension axis of the first body.
    pub fn new(
        local_anchor1: Point<Real>,
        local_anchor2: Point<Real>,
        local_axis1: Unit<Vector<Real>>,
    ) -> Self {
        Self {
            local_anchor1,
            local_anchor2,
            local_axis1,
            frequency: 2.0,
            damping_ratio: 0.7,
            motor_enabled: false,
            motor_target_vel: 0.0,
            motor_max_torque: 0.0,
            impulse: 0.0,
            spring_impulse: 0.0,
            motor_impulse: 0.0,
            index1: 0,
            index2: 0,
            local_com1: Point::origin(),
            local_com2: Point::origin(),
            im1: 0.0,
            im2: 0.0,
            ii1: 0.0,
            ii2: 0.0,
            ax: na::zero(),
            ay: na::zero(),
            s_ax: 0.0,
            s_bx: 0.0,
            s_ay: 0.0,
            s_by: 0.0,
            mass: 0.0,
            motor_mass: 0.0,
            spring_mass: 0.0,
            bias: 0.0,
            gamma: 0.0,
        }
    }

    /// Creates a new wheel joint from a world-space anchor and suspension
    /// axis.
    pub fn from_world_frame(
        rb1: &RigidBody,
        rb2: &RigidBody,
        anchor: Point<Real>,
        axis: Unit<Vector<Real>>,
    ) -> Self {
        let local_anchor1 = rb1.position().inverse_transform_point(&anchor);
        let local_anchor2 = rb2.position().inverse_transform_point(&anchor);
        let local_axis1 = Unit::new_unchecked(rb1.position().inverse_transform_vector(&axis));
        Self::new(local_anchor1, local_anchor2, local_axis1)
    }

    /// Configures the suspension spring of this joint.
    pub fn with_suspension(mut self, frequency: Real, damping_ratio: Real) -> Self {
        assert!(
            frequency >= 0.0 && damping_ratio >= 0.0,
            "The suspension frequency and damping ratio cannot be negative."
        );
        self.frequency = frequency;
        self.damping_ratio = damping_ratio;
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

        /*
         * Rigid point-on-line constraint, perpendicular to the axis.
         */
        self.ay = (q1 * self.local_axis1.into_inner()).orthonormal_vector();
        self.s_ay = (d + r1).gcross(self.ay);
        self.s_by = r2.gcross(self.ay);
        self.mass = utils::inv(
            im1 + im2 + ii1 * self.s_ay * self.s_ay + ii2 * self.s_by * self.s_by,
        );

        /*
         * Suspension spring along the axis.
         */
        self.ax = q1 * self.local_axis1.into_inner();
        self.s_ax = (d + r1).gcross(self.ax);
        self.s_bx = r2.gcross(self.ax);

        self.spring_mass = 0.0;
        self.bias = 0.0;
        self.gamma = 0.0;
        if self.frequency > 0.0 {
            let inv_mass = im1 + im2 + ii1 * self.s_ax * self.s_ax + ii2 * self.s_bx * self.s_bx;
            if inv_mass > 0.0 {
                self.spring_mass = 1.0 / inv_mass;

                let c = d.gdot(self.ax);
                let omega = Real::two_pi() * self.frequency;
                let damp = 2.0 * self.spring_mass * self.damping_ratio * omega;
                let k = self.spring_mass * omega * omega;
                let h = data.dt();
                self.gamma = utils::inv(h * (damp + h * k));
                self.bias = c * h * k * self.gamma;
                self.spring_mass = utils::inv(inv_mass + self.gamma);
            }
        } else {
            self.spring_impulse = 0.0;
        }

        /*
         * Angular motor.
         */
        if self.motor_enabled {
            self.motor_mass = utils::inv(ii1 + ii2);
        } else {
            self.motor_mass = 0.0;
            self.motor_impulse = 0.0;
        }

        self.impulse *= data.warmstart_factor();
        self.spring_impulse *= data.warmstart_factor();
        self.motor_impulse *= data.warmstart_factor();

        let p = self.ay * self.impulse + self.ax * self.spring_impulse;
        let l1 = self.impulse * self.s_ay + self.spring_impulse * self.s_ax + self.motor_impulse;
        let l2 = self.impulse * self.s_by + self.spring_impulse * self.s_bx + self.motor_impulse;

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
         * Suspension spring.
         */
        {
            let cdot = self.ax.gdot(vels2.linvel - vels1.linvel) + self.s_bx * vels2.angvel
                - self.s_ax * vels1.angvel;
            let impulse =
                -self.spring_mass * (cdot + self.bias + self.gamma * self.spring_impulse);
            self.spring_impulse += impulse;

            let p = self.ax * impulse;
            vels1.linvel -= p * im1;
            vels1.angvel -= ii1 * impulse * self.s_ax;
            vels2.linvel += p * im2;
            vels2.angvel += ii2 * impulse * self.s_bx;
        }

        /*
         * Angular motor.
         */
        {
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
         * Rigid point-on-line constraint.
         */
        {
            let cdot = self.ay.gdot(vels2.linvel - vels1.linvel) + self.s_by * vels2.angvel
                - self.s_ay * vels1.angvel;
            let impulse = -self.mass * cdot;
            self.impulse += impulse;

            let p = self.ay * impulse;
            vels1.linvel -= p * im1;
            vels1.angvel -= ii1 * impulse * self.s_ay;
            vels2.linvel += p * im2;
            vels2.angvel += ii2 * impulse * self.s_by;
        }

        data.velocities[self.index1] = vels1;
        data.velocities[self.index2] = vels2;
    }

    pub(crate) fn solve_position_constraints(&mut self, data: &mut SolverData) -> bool {
        let mut position1 = data.positions[self.index1];
        let mut position2 = data.positions[self.index2];
        let q1 = position1.rotation();
        let q2 = position2.rotation();

        let r1 = q1 * (self.local_anchor1 - self.local_com1);
        let r2 = q2 * (self.local_anchor2 - self.local_com2);
        let d = (position2.c - position1.c) + (r2 - r1);

        let ay = (q1 * self.local_axis1.into_inner()).orthonormal_vector();
        let s_ay = (d + r1).gcross(ay);
        let s_by = r2.gcross(ay);

        let c = d.gdot(ay);
        let k = self.im1 + self.im2 + self.ii1 * s_ay * s_ay + self.ii2 * s_by * s_by;
        let impulse = if k != 0.0 { -c / k } else { 0.0 };

        let p = ay * impulse;
        position1.c -= p * self.im1;
        position1.a -= self.ii1 * impulse * s_ay;
        position2.c += p * self.im2;
        position2.a += self.ii2 * impulse * s_by;

        data.positions[self.index1] = position1;
        data.positions[self.index2] = position2;

        c.abs() <= data.params.allowed_linear_error
    }

    /// The force applied by this joint over the last step, given the inverse
    /// timestep length of that step.
    pub fn reaction_force(&self, inv_dt: Real) -> Vector<Real> {
        (self.ay * self.impulse + self.ax * self.spring_impulse) * inv_dt
    }

    /// The torque applied by the motor over the last step.
    pub fn reaction_torque(&self, inv_dt: Real) -> Real {
        self.motor_impulse * inv_dt
    }
}
