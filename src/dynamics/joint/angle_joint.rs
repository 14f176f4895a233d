use crate::dynamics::solver::SolverData;
use crate::dynamics::RigidBody;
use crate::math::Real;
use crate::utils;
use na::RealField;

/// A joint that locks the relative angle between two bodies, with no
/// positional coupling at all.
///
/// This is a cheap substitute for a full weld when only the orientation
/// matters: one scalar row instead of a 3x3 block. A positive `frequency`
/// softens the lock into a rotational spring-damper.
#[derive(Copy, Clone, Debug)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct AngleJoint {
    /// The relative angle this joint maintains.
    pub reference_angle: Real,
    /// The spring frequency, in Hertz. Zero or negative keeps the lock
    /// rigid.
    pub frequency: Real,
    /// The spring damping ratio.
    pub damping_ratio: Real,
    /// The accumulated impulse applied by this joint.
    pub impulse: Real,

    // Solver state, populated by `init_velocity_constraints`.
    index1: usize,
    index2: usize,
    ii1: Real,
    ii2: Real,
    mass: Real,
    gamma: Real,
    bias: Real,
}

impl AngleJoint {
    /// Creates a new angle joint maintaining the given relative angle.
    pub fn new(reference_angle: Real) -> Self {
        Self {
            reference_angle,
            frequency: 0.0,
            damping_ratio: 0.0,
            impulse: 0.0,
            index1: 0,
            index2: 0,
            ii1: 0.0,
            ii2: 0.0,
            mass: 0.0,
            gamma: 0.0,
            bias: 0.0,
        }
    }

    /// Creates a new angle joint freezing the current relative angle of the
    /// two bodies.
    pub fn from_current_angle(rb1: &RigidBody, rb2: &RigidBody) -> Self {
        Self::new(rb2.sweep().a - rb1.sweep().a)
    }

    /// Softens the lock into a rotational spring-damper.
    pub fn with_spring(mut self, frequency: Real, damping_ratio: Real) -> Self {
        assert!(
            frequency >= 0.0 && damping_ratio >= 0.0,
            "The spring frequency and damping ratio cannot be negative."
        );
        self.frequency = frequency;
        self.damping_ratio = damping_ratio;
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
        self.ii1 = rb1.effective_inv_inertia;
        self.ii2 = rb2.effective_inv_inertia;

        let position1 = data.positions[self.index1];
        let position2 = data.positions[self.index2];

        let mut inv_mass = self.ii1 + self.ii2;

        if self.frequency > 0.0 {
            let c = position2.a - position1.a - self.reference_angle;
            let m = utils::inv(inv_mass);
            let omega = Real::two_pi() * self.frequency;
            let d = 2.0 * m * self.damping_ratio * omega;
            let k = m * omega * omega;
            let h = data.dt();
            self.gamma = utils::inv(h * (d + h * k));
            self.bias = c * h * k * self.gamma;
            inv_mass += self.gamma;
        } else {
            self.gamma = 0.0;
            self.bias = 0.0;
        }

        self.mass = utils::inv(inv_mass);

        self.impulse *= data.warmstart_factor();

        let mut vels1 = data.velocities[self.index1];
        let mut vels2 = data.velocities[self.index2];
        vels1.angvel -= self.ii1 * self.impulse;
        vels2.angvel += self.ii2 * self.impulse;
        data.velocities[self.index1] = vels1;
        data.velocities[self.index2] = vels2;
    }

    pub(crate) fn solve_velocity_constraints(&mut self, data: &mut SolverData) {
        let mut vels1 = data.velocities[self.index1];
        let mut vels2 = data.velocities[self.index2];

        let cdot = vels2.angvel - vels1.angvel;
        let impulse = -self.mass * (cdot + self.bias + self.gamma * self.impulse);
        self.impulse += impulse;

        vels1.angvel -= self.ii1 * impulse;
        vels2.angvel += self.ii2 * impulse;

        data.velocities[self.index1] = vels1;
        data.velocities[self.index2] = vels2;
    }

    pub(crate) fn solve_position_constraints(&mut self, data: &mut SolverData) -> bool {
        if self.frequency > 0.0 {
            // The spring absorbs the drift; there is nothing to correct.
            return true;
        }

        let mut position1 = data.positions[self.index1];
        let mut position2 = data.positions[self.index2];

        let c = na::clamp(
            position2.a - position1.a - self.reference_angle,
            -data.params.max_angular_correction,
            data.params.max_angular_correction,
        );
        let impulse = -utils::inv(self.ii1 + self.ii2) * c;

        position1.a -= self.ii1 * impulse;
        position2.a += self.ii2 * impulse;

        data.positions[self.index1] = position1;
        data.positions[self.index2] = position2;

        c.abs() <= data.params.allowed_angular_error
    }

    /// The force applied by this joint over the last step: always zero, the
    /// angle constraint has no linear part.
    pub fn reaction_force(&self, _inv_dt: Real) -> crate::math::Vector<Real> {
        na::zero()
    }

    /// The torque applied by this joint over the last step.
    pub fn reaction_torque(&self, inv_dt: Real) -> Real {
        self.impulse * inv_dt
    }
}
