use crate::dynamics::solver::SolverData;
use crate::dynamics::RigidBody;
use crate::math::{Point, Real, Vector};
use crate::utils::{self, WCross, WDot};
use na::RealField;

/// A joint that keeps two anchor points at a fixed distance.
///
/// With a positive `frequency` the distance becomes a spring-damper instead
/// of a rigid rod: the constraint is softened using the standard
/// mass-spring-damper discretization and never position-corrected.
#[derive(Copy, Clone, Debug)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct DistanceJoint {
    /// Where the joint is attached on the first body, expressed in the first
    /// body's local frame.
    pub local_anchor1: Point<Real>,
    /// Where the joint is attached on the second body, expressed in the
    /// second body's local frame.
    pub local_anchor2: Point<Real>,
    /// The distance the joint tries to maintain between the two anchors.
    pub rest_length: Real,
    /// The spring frequency, in Hertz. Zero or negative disables softness:
    /// the joint behaves as a rigid rod.
    pub frequency: Real,
    /// The spring damping ratio: 0 = undamped, 1 = critically damped.
    pub damping_ratio: Real,
    /// The accumulated impulse applied by this joint, along the separation
    /// axis.
    pub impulse: Real,

    // Solver state, populated by `init_velocity_constraints`.
    index1: usize,
    index2: usize,
    local_com1: Point<Real>,
    local_com2: Point<Real>,
    im1: Real,
    im2: Real,
    ii1: Real,
    ii2: Real,
    u: Vector<Real>,
    r1: Vector<Real>,
    r2: Vector<Real>,
    mass: Real,
    gamma: Real,
    bias: Real,
}

impl DistanceJoint {
    /// Creates a new distance joint from the local anchors and the length it
    /// should maintain.
    pub fn new(local_anchor1: Point<Real>, local_anchor2: Point<Real>, rest_length: Real) -> Self {
        Self {
            local_anchor1,
            local_anchor2,
            rest_length,
            frequency: 0.0,
            damping_ratio: 0.0,
            impulse: 0.0,
            index1: 0,
            index2: 0,
            local_com1: Point::origin(),
            local_com2: Point::origin(),
            im1: 0.0,
            im2: 0.0,
            ii1: 0.0,
            ii2: 0.0,
            u: na::zero(),
            r1: na::zero(),
            r2: na::zero(),
            mass: 0.0,
            gamma: 0.0,
            bias: 0.0,
        }
    }

    /// Creates a new distance joint from two world-space anchors, capturing
    /// their current separation as the rest length.
    pub fn from_world_anchors(
        rb1: &RigidBody,
        rb2: &RigidBody,
        anchor1: Point<Real>,
        anchor2: Point<Real>,
    ) -> Self {
        let local_anchor1 = rb1.position().inverse_transform_point(&anchor1);
        let local_anchor2 = rb2.position().inverse_transform_point(&anchor2);
        let rest_length = (anchor2 - anchor1).norm();
        Self::new(local_anchor1, local_anchor2, rest_length)
    }

    /// Configures the spring behavior of this joint.
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

        self.r1 = q1 * (self.local_anchor1 - self.local_com1);
        self.r2 = q2 * (self.local_anchor2 - self.local_com2);
        self.u = (position2.c + self.r2) - (position1.c + self.r1);

        // A near-zero separation has no meaningful direction: the constraint
        // is silenced for this step instead of dividing by the length.
        let length = self.u.norm();
        if length > data.params.allowed_linear_error {
            self.u /= length;
        } else {
            self.u = na::zero();
        }

        let cr1u = self.r1.gcross(self.u);
        let cr2u = self.r2.gcross(self.u);
        let mut inv_mass =
            self.im1 + self.im2 + self.ii1 * cr1u * cr1u + self.ii2 * cr2u * cr2u;
        self.mass = utils::inv(inv_mass);

        if self.frequency > 0.0 {
            let c = length - self.rest_length;
            let omega = Real::two_pi() * self.frequency;
            let d = 2.0 * self.mass * self.damping_ratio * omega;
            let k = self.mass * omega * omega;
            let h = data.dt();
            self.gamma = utils::inv(h * (d + h * k));
            self.bias = c * h * k * self.gamma;
            inv_mass += self.gamma;
            self.mass = utils::inv(inv_mass);
        } else {
            self.gamma = 0.0;
            self.bias = 0.0;
        }

        // Warm-start with the impulse carried from the previous step,
        // rescaled for a possibly different timestep length.
        self.impulse *= data.warmstart_factor();

        let p = self.u * self.impulse;
        let mut vels1 = data.velocities[self.index1];
        let mut vels2 = data.velocities[self.index2];
        vels1.linvel -= p * self.im1;
        vels1.angvel -= self.ii1 * self.r1.gcross(p);
        vels2.linvel += p * self.im2;
        vels2.angvel += self.ii2 * self.r2.gcross(p);
        data.velocities[self.index1] = vels1;
        data.velocities[self.index2] = vels2;
    }

    pub(crate) fn solve_velocity_constraints(&mut self, data: &mut SolverData) {
        let mut vels1 = data.velocities[self.index1];
        let mut vels2 = data.velocities[self.index2];

        let vp1 = vels1.velocity_at_offset(self.r1);
        let vp2 = vels2.velocity_at_offset(self.r2);
        let cdot = self.u.gdot(vp2 - vp1);

        let impulse = -self.mass * (cdot + self.bias + self.gamma * self.impulse);
        self.impulse += impulse;

        let p = self.u * impulse;
        vels1.linvel -= p * self.im1;
        vels1.angvel -= self.ii1 * self.r1.gcross(p);
        vels2.linvel += p * self.im2;
        vels2.angvel += self.ii2 * self.r2.gcross(p);

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
        let q1 = position1.rotation();
        let q2 = position2.rotation();

        let r1 = q1 * (self.local_anchor1 - self.local_com1);
        let r2 = q2 * (self.local_anchor2 - self.local_com2);
        let mut u = (position2.c + r2) - (position1.c + r1);

        let length = u.norm();
        if length > data.params.allowed_linear_error {
            u /= length;
        } else {
            u = na::zero();
        }

        let cr1u = r1.gcross(u);
        let cr2u = r2.gcross(u);
        let mass = utils::inv(
            self.im1 + self.im2 + self.ii1 * cr1u * cr1u + self.ii2 * cr2u * cr2u,
        );

        let c = na::clamp(
            length - self.rest_length,
            -data.params.max_linear_correction,
            data.params.max_linear_correction,
        );
        let impulse = -mass * c;

        let p = u * impulse;
        position1.c -= p * self.im1;
        position1.a -= self.ii1 * r1.gcross(p);
        position2.c += p * self.im2;
        position2.a += self.ii2 * r2.gcross(p);

        data.positions[self.index1] = position1;
        data.positions[self.index2] = position2;

        c.abs() < data.params.allowed_linear_error
    }

    /// The force applied by this joint over the last step, given the inverse
    /// timestep length of that step.
    pub fn reaction_force(&self, inv_dt: Real) -> Vector<Real> {
        self.u * (self.impulse * inv_dt)
    }

    /// The torque applied by this joint over the last step: always zero, the
    /// distance constraint has no angular part.
    pub fn reaction_torque(&self, _inv_dt: Real) -> Real {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dynamics::RigidBodyBuilder;
    use approx::assert_relative_eq;

    #[test]
    fn world_anchor_construction_round_trips_the_length() {
        let rb1 = RigidBodyBuilder::new_dynamic().translation(0.0, 0.0).build();
        let rb2 = RigidBodyBuilder::new_dynamic().translation(5.0, 0.0).build();
        let joint = DistanceJoint::from_world_anchors(
            &rb1,
            &rb2,
            Point::new(0.0, 0.0),
            Point::new(5.0, 0.0),
        );
        assert_eq!(joint.rest_length, 5.0);

        let rb3 = RigidBodyBuilder::new_dynamic()
            .translation(1.0, 2.0)
            .rotation(0.7)
            .build();
        let anchor = Point::new(-0.5, 3.0);
        let joint = DistanceJoint::from_world_anchors(&rb3, &rb2, anchor, Point::new(5.0, 0.0));
        // The local anchor must map back onto the world anchor it came from.
        assert_relative_eq!(
            rb3.position().transform_point(&joint.local_anchor1),
            anchor,
            epsilon = 1.0e-5
        );
    }

    #[test]
    #[should_panic]
    fn negative_frequency_is_rejected() {
        let _ = DistanceJoint::new(Point::origin(), Point::origin(), 1.0).with_spring(-1.0, 0.5);
    }
}
