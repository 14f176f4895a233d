use crate::dynamics::solver::SolverData;
use crate::dynamics::RigidBody;
use crate::math::{Point, Real, Vector};
use crate::utils::{self, WCross, WDot};

/// A joint that couples two bodies through an idealized pulley: each body
/// hangs from a fixed ground anchor, and the combined cable length
/// `length1 + ratio * length2` is held constant.
///
/// A ratio different from `1.0` makes the pulley a block-and-tackle: one
/// side moves `ratio` times faster than the other and transmits `1/ratio`
/// times the force.
#[derive(Copy, Clone, Debug)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct PulleyJoint {
    /// The world-space point the first body hangs from.
    pub ground_anchor1: Point<Real>,
    /// The world-space point the second body hangs from.
    pub ground_anchor2: Point<Real>,
    /// Where the cable is attached on the first body, expressed in the first
    /// body's local frame.
    pub local_anchor1: Point<Real>,
    /// Where the cable is attached on the second body, expressed in the
    /// second body's local frame.
    pub local_anchor2: Point<Real>,
    /// The reference length of the first cable segment.
    pub length1: Real,
    /// The reference length of the second cable segment.
    pub length2: Real,
    /// The transmission ratio between the two segments.
    pub ratio: Real,
    /// The accumulated impulse applied by this joint.
    pub impulse: Real,

    // `length1 + ratio * length2`, captured at construction.
    constant: Real,

    // Solver state, populated by `init_velocity_constraints`.
    index1: usize,
    index2: usize,
    local_com1: Point<Real>,
    local_com2: Point<Real>,
    im1: Real,
    im2: Real,
    ii1: Real,
    ii2: Real,
    u1: Vector<Real>,
    u2: Vector<Real>,
    r1: Vector<Real>,
    r2: Vector<Real>,
    mass: Real,
}

impl PulleyJoint {
    /// Creates a new pulley joint from the ground anchors, the world-space
    /// body anchors, and the transmission ratio.
    ///
    /// The current segment lengths are captured as the reference lengths.
    pub fn new(
        rb1: &RigidBody,
        rb2: &RigidBody,
        ground_anchor1: Point<Real>,
        ground_anchor2: Point<Real>,
        anchor1: Point<Real>,
        anchor2: Point<Real>,
        ratio: Real,
    ) -> Self {
        assert!(ratio != 0.0, "The pulley ratio cannot be zero.");

        let length1 = (anchor1 - ground_anchor1).norm();
        let length2 = (anchor2 - ground_anchor2).norm();

        Self {
            ground_anchor1,
            ground_anchor2,
            local_anchor1: rb1.position().inverse_transform_point(&anchor1),
            local_anchor2: rb2.position().inverse_transform_point(&anchor2),
            length1,
            length2,
            ratio,
            impulse: 0.0,
            constant: length1 + ratio * length2,
            index1: 0,
            index2: 0,
            local_com1: Point::origin(),
            local_com2: Point::origin(),
            im1: 0.0,
            im2: 0.0,
            ii1: 0.0,
            ii2: 0.0,
            u1: na::zero(),
            u2: na::zero(),
            r1: na::zero(),
            r2: na::zero(),
            mass: 0.0,
        }
    }

    /// The current length of the first cable segment.
    pub fn current_length1(&self, rb1: &RigidBody) -> Real {
        let anchor = rb1.position().transform_point(&self.local_anchor1);
        (anchor - self.ground_anchor1).norm()
    }

    /// The current length of the second cable segment.
    pub fn current_length2(&self, rb2: &RigidBody) -> Real {
        let anchor = rb2.position().transform_point(&self.local_anchor2);
        (anchor - self.ground_anchor2).norm()
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

        self.u1 = (position1.c + self.r1) - self.ground_anchor1;
        self.u2 = (position2.c + self.r2) - self.ground_anchor2;

        let length1 = self.u1.norm();
        let length2 = self.u2.norm();

        // A segment collapsed onto its ground anchor has no direction to
        // pull along.
        if length1 > 10.0 * data.params.allowed_linear_error {
            self.u1 /= length1;
        } else {
            self.u1 = na::zero();
        }
        if length2 > 10.0 * data.params.allowed_linear_error {
            self.u2 /= length2;
        } else {
            self.u2 = na::zero();
        }

        let cr1u1 = self.r1.gcross(self.u1);
        let cr2u2 = self.r2.gcross(self.u2);
        let mass1 = self.im1 + self.ii1 * cr1u1 * cr1u1;
        let mass2 = self.im2 + self.ii2 * cr2u2 * cr2u2;
        self.mass = utils::inv(mass1 + self.ratio * self.ratio * mass2);

        self.impulse *= data.warmstart_factor();

        let p1 = self.u1 * -self.impulse;
        let p2 = self.u2 * (-self.ratio * self.impulse);

        let mut vels1 = data.velocities[self.index1];
        let mut vels2 = data.velocities[self.index2];
        vels1.linvel += p1 * self.im1;
        vels1.angvel += self.ii1 * self.r1.gcross(p1);
        vels2.linvel += p2 * self.im2;
        vels2.angvel += self.ii2 * self.r2.gcross(p2);
        data.velocities[self.index1] = vels1;
        data.velocities[self.index2] = vels2;
    }

    pub(crate) fn solve_velocity_constraints(&mut self, data: &mut SolverData) {
        let mut vels1 = data.velocities[self.index1];
        let mut vels2 = data.velocities[self.index2];

        let vp1 = vels1.velocity_at_offset(self.r1);
        let vp2 = vels2.velocity_at_offset(self.r2);

        let cdot = -self.u1.gdot(vp1) - self.ratio * self.u2.gdot(vp2);
        let impulse = -self.mass * cdot;
        self.impulse += impulse;

        let p1 = self.u1 * -impulse;
        let p2 = self.u2 * (-self.ratio * impulse);
        vels1.linvel += p1 * self.im1;
        vels1.angvel += self.ii1 * self.r1.gcross(p1);
        vels2.linvel += p2 * self.im2;
        vels2.angvel += self.ii2 * self.r2.gcross(p2);

        data.velocities[self.index1] = vels1;
        data.velocities[self.index2] = vels2;
    }

    pub(crate) fn solve_position_constraints(&mut self, data: &mut SolverData) -> bool {
        let mut position1 = data.positions[self.index1];
        let mut position2 = data.positions[self.index2];

        let r1 = position1.rotation() * (self.local_anchor1 - self.local_com1);
        let r2 = position2.rotation() * (self.local_anchor2 - self.local_com2);

        let mut u1 = (position1.c + r1) - self.ground_anchor1;
        let mut u2 = (position2.c + r2) - self.ground_anchor2;

        let length1 = u1.norm();
        let length2 = u2.norm();

        if length1 > 10.0 * data.params.allowed_linear_error {
            u1 /= length1;
        } else {
            u1 = na::zero();
        }
        if length2 > 10.0 * data.params.allowed_linear_error {
            u2 /= length2;
        } else {
            u2 = na::zero();
        }

        let cr1u1 = r1.gcross(u1);
        let cr2u2 = r2.gcross(u2);
        let mass1 = self.im1 + self.ii1 * cr1u1 * cr1u1;
        let mass2 = self.im2 + self.ii2 * cr2u2 * cr2u2;
        let mass = utils::inv(mass1 + self.ratio * self.ratio * mass2);

        let c = na::clamp(
            self.constant - length1 - self.ratio * length2,
            -data.params.max_linear_correction,
            data.params.max_linear_correction,
        );
        let linear_error = c.abs();
        let impulse = -mass * c;

        let p1 = u1 * -impulse;
        let p2 = u2 * (-self.ratio * impulse);

        position1.c += p1 * self.im1;
        position1.a += self.ii1 * r1.gcross(p1);
        position2.c += p2 * self.im2;
        position2.a += self.ii2 * r2.gcross(p2);

        data.positions[self.index1] = position1;
        data.positions[self.index2] = position2;

        linear_error < data.params.allowed_linear_error
    }

    /// The force applied by this joint on the second body over the last
    /// step, given the inverse timestep length of that step.
    pub fn reaction_force(&self, inv_dt: Real) -> Vector<Real> {
        self.u2 * (self.impulse * inv_dt)
    }

    /// The torque applied by this joint over the last step: always zero.
    pub fn reaction_torque(&self, _inv_dt: Real) -> Real {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dynamics::RigidBodyBuilder;

    #[test]
    #[should_panic]
    fn zero_ratio_is_rejected() {
        let rb1 = RigidBodyBuilder::new_dynamic().build();
        let rb2 = RigidBodyBuilder::new_dynamic().translation(4.0, 0.0).build();
        let _ = PulleyJoint::new(
            &rb1,
            &rb2,
            Point::new(0.0, 3.0),
            Point::new(4.0, 3.0),
            Point::new(0.0, 0.0),
            Point::new(4.0, 0.0),
            0.0,
        );
    }

    #[test]
    fn segment_lengths_are_captured_at_construction() {
        let rb1 = RigidBodyBuilder::new_dynamic().build();
        let rb2 = RigidBodyBuilder::new_dynamic().translation(4.0, 0.0).build();
        let joint = PulleyJoint::new(
            &rb1,
            &rb2,
            Point::new(0.0, 3.0),
            Point::new(4.0, 5.0),
            Point::new(0.0, 0.0),
            Point::new(4.0, 0.0),
            2.0,
        );
        assert_eq!(joint.length1, 3.0);
        assert_eq!(joint.length2, 5.0);
        assert_eq!(joint.current_length1(&rb1), 3.0);
    }
}
