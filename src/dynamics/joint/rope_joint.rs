use crate::dynamics::joint::LimitState;
use crate::dynamics::solver::SolverData;
use crate::dynamics::RigidBody;
use crate::math::{Point, Real, Vector};
use crate::utils::{self, WCross, WDot};

/// A joint that keeps two anchor points within a maximum distance.
///
/// The rope is unilateral: it can pull the bodies back together once taut,
/// but never pushes them apart. Under the maximum length the constraint is
/// inactive, apart from a predictive term that lets the rope react during
/// the step it becomes taut instead of one step late.
#[derive(Copy, Clone, Debug)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct RopeJoint {
    /// Where the rope is attached on the first body, expressed in the first
    /// body's local frame.
    pub local_anchor1: Point<Real>,
    /// Where the rope is attached on the second body, expressed in the
    /// second body's local frame.
    pub local_anchor2: Point<Real>,
    /// The maximum separation between the two anchors.
    pub max_length: Real,
    /// The accumulated impulse applied by this joint. Never positive: a rope
    /// only pulls.
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
    length: Real,
    state: LimitState,
}

impl RopeJoint {
    /// Creates a new rope joint from the local anchors and the maximum
    /// length it enforces.
    pub fn new(local_anchor1: Point<Real>, local_anchor2: Point<Real>, max_length: Real) -> Self {
        Self {
            local_anchor1,
            local_anchor2,
            max_length,
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
            length: 0.0,
            state: LimitState::Inactive,
        }
    }

    /// Creates a new rope joint from two world-space anchors, capturing
    /// their current separation as the maximum length.
    pub fn from_world_anchors(
        rb1: &RigidBody,
        rb2: &RigidBody,
        anchor1: Point<Real>,
        anchor2: Point<Real>,
    ) -> Self {
        let local_anchor1 = rb1.position().inverse_transform_point(&anchor1);
        let local_anchor2 = rb2.position().inverse_transform_point(&anchor2);
        let max_length = (anchor2 - anchor1).norm();
        Self::new(local_anchor1, local_anchor2, max_length)
    }

    /// The current separation between the anchors, as measured by the last
    /// constraint initialization.
    pub fn current_length(&self) -> Real {
        self.length
    }

    /// The current limit state of the rope: `AtUpper` when taut, `Inactive`
    /// when slack.
    pub fn limit_state(&self) -> LimitState {
        self.state
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
        self.u = (position2.c + self.r2) - (position1.c + self.r1);

        self.length = self.u.norm();

        let c = self.length - self.max_length;
        self.state = if c > 0.0 {
            LimitState::AtUpper
        } else {
            LimitState::Inactive
        };

        if self.length > data.params.allowed_linear_error {
            self.u /= self.length;
        } else {
            self.u = na::zero();
            self.mass = 0.0;
            self.impulse = 0.0;
            return;
        }

        let cr1u = self.r1.gcross(self.u);
        let cr2u = self.r2.gcross(self.u);
        let inv_mass = self.im1 + self.im2 + self.ii1 * cr1u * cr1u + self.ii2 * cr2u * cr2u;
        self.mass = utils::inv(inv_mass);

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
        let c = self.length - self.max_length;
        let mut cdot = self.u.gdot(vp2 - vp1);

        // Predictive constraint: while still slack, bias the velocity so the
        // rope starts resisting before the limit is actually violated.
        if c < 0.0 {
            cdot += data.inv_dt() * c;
        }

        let mut impulse = -self.mass * cdot;
        let old_impulse = self.impulse;
        self.impulse = (self.impulse + impulse).min(0.0);
        impulse = self.impulse - old_impulse;

        let p = self.u * impulse;
        vels1.linvel -= p * self.im1;
        vels1.angvel -= self.ii1 * self.r1.gcross(p);
        vels2.linvel += p * self.im2;
        vels2.angvel += self.ii2 * self.r2.gcross(p);

        data.velocities[self.index1] = vels1;
        data.velocities[self.index2] = vels2;
    }

    pub(crate) fn solve_position_constraints(&mut self, data: &mut SolverData) -> bool {
        let mut position1 = data.positions[self.index1];
        let mut position2 = data.positions[self.index2];

        let r1 = position1.rotation() * (self.local_anchor1 - self.local_com1);
        let r2 = position2.rotation() * (self.local_anchor2 - self.local_com2);
        let mut u = (position2.c + r2) - (position1.c + r1);

        let length = u.norm();
        if length > data.params.allowed_linear_error {
            u /= length;
        } else {
            u = na::zero();
        }

        let cr1u = r1.gcross(u);
        let cr2u = r2.gcross(u);
        let mass =
            utils::inv(self.im1 + self.im2 + self.ii1 * cr1u * cr1u + self.ii2 * cr2u * cr2u);

        let c = na::clamp(
            length - self.max_length,
            0.0,
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

        length - self.max_length < data.params.allowed_linear_error
    }

    /// The force applied by this joint over the last step, given the inverse
    /// timestep length of that step.
    pub fn reaction_force(&self, inv_dt: Real) -> Vector<Real> {
        self.u * (self.impulse * inv_dt)
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
    fn world_anchor_construction_round_trips_the_length() {
        let rb1 = RigidBodyBuilder::new_dynamic().translation(1.0, 2.0).build();
        let rb2 = RigidBodyBuilder::new_dynamic().translation(4.0, 6.0).build();
        let joint =
            RopeJoint::from_world_anchors(&rb1, &rb2, Point::new(1.0, 2.0), Point::new(4.0, 6.0));
        assert_eq!(joint.max_length, 5.0);
    }
}
