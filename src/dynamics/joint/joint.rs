use crate::dynamics::joint::{
    AngleJoint, DistanceJoint, GearJoint, JointHandle, MotorJoint, MouseJoint, PrismaticJoint,
    PulleyJoint, RevoluteJoint, RopeJoint, WeldJoint, WheelJoint,
};
use crate::dynamics::solver::SolverData;
use crate::dynamics::{RigidBodyHandle, RigidBodySet};
use crate::math::{Real, Vector};

/// The state of a limited degree of freedom with respect to its bounds.
///
/// Transitioning into a different bound invalidates the impulse accumulated
/// against the previous one; the joints reset that axis's impulse on every
/// state change.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub enum LimitState {
    /// The coordinate is strictly between its bounds.
    Inactive,
    /// The coordinate reached its lower bound.
    AtLower,
    /// The coordinate reached its upper bound.
    AtUpper,
    /// The two bounds coincide: the coordinate is locked.
    Equal,
}

/// The result of a joint breakage check.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub enum JointBreakStatus {
    /// The reaction force stayed within the joint's breaking threshold.
    Unbroken,
    /// The joint broke under the given reaction-force magnitude and
    /// disabled itself. Removing it is the caller's responsibility.
    Broke(Real),
}

/// An enum grouping all possible types of joints.
#[derive(Copy, Clone, Debug)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub enum JointParams {
    /// A joint maintaining a fixed distance between two anchor points.
    Distance(DistanceJoint),
    /// A joint enforcing a maximum distance between two anchor points.
    Rope(RopeJoint),
    /// A joint pinning two anchor points together, rotation free.
    Revolute(RevoluteJoint),
    /// A joint constraining the relative motion to a translation along one
    /// axis.
    Prismatic(PrismaticJoint),
    /// A joint removing all relative degrees of freedom.
    Weld(WeldJoint),
    /// A point-on-line joint with suspension and an angular motor.
    Wheel(WheelJoint),
    /// A joint coupling two bodies through an idealized pulley.
    Pulley(PulleyJoint),
    /// A joint coupling the coordinates of two other joints.
    Gear(GearJoint),
    /// A joint driving the relative pose of two bodies under a force budget.
    Motor(MotorJoint),
    /// A joint locking the relative angle of two bodies.
    Angle(AngleJoint),
    /// A joint dragging a single body toward a world-space target.
    Mouse(MouseJoint),
}

impl JointParams {
    /// An integer identifier for each type of joint.
    pub fn type_id(&self) -> usize {
        match self {
            JointParams::Distance(_) => 0,
            JointParams::Rope(_) => 1,
            JointParams::Revolute(_) => 2,
            JointParams::Prismatic(_) => 3,
            JointParams::Weld(_) => 4,
            JointParams::Wheel(_) => 5,
            JointParams::Pulley(_) => 6,
            JointParams::Gear(_) => 7,
            JointParams::Motor(_) => 8,
            JointParams::Angle(_) => 9,
            JointParams::Mouse(_) => 10,
        }
    }

    /// Does this joint variant constrain a single body to world space?
    pub fn is_single_body(&self) -> bool {
        matches!(self, JointParams::Mouse(_))
    }

    /// Gets a reference to the underlying distance joint, if `self` is one.
    pub fn as_distance_joint(&self) -> Option<&DistanceJoint> {
        if let JointParams::Distance(j) = self {
            Some(j)
        } else {
            None
        }
    }

    /// Gets a reference to the underlying rope joint, if `self` is one.
    pub fn as_rope_joint(&self) -> Option<&RopeJoint> {
        if let JointParams::Rope(j) = self {
            Some(j)
        } else {
            None
        }
    }

    /// Gets a reference to the underlying revolute joint, if `self` is one.
    pub fn as_revolute_joint(&self) -> Option<&RevoluteJoint> {
        if let JointParams::Revolute(j) = self {
            Some(j)
        } else {
            None
        }
    }

    /// Gets a reference to the underlying prismatic joint, if `self` is one.
    pub fn as_prismatic_joint(&self) -> Option<&PrismaticJoint> {
        if let JointParams::Prismatic(j) = self {
            Some(j)
        } else {
            None
        }
    }

    /// Gets a reference to the underlying weld joint, if `self` is one.
    pub fn as_weld_joint(&self) -> Option<&WeldJoint> {
        if let JointParams::Weld(j) = self {
            Some(j)
        } else {
            None
        }
    }

    /// Gets a reference to the underlying wheel joint, if `self` is one.
    pub fn as_wheel_joint(&self) -> Option<&WheelJoint> {
        if let JointParams::Wheel(j) = self {
            Some(j)
        } else {
            None
        }
    }

    /// Gets a reference to the underlying pulley joint, if `self` is one.
    pub fn as_pulley_joint(&self) -> Option<&PulleyJoint> {
        if let JointParams::Pulley(j) = self {
            Some(j)
        } else {
            None
        }
    }

    /// Gets a reference to the underlying gear joint, if `self` is one.
    pub fn as_gear_joint(&self) -> Option<&GearJoint> {
        if let JointParams::Gear(j) = self {
            Some(j)
        } else {
            None
        }
    }

    /// Gets a reference to the underlying motor joint, if `self` is one.
    pub fn as_motor_joint(&self) -> Option<&MotorJoint> {
        if let JointParams::Motor(j) = self {
            Some(j)
        } else {
            None
        }
    }

    /// Gets a reference to the underlying angle joint, if `self` is one.
    pub fn as_angle_joint(&self) -> Option<&AngleJoint> {
        if let JointParams::Angle(j) = self {
            Some(j)
        } else {
            None
        }
    }

    /// Gets a reference to the underlying mouse joint, if `self` is one.
    pub fn as_mouse_joint(&self) -> Option<&MouseJoint> {
        if let JointParams::Mouse(j) = self {
            Some(j)
        } else {
            None
        }
    }

    /// Gets a mutable reference to the underlying mouse joint, if `self` is
    /// one.
    pub fn as_mouse_joint_mut(&mut self) -> Option<&mut MouseJoint> {
        if let JointParams::Mouse(j) = self {
            Some(j)
        } else {
            None
        }
    }
}

impl From<DistanceJoint> for JointParams {
    fn from(j: DistanceJoint) -> Self {
        JointParams::Distance(j)
    }
}

impl From<RopeJoint> for JointParams {
    fn from(j: RopeJoint) -> Self {
        JointParams::Rope(j)
    }
}

impl From<RevoluteJoint> for JointParams {
    fn from(j: RevoluteJoint) -> Self {
        JointParams::Revolute(j)
    }
}

impl From<PrismaticJoint> for JointParams {
    fn from(j: PrismaticJoint) -> Self {
        JointParams::Prismatic(j)
    }
}

impl From<WeldJoint> for JointParams {
    fn from(j: WeldJoint) -> Self {
        JointParams::Weld(j)
    }
}

impl From<WheelJoint> for JointParams {
    fn from(j: WheelJoint) -> Self {
        JointParams::Wheel(j)
    }
}

impl From<PulleyJoint> for JointParams {
    fn from(j: PulleyJoint) -> Self {
        JointParams::Pulley(j)
    }
}

impl From<GearJoint> for JointParams {
    fn from(j: GearJoint) -> Self {
        JointParams::Gear(j)
    }
}

impl From<MotorJoint> for JointParams {
    fn from(j: MotorJoint) -> Self {
        JointParams::Motor(j)
    }
}

impl From<AngleJoint> for JointParams {
    fn from(j: AngleJoint) -> Self {
        JointParams::Angle(j)
    }
}

impl From<MouseJoint> for JointParams {
    fn from(j: MouseJoint) -> Self {
        JointParams::Mouse(j)
    }
}

/// A joint attached to one or two bodies.
#[derive(Clone)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct Joint {
    /// Handle to the first body attached to this joint.
    pub body1: RigidBodyHandle,
    /// Handle to the second body attached to this joint, or `None` for a
    /// single-body joint anchored to world space.
    pub body2: Option<RigidBodyHandle>,
    // A joint needs to know its handle to simplify its removal.
    pub(crate) handle: JointHandle,
    /// Is this joint taking part in the simulation?
    ///
    /// Cleared automatically when the joint breaks.
    pub enabled: bool,
    /// The reaction-force magnitude above which this joint breaks and
    /// disables itself. `Real::MAX` means unbreakable.
    pub break_force: Real,
    /// Can the attached bodies still collide with each other?
    pub collide_connected: bool,
    /// The joint geometric parameters and impulse.
    pub params: JointParams,
}

impl Joint {
    /// The handle this joint is stored under in its `JointSet`.
    pub fn handle(&self) -> JointHandle {
        self.handle
    }

    /// Prepares the constraint for the velocity iterations of this step:
    /// snapshots the body data, rebuilds the world-space geometry and the
    /// effective mass, and applies the warm-start impulse.
    pub fn init_velocity_constraints(&mut self, bodies: &RigidBodySet, data: &mut SolverData) {
        match &mut self.params {
            JointParams::Gear(j) => return j.init_velocity_constraints(bodies, data),
            JointParams::Mouse(j) => {
                return j.init_velocity_constraints(&bodies[self.body1], data)
            }
            _ => {}
        }

        let rb1 = &bodies[self.body1];
        let rb2 = &bodies[self.body2.expect("a two-body joint is missing its second body")];

        match &mut self.params {
            JointParams::Distance(j) => j.init_velocity_constraints(rb1, rb2, data),
            JointParams::Rope(j) => j.init_velocity_constraints(rb1, rb2, data),
            JointParams::Revolute(j) => j.init_velocity_constraints(rb1, rb2, data),
            JointParams::Prismatic(j) => j.init_velocity_constraints(rb1, rb2, data),
            JointParams::Weld(j) => j.init_velocity_constraints(rb1, rb2, data),
            JointParams::Wheel(j) => j.init_velocity_constraints(rb1, rb2, data),
            JointParams::Pulley(j) => j.init_velocity_constraints(rb1, rb2, data),
            JointParams::Motor(j) => j.init_velocity_constraints(rb1, rb2, data),
            JointParams::Angle(j) => j.init_velocity_constraints(rb1, rb2, data),
            JointParams::Gear(_) | JointParams::Mouse(_) => unreachable!(),
        }
    }

    /// Runs one velocity iteration of this joint, reading and mutating the
    /// solver velocities in place.
    pub fn solve_velocity_constraints(&mut self, data: &mut SolverData) {
        match &mut self.params {
            JointParams::Distance(j) => j.solve_velocity_constraints(data),
            JointParams::Rope(j) => j.solve_velocity_constraints(data),
            JointParams::Revolute(j) => j.solve_velocity_constraints(data),
            JointParams::Prismatic(j) => j.solve_velocity_constraints(data),
            JointParams::Weld(j) => j.solve_velocity_constraints(data),
            JointParams::Wheel(j) => j.solve_velocity_constraints(data),
            JointParams::Pulley(j) => j.solve_velocity_constraints(data),
            JointParams::Gear(j) => j.solve_velocity_constraints(data),
            JointParams::Motor(j) => j.solve_velocity_constraints(data),
            JointParams::Angle(j) => j.solve_velocity_constraints(data),
            JointParams::Mouse(j) => j.solve_velocity_constraints(data),
        }
    }

    /// Runs one position iteration of this joint, applying a fresh
    /// pseudo-impulse directly to the solver positions.
    ///
    /// Returns `true` when the residual violation is within the linear and
    /// angular tolerances.
    pub fn solve_position_constraints(&mut self, data: &mut SolverData) -> bool {
        match &mut self.params {
            JointParams::Distance(j) => j.solve_position_constraints(data),
            JointParams::Rope(j) => j.solve_position_constraints(data),
            JointParams::Revolute(j) => j.solve_position_constraints(data),
            JointParams::Prismatic(j) => j.solve_position_constraints(data),
            JointParams::Weld(j) => j.solve_position_constraints(data),
            JointParams::Wheel(j) => j.solve_position_constraints(data),
            JointParams::Pulley(j) => j.solve_position_constraints(data),
            JointParams::Gear(j) => j.solve_position_constraints(data),
            JointParams::Motor(j) => j.solve_position_constraints(data),
            JointParams::Angle(j) => j.solve_position_constraints(data),
            JointParams::Mouse(j) => j.solve_position_constraints(data),
        }
    }

    /// The force applied by this joint over the last step, derived from its
    /// accumulated impulse.
    pub fn reaction_force(&self, inv_dt: Real) -> Vector<Real> {
        match &self.params {
            JointParams::Distance(j) => j.reaction_force(inv_dt),
            JointParams::Rope(j) => j.reaction_force(inv_dt),
            JointParams::Revolute(j) => j.reaction_force(inv_dt),
            JointParams::Prismatic(j) => j.reaction_force(inv_dt),
            JointParams::Weld(j) => j.reaction_force(inv_dt),
            JointParams::Wheel(j) => j.reaction_force(inv_dt),
            JointParams::Pulley(j) => j.reaction_force(inv_dt),
            JointParams::Gear(j) => j.reaction_force(inv_dt),
            JointParams::Motor(j) => j.reaction_force(inv_dt),
            JointParams::Angle(j) => j.reaction_force(inv_dt),
            JointParams::Mouse(j) => j.reaction_force(inv_dt),
        }
    }

    /// The torque applied by this joint over the last step, derived from its
    /// accumulated impulse.
    pub fn reaction_torque(&self, inv_dt: Real) -> Real {
        match &self.params {
            JointParams::Distance(j) => j.reaction_torque(inv_dt),
            JointParams::Rope(j) => j.reaction_torque(inv_dt),
            JointParams::Revolute(j) => j.reaction_torque(inv_dt),
            JointParams::Prismatic(j) => j.reaction_torque(inv_dt),
            JointParams::Weld(j) => j.reaction_torque(inv_dt),
            JointParams::Wheel(j) => j.reaction_torque(inv_dt),
            JointParams::Pulley(j) => j.reaction_torque(inv_dt),
            JointParams::Gear(j) => j.reaction_torque(inv_dt),
            JointParams::Motor(j) => j.reaction_torque(inv_dt),
            JointParams::Angle(j) => j.reaction_torque(inv_dt),
            JointParams::Mouse(j) => j.reaction_torque(inv_dt),
        }
    }

    /// Checks this joint against its breaking threshold.
    ///
    /// If the reaction force exceeds `break_force` the joint disables
    /// itself and reports the force it broke under. Breakage is a normal
    /// runtime condition, not an error; the joint is not removed.
    pub fn validate(&mut self, inv_dt: Real) -> JointBreakStatus {
        if !self.enabled || self.break_force == Real::MAX {
            return JointBreakStatus::Unbroken;
        }

        let force = self.reaction_force(inv_dt).norm();
        if force > self.break_force {
            self.enabled = false;
            JointBreakStatus::Broke(force)
        } else {
            JointBreakStatus::Unbroken
        }
    }
}
