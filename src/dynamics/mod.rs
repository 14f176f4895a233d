//! Structures related to the dynamics of rigid bodies and joints.

pub use self::integration_parameters::IntegrationParameters;
pub use self::joint::{
    AngleJoint, DistanceJoint, GearJoint, GearSource, Joint, JointBreakStatus, JointHandle,
    JointParams, JointSet, LimitState, MotorJoint, MouseJoint, PrismaticJoint, PulleyJoint,
    RevoluteJoint, RopeJoint, WeldJoint, WheelJoint,
};
pub use self::rigid_body::{
    RigidBody, RigidBodyActivation, RigidBodyBuilder, RigidBodyType, RigidBodyVelocity, Sweep,
};
pub use self::rigid_body_set::{RigidBodyHandle, RigidBodySet};
pub use self::solver::{IslandSolver, SolverData, SolverPosition};

mod integration_parameters;
mod joint;
mod rigid_body;
mod rigid_body_set;
mod solver;
