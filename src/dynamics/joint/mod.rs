//! Joints using the impulse-based constraint solver.

pub use self::angle_joint::AngleJoint;
pub use self::distance_joint::DistanceJoint;
pub use self::gear_joint::{GearJoint, GearSource};
pub use self::joint::{Joint, JointBreakStatus, JointParams, LimitState};
pub use self::joint_set::{JointHandle, JointSet};
pub use self::motor_joint::MotorJoint;
pub use self::mouse_joint::MouseJoint;
pub use self::prismatic_joint::PrismaticJoint;
pub use self::pulley_joint::PulleyJoint;
pub use self::revolute_joint::RevoluteJoint;
pub use self::rope_joint::RopeJoint;
pub use self::weld_joint::WeldJoint;
pub use self::wheel_joint::WheelJoint;

mod angle_joint;
mod distance_joint;
mod gear_joint;
mod joint;
mod joint_set;
mod motor_joint;
mod mouse_joint;
mod prismatic_joint;
mod pulley_joint;
mod revolute_joint;
mod rope_joint;
mod weld_joint;
mod wheel_joint;
