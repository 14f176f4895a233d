use crate::data::arena::Arena;
use crate::dynamics::joint::{GearJoint, Joint, JointParams};
use crate::dynamics::{RigidBodyHandle, RigidBodySet};
use crate::math::Real;

/// The unique identifier of a joint added to a `JointSet`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
#[repr(transparent)]
pub struct JointHandle(pub(crate) crate::data::arena::Index);

impl JointHandle {
    /// Converts this handle into its (index, generation) components.
    pub fn into_raw_parts(self) -> (u32, u32) {
        self.0.into_raw_parts()
    }

    /// Reconstructs a handle from its (index, generation) components.
    pub fn from_raw_parts(id: u32, generation: u32) -> Self {
        Self(crate::data::arena::Index::from_raw_parts(id, generation))
    }

    /// An always-invalid joint handle.
    pub fn invalid() -> Self {
        Self(crate::data::arena::Index::from_raw_parts(
            u32::MAX,
            u32::MAX,
        ))
    }
}

/// A set of joints that can be handled by the island driver.
#[derive(Clone, Default)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct JointSet {
    joints: Arena<Joint>,
}

impl JointSet {
    /// Creates a new empty set of joints.
    pub fn new() -> Self {
        Self {
            joints: Arena::new(),
        }
    }

    /// The number of joints in this set.
    pub fn len(&self) -> usize {
        self.joints.len()
    }

    /// Is this set empty?
    pub fn is_empty(&self) -> bool {
        self.joints.is_empty()
    }

    /// Adds a joint to this set and wakes the bodies it attaches.
    ///
    /// `body2` must be `None` exactly for the single-body joint variants
    /// (mouse); every other variant attaches two distinct bodies.
    pub fn insert(
        &mut self,
        bodies: &mut RigidBodySet,
        body1: RigidBodyHandle,
        body2: Option<RigidBodyHandle>,
        params: impl Into<JointParams>,
    ) -> JointHandle {
        let params = params.into();

        assert!(
            body2 != Some(body1),
            "A joint cannot attach a body to itself."
        );
        assert!(
            params.is_single_body() == body2.is_none(),
            "This joint variant requires exactly {} bodies.",
            if params.is_single_body() { "one" } else { "two" }
        );

        let handle = JointHandle(self.joints.insert(Joint {
            body1,
            body2,
            handle: JointHandle::invalid(),
            enabled: true,
            break_force: Real::MAX,
            collide_connected: false,
            params,
        }));
        self.joints[handle.0].handle = handle;

        bodies[body1].wake_up();
        if let Some(body2) = body2 {
            bodies[body2].wake_up();
        }

        handle
    }

    /// Builds a gear joint coupling the coordinates of two existing
    /// revolute or prismatic joints, and adds it to this set.
    ///
    /// The gear snapshots the source joints' geometry now; destroy the gear
    /// before mutating or removing either source joint.
    pub fn insert_gear(
        &mut self,
        bodies: &mut RigidBodySet,
        joint1: JointHandle,
        joint2: JointHandle,
        ratio: Real,
    ) -> JointHandle {
        let gear = GearJoint::new(
            bodies,
            self.get(joint1).expect("invalid first gear source joint"),
            self.get(joint2).expect("invalid second gear source joint"),
            ratio,
        );
        let (body_a, body_b, _, _) = gear.bodies();
        self.insert(bodies, body_a, Some(body_b), gear)
    }

    /// Removes a joint from this set, waking the bodies it attached.
    pub fn remove(&mut self, handle: JointHandle, bodies: &mut RigidBodySet) -> Option<Joint> {
        let joint = self.joints.remove(handle.0)?;
        if let Some(rb) = bodies.get_mut(joint.body1) {
            rb.wake_up();
        }
        if let Some(rb) = joint.body2.and_then(|h| bodies.get_mut(h)) {
            rb.wake_up();
        }
        Some(joint)
    }

    /// Is the given joint handle valid?
    pub fn contains(&self, handle: JointHandle) -> bool {
        self.joints.contains(handle.0)
    }

    /// Gets the joint with the given handle.
    pub fn get(&self, handle: JointHandle) -> Option<&Joint> {
        self.joints.get(handle.0)
    }

    /// Gets the joint with the given handle, mutably, without waking the
    /// attached bodies.
    ///
    /// Use [`Self::get_mut_wake`] when mutating anything the solver reads
    /// (anchors, axes, limits, targets): a change against sleeping bodies
    /// would not take effect until something else wakes them.
    pub fn get_mut(&mut self, handle: JointHandle) -> Option<&mut Joint> {
        self.joints.get_mut(handle.0)
    }

    /// Gets the joint with the given handle, mutably, waking both attached
    /// bodies.
    pub fn get_mut_wake(
        &mut self,
        handle: JointHandle,
        bodies: &mut RigidBodySet,
    ) -> Option<&mut Joint> {
        let joint = self.joints.get_mut(handle.0)?;
        bodies[joint.body1].wake_up();
        if let Some(body2) = joint.body2 {
            bodies[body2].wake_up();
        }
        Some(joint)
    }

    /// Iterates through all the joints of this set.
    pub fn iter(&self) -> impl Iterator<Item = (JointHandle, &Joint)> {
        self.joints.iter().map(|(i, j)| (JointHandle(i), j))
    }

    /// Iterates mutably through all the joints of this set.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (JointHandle, &mut Joint)> {
        self.joints.iter_mut().map(|(i, j)| (JointHandle(i), j))
    }
}

impl std::ops::Index<JointHandle> for JointSet {
    type Output = Joint;

    fn index(&self, handle: JointHandle) -> &Joint {
        &self.joints[handle.0]
    }
}

impl std::ops::IndexMut<JointHandle> for JointSet {
    fn index_mut(&mut self, handle: JointHandle) -> &mut Joint {
        &mut self.joints[handle.0]
    }
}
