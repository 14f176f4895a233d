use crate::data::arena::Arena;
use crate::dynamics::RigidBody;

/// The unique identifier of a rigid body added to a `RigidBodySet`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
#[repr(transparent)]
pub struct RigidBodyHandle(pub(crate) crate::data::arena::Index);

impl RigidBodyHandle {
    /// Converts this handle into its (index, generation) components.
    pub fn into_raw_parts(self) -> (u32, u32) {
        self.0.into_raw_parts()
    }

    /// Reconstructs a handle from its (index, generation) components.
    pub fn from_raw_parts(id: u32, generation: u32) -> Self {
        Self(crate::data::arena::Index::from_raw_parts(id, generation))
    }
}

/// A set of rigid bodies that can be handled by the island driver.
#[derive(Clone, Default)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct RigidBodySet {
    bodies: Arena<RigidBody>,
}

impl RigidBodySet {
    /// Creates a new empty set of rigid bodies.
    pub fn new() -> Self {
        Self {
            bodies: Arena::new(),
        }
    }

    /// The number of rigid bodies in this set.
    pub fn len(&self) -> usize {
        self.bodies.len()
    }

    /// Is this set empty?
    pub fn is_empty(&self) -> bool {
        self.bodies.is_empty()
    }

    /// Adds a rigid body to this set and returns its handle.
    pub fn insert(&mut self, rb: RigidBody) -> RigidBodyHandle {
        RigidBodyHandle(self.bodies.insert(rb))
    }

    /// Removes a rigid body from this set.
    ///
    /// Any joint still attached to this body must be removed by the caller;
    /// a joint never outlives either of its bodies.
    pub fn remove(&mut self, handle: RigidBodyHandle) -> Option<RigidBody> {
        self.bodies.remove(handle.0)
    }

    /// Is the given handle valid in this set?
    pub fn contains(&self, handle: RigidBodyHandle) -> bool {
        self.bodies.contains(handle.0)
    }

    /// Gets the rigid body with the given handle.
    pub fn get(&self, handle: RigidBodyHandle) -> Option<&RigidBody> {
        self.bodies.get(handle.0)
    }

    /// Gets the rigid body with the given handle, mutably.
    pub fn get_mut(&mut self, handle: RigidBodyHandle) -> Option<&mut RigidBody> {
        self.bodies.get_mut(handle.0)
    }

    /// Gets two distinct rigid bodies, mutably.
    pub fn get2_mut(
        &mut self,
        h1: RigidBodyHandle,
        h2: RigidBodyHandle,
    ) -> (Option<&mut RigidBody>, Option<&mut RigidBody>) {
        self.bodies.get2_mut(h1.0, h2.0)
    }

    /// Iterates over the bodies of this set.
    pub fn iter(&self) -> impl Iterator<Item = (RigidBodyHandle, &RigidBody)> {
        self.bodies.iter().map(|(i, rb)| (RigidBodyHandle(i), rb))
    }

    /// Iterates mutably over the bodies of this set.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (RigidBodyHandle, &mut RigidBody)> {
        self.bodies
            .iter_mut()
            .map(|(i, rb)| (RigidBodyHandle(i), rb))
    }
}

impl std::ops::Index<RigidBodyHandle> for RigidBodySet {
    type Output = RigidBody;

    fn index(&self, handle: RigidBodyHandle) -> &RigidBody {
        &self.bodies[handle.0]
    }
}

impl std::ops::IndexMut<RigidBodyHandle> for RigidBodySet {
    fn index_mut(&mut self, handle: RigidBodyHandle) -> &mut RigidBody {
        &mut self.bodies[handle.0]
    }
}
