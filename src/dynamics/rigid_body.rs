use crate::math::{Isometry, Point, Real, Rotation, Translation, Vector};
use crate::utils;

/// The status of a body, governing how it is affected by external forces.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub enum RigidBodyType {
    /// A body affected by external forces and constraint impulses.
    Dynamic,
    /// A body with infinite mass that never moves.
    ///
    /// Static bodies still take part in the solver (with zero inverse mass
    /// and inertia) so joints can treat both of their endpoints uniformly.
    Static,
}

/// The linear and angular velocity of a rigid body.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct RigidBodyVelocity {
    /// The linear velocity of the body's center of mass.
    pub linvel: Vector<Real>,
    /// The angular velocity of the body.
    pub angvel: Real,
}

impl RigidBodyVelocity {
    /// The zero velocity.
    pub fn zero() -> Self {
        Self {
            linvel: na::zero(),
            angvel: 0.0,
        }
    }

    /// The velocity of the world-space point at offset `r` from the center
    /// of mass.
    pub fn velocity_at_offset(&self, r: Vector<Real>) -> Vector<Real> {
        use crate::utils::WCross;
        self.linvel + self.angvel.gcross(r)
    }
}

impl Default for RigidBodyVelocity {
    fn default() -> Self {
        Self::zero()
    }
}

/// The center-of-mass trajectory of a body.
///
/// The angle is unbounded: it accumulates full turns instead of wrapping,
/// which is what the joint limit and gear constraints need.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct Sweep {
    /// The center of mass, in the body's local frame.
    pub local_center: Point<Real>,
    /// The world-space center of mass at the start of the current step.
    pub c0: Point<Real>,
    /// The body angle at the start of the current step.
    pub a0: Real,
    /// The current world-space center of mass.
    pub c: Point<Real>,
    /// The current body angle.
    pub a: Real,
}

/// The sleep state of a rigid body.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct RigidBodyActivation {
    /// Is this body asleep?
    pub sleeping: bool,
}

impl RigidBodyActivation {
    /// The activation state of a body that is awake.
    pub fn new_active() -> Self {
        Self { sleeping: false }
    }
}

/// A rigid body.
///
/// To create a new rigid-body, use the `RigidBodyBuilder` structure.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct RigidBody {
    pub(crate) position: Isometry<Real>,
    pub(crate) sweep: Sweep,
    pub(crate) vels: RigidBodyVelocity,
    pub(crate) force: Vector<Real>,
    pub(crate) torque: Real,
    pub(crate) effective_inv_mass: Real,
    pub(crate) effective_inv_inertia: Real,
    /// Whether or not this rigid-body is sleeping.
    pub activation: RigidBodyActivation,
    /// The index of this body in the solver arrays of the current step.
    ///
    /// Only valid while the island driver is solving; never persist it.
    pub(crate) active_set_offset: usize,
    pub(crate) body_type: RigidBodyType,
    /// User-defined data associated to this rigid-body.
    pub user_data: u128,
}

impl RigidBody {
    fn new(body_type: RigidBodyType) -> Self {
        Self {
            position: Isometry::identity(),
            sweep: Sweep {
                local_center: Point::origin(),
                c0: Point::origin(),
                a0: 0.0,
                c: Point::origin(),
                a: 0.0,
            },
            vels: RigidBodyVelocity::zero(),
            force: na::zero(),
            torque: 0.0,
            effective_inv_mass: 0.0,
            effective_inv_inertia: 0.0,
            activation: RigidBodyActivation::new_active(),
            active_set_offset: 0,
            body_type,
            user_data: 0,
        }
    }

    /// The status of this body.
    pub fn body_type(&self) -> RigidBodyType {
        self.body_type
    }

    /// Is this body dynamic?
    pub fn is_dynamic(&self) -> bool {
        self.body_type == RigidBodyType::Dynamic
    }

    /// The world-space position of the body origin.
    pub fn position(&self) -> &Isometry<Real> {
        &self.position
    }

    /// The world-space center of mass of this body.
    pub fn world_com(&self) -> Point<Real> {
        self.sweep.c
    }

    /// The center of mass of this body, in its local frame.
    pub fn local_com(&self) -> Point<Real> {
        self.sweep.local_center
    }

    /// The center-of-mass trajectory of this body.
    pub fn sweep(&self) -> &Sweep {
        &self.sweep
    }

    /// The linear velocity of this body.
    pub fn linvel(&self) -> Vector<Real> {
        self.vels.linvel
    }

    /// The angular velocity of this body.
    pub fn angvel(&self) -> Real {
        self.vels.angvel
    }

    /// The inverse mass of this body (zero for a static body).
    pub fn effective_inv_mass(&self) -> Real {
        self.effective_inv_mass
    }

    /// The inverse angular inertia of this body (zero for a static body).
    pub fn effective_inv_inertia(&self) -> Real {
        self.effective_inv_inertia
    }

    /// The index of this body in the solver arrays of the current step.
    pub fn active_set_offset(&self) -> usize {
        self.active_set_offset
    }

    /// Wakes this body up.
    pub fn wake_up(&mut self) {
        self.activation.sleeping = false;
    }

    /// Sets the position of this body and wakes it up.
    pub fn set_position(&mut self, position: Isometry<Real>) {
        self.position = position;
        self.sweep.c = position * self.sweep.local_center;
        self.sweep.a = position.rotation.angle();
        self.sweep.c0 = self.sweep.c;
        self.sweep.a0 = self.sweep.a;
        self.wake_up();
    }

    /// Sets the linear velocity of this body and wakes it up.
    pub fn set_linvel(&mut self, linvel: Vector<Real>) {
        if self.is_dynamic() {
            self.vels.linvel = linvel;
            self.wake_up();
        }
    }

    /// Sets the angular velocity of this body and wakes it up.
    pub fn set_angvel(&mut self, angvel: Real) {
        if self.is_dynamic() {
            self.vels.angvel = angvel;
            self.wake_up();
        }
    }

    /// Adds to the force accumulator that will be applied at the next step.
    pub fn apply_force(&mut self, force: Vector<Real>) {
        if self.is_dynamic() {
            self.force += force;
            self.wake_up();
        }
    }

    /// Adds to the torque accumulator that will be applied at the next step.
    pub fn apply_torque(&mut self, torque: Real) {
        if self.is_dynamic() {
            self.torque += torque;
            self.wake_up();
        }
    }

    /// Rebuilds `self.position` from the solved sweep.
    ///
    /// The solver works on the center of mass; the body origin is recovered
    /// by rotating the local center back out.
    pub(crate) fn synchronize_transform(&mut self) {
        let rotation = Rotation::new(self.sweep.a);
        let translation = self.sweep.c - rotation * self.sweep.local_center.coords;
        self.position = Isometry::from_parts(Translation::from(translation.coords), rotation);
    }
}

/// A builder for rigid-bodies.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct RigidBodyBuilder {
    position: Isometry<Real>,
    linvel: Vector<Real>,
    angvel: Real,
    mass: Real,
    angular_inertia: Real,
    local_com: Point<Real>,
    body_type: RigidBodyType,
}

impl RigidBodyBuilder {
    /// Starts building a dynamic rigid-body.
    pub fn new_dynamic() -> Self {
        Self {
            position: Isometry::identity(),
            linvel: na::zero(),
            angvel: 0.0,
            mass: 1.0,
            angular_inertia: 1.0,
            local_com: Point::origin(),
            body_type: RigidBodyType::Dynamic,
        }
    }

    /// Starts building a static rigid-body.
    pub fn new_static() -> Self {
        Self {
            mass: 0.0,
            angular_inertia: 0.0,
            ..Self::new_dynamic()
        }
        .body_type(RigidBodyType::Static)
    }

    fn body_type(mut self, body_type: RigidBodyType) -> Self {
        self.body_type = body_type;
        self
    }

    /// Sets the initial translation of the body being built.
    pub fn translation(mut self, x: Real, y: Real) -> Self {
        self.position.translation.vector = Vector::new(x, y);
        self
    }

    /// Sets the initial orientation of the body being built.
    pub fn rotation(mut self, angle: Real) -> Self {
        self.position.rotation = Rotation::new(angle);
        self
    }

    /// Sets the initial linear velocity of the body being built.
    pub fn linvel(mut self, x: Real, y: Real) -> Self {
        self.linvel = Vector::new(x, y);
        self
    }

    /// Sets the initial angular velocity of the body being built.
    pub fn angvel(mut self, angvel: Real) -> Self {
        self.angvel = angvel;
        self
    }

    /// Sets the mass of the body being built.
    pub fn mass(mut self, mass: Real) -> Self {
        self.mass = mass;
        self
    }

    /// Sets the angular inertia of the body being built, about its center
    /// of mass.
    pub fn angular_inertia(mut self, angular_inertia: Real) -> Self {
        self.angular_inertia = angular_inertia;
        self
    }

    /// Sets the center of mass of the body being built, in its local frame.
    pub fn local_com(mut self, local_com: Point<Real>) -> Self {
        self.local_com = local_com;
        self
    }

    /// Builds the rigid-body.
    pub fn build(&self) -> RigidBody {
        let mut rb = RigidBody::new(self.body_type);
        rb.vels = RigidBodyVelocity {
            linvel: self.linvel,
            angvel: self.angvel,
        };
        if self.body_type == RigidBodyType::Dynamic {
            rb.effective_inv_mass = utils::inv(self.mass);
            rb.effective_inv_inertia = utils::inv(self.angular_inertia);
        }
        rb.sweep.local_center = self.local_com;
        rb.set_position(self.position);
        rb
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn static_body_has_zero_inverse_mass() {
        let rb = RigidBodyBuilder::new_static().build();
        assert_eq!(rb.effective_inv_mass(), 0.0);
        assert_eq!(rb.effective_inv_inertia(), 0.0);
        assert!(!rb.is_dynamic());
    }

    #[test]
    fn sweep_tracks_center_of_mass() {
        let rb = RigidBodyBuilder::new_dynamic()
            .translation(1.0, 2.0)
            .local_com(Point::new(0.5, 0.0))
            .build();
        assert_relative_eq!(rb.world_com(), Point::new(1.5, 2.0), epsilon = 1.0e-6);
    }

    #[test]
    fn synchronize_transform_recovers_origin() {
        let mut rb = RigidBodyBuilder::new_dynamic()
            .translation(1.0, 2.0)
            .rotation(0.5)
            .local_com(Point::new(0.5, -0.25))
            .build();
        let before = *rb.position();
        rb.synchronize_transform();
        assert_relative_eq!(
            before.translation.vector,
            rb.position().translation.vector,
            epsilon = 1.0e-5
        );
    }
}
