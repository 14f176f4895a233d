use crate::dynamics::{IntegrationParameters, RigidBodyVelocity};
use crate::math::{Point, Real, Rotation};

/// The position of a solver body: its world-space center of mass and its
/// rotation angle.
///
/// The angle is unbounded (it does not wrap at `pi`), matching the body
/// sweep it is copied from.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct SolverPosition {
    /// The world-space center of mass.
    pub c: Point<Real>,
    /// The rotation angle.
    pub a: Real,
}

impl SolverPosition {
    /// The rotation corresponding to the current angle.
    #[inline]
    pub fn rotation(&self) -> Rotation<Real> {
        Rotation::new(self.a)
    }
}

/// A view of the solver state for one timestep.
///
/// The position and velocity slices are indexed by each body's
/// `active_set_offset` for the current step. The view is created fresh by
/// the island driver each step; joints must not retain it (the borrow
/// checker enforces this) nor persist the indices it is addressed with.
pub struct SolverData<'a> {
    /// The integration parameters of the current step.
    pub params: &'a IntegrationParameters,
    /// The ratio of the current timestep length to the previous one, used
    /// to rescale warm-start impulses under a variable timestep.
    pub dt_ratio: Real,
    /// The center-of-mass position and angle of each solver body.
    pub positions: &'a mut [SolverPosition],
    /// The linear and angular velocity of each solver body.
    pub velocities: &'a mut [RigidBodyVelocity],
}

impl SolverData<'_> {
    /// The timestep length.
    #[inline]
    pub fn dt(&self) -> Real {
        self.params.dt
    }

    /// The inverse timestep length (zero if `dt` is zero).
    #[inline]
    pub fn inv_dt(&self) -> Real {
        self.params.inv_dt()
    }

    /// The warm-start rescaling applied to impulses carried from the
    /// previous step: `dt_ratio * warmstart_coeff`.
    #[inline]
    pub fn warmstart_factor(&self) -> Real {
        self.dt_ratio * self.params.warmstart_coeff
    }
}
