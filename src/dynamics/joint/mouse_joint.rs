use crate::dynamics::solver::SolverData;
use crate::dynamics::RigidBody;
use crate::math::{Point, Real, SdpMatrix2, Vector};
use crate::utils::{self, WCross};
use na::RealField;

/// A joint that drags a single body toward a world-space target point,
/// typically under user control.
///
/// This is the only single-body joint: there is no second body, the target
/// lives directly in world space. The constraint is a soft, critically
/// dampable spring whose accumulated impulse is clamped to
/// `max_force * dt`, so a grabbed body can never exert unbounded force on
/// whatever it is resting on.
#[derive(Copy, Clone, Debug)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct MouseJoint {
    /// The world-space point the body is dragged toward.
    pub target: Point<Real>,
    /// The grabbed point, expressed in the body's local frame.
    pub local_anchor: Point<Real>,
    /// The maximum force the joint can exert.
    pub max_force: Real,
    /// The response frequency, in Hertz.
    pub frequency: Real,
    /// The damping ratio: 0.7 is a good default for dragging.
    pub damping_ratio: Real,
    /// The accumulated impulse applied by this joint.
    pub impulse: Vector<Real>,

    // Solver state, populated by `init_velocity_constraints`.
    index: usize,
    r: Vector<Real>,
    im: Real,
    ii: Real,
    mass: SdpMatrix2,
    c: Vector<Real>,
    gamma: Real,
    beta: Real,
}

impl MouseJoint {
    /// Creates a new mouse joint grabbing `rb` at the given world-space
    /// point, which also becomes the initial target.
    pub fn new(rb: &RigidBody, grab_point: Point<Real>, max_force: Real) -> Self {
        assert!(max_force >= 0.0, "The maximum force cannot be negative.");
        Self {
            target: grab_point,
            local_anchor: rb.position().inverse_transform_point(&grab_point),
            max_force,
            frequency: 5.0,
            damping_ratio: 0.7,
            impulse: na::zero(),
            index: 0,
            r: na::zero(),
            im: 0.0,
            ii: 0.0,
            mass: SdpMatrix2::zero(),
            c: na::zero(),
            gamma: 0.0,
            beta: 0.0,
        }
    }

    /// Sets the target point the body is dragged toward.
    ///
    /// Access the joint through [`crate::dynamics::JointSet::get_mut_wake`]
    /// when calling this, so the grabbed body wakes up and follows.
    pub fn set_target(&mut self, target: Point<Real>) {
        self.target = target;
    }

    pub(crate) fn init_velocity_constraints(&mut self, rb: &RigidBody, data: &mut SolverData) {
        self.index = rb.active_set_offset;
        self.im = rb.effective_inv_mass;
        self.ii = rb.effective_inv_inertia;

        let position = data.positions[self.index];
        let q = position.rotation();

        let mass = utils::inv(self.im);
        let omega = Real::two_pi() * self.frequency;
        let d = 2.0 * mass * self.damping_ratio * omega;
        let k = mass * omega * omega;

        let h = data.dt();
        self.gamma = utils::inv(h * (d + h * k));
        self.beta = h * k * self.gamma;

        self.r = q * (self.local_anchor - rb.local_com());

        // K = M⁻¹ + I⁻¹ [r]ᵗ[r] + gamma·Id
        let k_matrix = SdpMatrix2::new(
            self.im + self.ii * self.r.y * self.r.y + self.gamma,
            -self.ii * self.r.x * self.r.y,
            self.im + self.ii * self.r.x * self.r.x + self.gamma,
        );
        self.mass = k_matrix.inverse_unchecked();

        self.c = ((position.c + self.r) - self.target) * self.beta;

        // Ad-hoc angular damping on the grabbed body.
        let mut vels = data.velocities[self.index];
        vels.angvel *= 0.98;

        self.impulse *= data.warmstart_factor();
        vels.linvel += self.impulse * self.im;
        vels.angvel += self.ii * self.r.gcross(self.impulse);
        data.velocities[self.index] = vels;
    }

    pub(crate) fn solve_velocity_constraints(&mut self, data: &mut SolverData) {
        let mut vels = data.velocities[self.index];

        let cdot = vels.velocity_at_offset(self.r);
        let impulse = -(self.mass * (cdot + self.c + self.impulse * self.gamma));

        let old_impulse = self.impulse;
        self.impulse += impulse;
        let max_impulse = data.dt() * self.max_force;
        if self.impulse.norm_squared() > max_impulse * max_impulse {
            self.impulse *= max_impulse / self.impulse.norm();
        }
        let impulse = self.impulse - old_impulse;

        vels.linvel += impulse * self.im;
        vels.angvel += self.ii * self.r.gcross(impulse);

        data.velocities[self.index] = vels;
    }

    pub(crate) fn solve_position_constraints(&mut self, _data: &mut SolverData) -> bool {
        // The soft constraint tracks the target through the velocity bias
        // only.
        true
    }

    /// The force applied by this joint over the last step, given the inverse
    /// timestep length of that step.
    pub fn reaction_force(&self, inv_dt: Real) -> Vector<Real> {
        self.impulse * inv_dt
    }

    /// The torque applied by this joint over the last step: always zero.
    pub fn reaction_torque(&self, _inv_dt: Real) -> Real {
        0.0
    }
}
