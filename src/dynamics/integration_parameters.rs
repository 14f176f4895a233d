use crate::math::Real;

/// Parameters for a time-step of the physics engine.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct IntegrationParameters {
    /// The timestep length (default: `1.0 / 60.0`).
    pub dt: Real,
    /// The coefficient in `[0, 1]` applied to warmstart impulses, i.e.,
    /// impulses that are used as the initial solution (instead of 0) at the
    /// next simulation step.
    ///
    /// Setting this to `0.0` disables warm-starting entirely: every joint
    /// starts each step with a zero accumulated impulse.
    ///
    /// (default `1.0`).
    pub warmstart_coeff: Real,
    /// Amount of joint drift the engine won't attempt to correct
    /// (default: `0.005`).
    ///
    /// This is the linear "slop": a residual below this threshold counts as
    /// resolved, which keeps the position solver from chasing floating-point
    /// noise.
    pub allowed_linear_error: Real,
    /// Amount of angular drift the engine won't attempt to correct, in
    /// radians (default: `2.0 * pi / 180.0`).
    pub allowed_angular_error: Real,
    /// Maximum linear correction applied by one position-solve iteration
    /// (default: `0.2`).
    ///
    /// Bounding the correction keeps the position solver from overshooting
    /// on large violations.
    pub max_linear_correction: Real,
    /// Maximum angular correction applied by one position-solve iteration,
    /// in radians (default: `8.0 * pi / 180.0`).
    pub max_angular_correction: Real,
    /// Maximum number of iterations performed by the velocity solver
    /// (default: `8`).
    pub max_velocity_iterations: usize,
    /// Maximum number of iterations performed by the position solver
    /// (default: `3`).
    ///
    /// The position solver may exit earlier if every joint reports a
    /// residual within the allowed linear/angular error.
    pub max_position_iterations: usize,
}

impl IntegrationParameters {
    /// The inverse of the time-stepping length, i.e. the steps per second.
    ///
    /// This is zero if `self.dt` is zero.
    #[inline(always)]
    pub fn inv_dt(&self) -> Real {
        if self.dt == 0.0 {
            0.0
        } else {
            1.0 / self.dt
        }
    }

    /// Sets the time-stepping length.
    #[inline]
    pub fn set_dt(&mut self, dt: Real) {
        assert!(dt >= 0.0, "The time-stepping length cannot be negative.");
        self.dt = dt;
    }

    /// Is warm-starting enabled?
    #[inline]
    pub fn warmstart_enabled(&self) -> bool {
        self.warmstart_coeff != 0.0
    }
}

impl Default for IntegrationParameters {
    fn default() -> Self {
        Self {
            dt: 1.0 / 60.0,
            warmstart_coeff: 1.0,
            allowed_linear_error: 0.005,
            allowed_angular_error: 2.0 / 180.0 * std::f64::consts::PI as Real,
            max_linear_correction: 0.2,
            max_angular_correction: 8.0 / 180.0 * std::f64::consts::PI as Real,
            max_velocity_iterations: 8,
            max_position_iterations: 3,
        }
    }
}
