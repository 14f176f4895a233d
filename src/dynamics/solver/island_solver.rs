use crate::dynamics::solver::{SolverData, SolverPosition};
use crate::dynamics::{
    IntegrationParameters, JointBreakStatus, JointHandle, JointSet, RigidBodySet,
    RigidBodyVelocity,
};
use crate::math::{Real, Vector};

// Bodies covering very large distances in one step destabilize the
// constraint solve; their velocities are clamped before integration.
const MAX_TRANSLATION: Real = 2.0;
const MAX_ROTATION: Real = std::f64::consts::FRAC_PI_2 as Real;

/// The driver running the per-step solver protocol over one island of
/// bodies and joints.
///
/// A step runs, strictly in this order: constraint initialization (with
/// warm-starting), the velocity iterations, position integration, the
/// position iterations, then the breakage checks. Within an iteration every
/// joint is visited exactly once, in set order, each one reading the
/// velocities written by the joints before it; this Gauss-Seidel coupling is
/// what makes the iterations converge, and it requires the island to be
/// solved by a single thread. A multi-threaded driver must partition
/// disjoint islands across threads, never one island's joints.
pub struct IslandSolver {
    positions: Vec<SolverPosition>,
    velocities: Vec<RigidBodyVelocity>,
    // The inverse timestep of the previous step, for warm-start rescaling
    // under a variable timestep. Zero until the first step has run.
    inv_dt0: Real,
}

impl Default for IslandSolver {
    fn default() -> Self {
        Self::new()
    }
}

impl IslandSolver {
    /// Creates a new island solver.
    pub fn new() -> Self {
        Self {
            positions: Vec::new(),
            velocities: Vec::new(),
            inv_dt0: 0.0,
        }
    }

    /// Advances the island by one timestep.
    ///
    /// Returns the joints that broke during this step, with the
    /// reaction-force magnitude each one broke under. The joints have
    /// already disabled themselves; removing them is up to the caller.
    pub fn step(
        &mut self,
        gravity: &Vector<Real>,
        params: &IntegrationParameters,
        bodies: &mut RigidBodySet,
        joints: &mut JointSet,
    ) -> Vec<(JointHandle, Real)> {
        let dt = params.dt;
        let inv_dt = params.inv_dt();
        let dt_ratio = self.inv_dt0 * dt;

        // Assign solver indices and snapshot the body state, integrating
        // the external forces into the velocities.
        self.positions.clear();
        self.velocities.clear();
        let mut index = 0;
        for (_, rb) in bodies.iter_mut() {
            rb.active_set_offset = index;
            index += 1;

            rb.sweep.c0 = rb.sweep.c;
            rb.sweep.a0 = rb.sweep.a;
            self.positions.push(SolverPosition {
                c: rb.sweep.c,
                a: rb.sweep.a,
            });

            let mut vels = rb.vels;
            if rb.is_dynamic() {
                vels.linvel += (gravity + rb.force * rb.effective_inv_mass) * dt;
                vels.angvel += rb.torque * rb.effective_inv_inertia * dt;
            }
            self.velocities.push(vels);
        }

        {
            let mut data = SolverData {
                params,
                dt_ratio,
                positions: &mut self.positions,
                velocities: &mut self.velocities,
            };

            /*
             * Initialize the constraints and warm-start.
             */
            for (_, joint) in joints.iter_mut() {
                if joint.enabled {
                    joint.init_velocity_constraints(bodies, &mut data);
                }
            }

            /*
             * Velocity iterations.
             */
            for _ in 0..params.max_velocity_iterations {
                for (_, joint) in joints.iter_mut() {
                    if joint.enabled {
                        joint.solve_velocity_constraints(&mut data);
                    }
                }
            }

            /*
             * Integrate positions.
             */
            for (position, vels) in data.positions.iter_mut().zip(data.velocities.iter_mut()) {
                let translation = vels.linvel * dt;
                if translation.norm_squared() > MAX_TRANSLATION * MAX_TRANSLATION {
                    vels.linvel *= MAX_TRANSLATION / translation.norm();
                }
                let rotation = vels.angvel * dt;
                if rotation.abs() > MAX_ROTATION {
                    vels.angvel *= MAX_ROTATION / rotation.abs();
                }

                position.c += vels.linvel * dt;
                position.a += vels.angvel * dt;
            }

            /*
             * Position iterations, with an early exit once every joint
             * reports a residual within tolerance.
             */
            for _ in 0..params.max_position_iterations {
                let mut solved = true;
                for (_, joint) in joints.iter_mut() {
                    if joint.enabled {
                        solved &= joint.solve_position_constraints(&mut data);
                    }
                }
                if solved {
                    break;
                }
            }
        }

        // Write the solved state back to the bodies.
        for (_, rb) in bodies.iter_mut() {
            let i = rb.active_set_offset;
            rb.sweep.c = self.positions[i].c;
            rb.sweep.a = self.positions[i].a;
            rb.vels = self.velocities[i];
            rb.force = na::zero();
            rb.torque = 0.0;
            rb.synchronize_transform();
        }

        /*
         * Breakage pass, after the solve so no joint mutates the island
         * mid-iteration.
         */
        let mut broken = Vec::new();
        for (handle, joint) in joints.iter_mut() {
            if let JointBreakStatus::Broke(force) = joint.validate(inv_dt) {
                log::debug!(
                    "joint {:?} broke under a reaction force of {force}",
                    handle.into_raw_parts()
                );
                broken.push((handle, force));
            }
        }

        self.inv_dt0 = inv_dt;
        broken
    }
}
