use crate::dynamics::solver::SolverData;
use crate::dynamics::RigidBody;
use crate::math::{Point, Real, SdpMatrix2, SdpMatrix3, Vector};
use crate::utils::{self, WCross};
use na::{RealField, Vector3};

/// A joint that removes all relative degrees of freedom between two bodies.
///
/// This is the rigid limit of a revolute joint: the anchor point and the
/// relative angle are solved together as one 3x3 block. Setting a positive
/// `frequency` softens only the angular row into a spring-damper, leaving
/// the point rows rigid.
#[derive(Copy, Clone, Debug)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct WeldJoint {
    /// Where the joint is attached on the first body, expressed in the first
    /// body's local frame.
    pub local_anchor1: Point<Real>,
    /// Where the joint is attached on the second body, expressed in the
    /// second body's local frame.
    pub local_anchor2: Point<Real>,
    /// The relative angle locked by this joint.
    pub reference_angle: Real,
    /// The angular spring frequency, in Hertz. Zero or negative keeps the
    /// angular row rigid.
    pub frequency: Real,
    /// The angular spring damping ratio.
    pub damping_ratio: Real,
    /// The accumulated impulse applied by this joint: the point part in
    /// `x, y`, the angular part in `z`.
    pub impulse: Vector3<Real>,

    // Solver state, populated by `init_velocity_constraints`.
    index1: usize,
    index2: usize,
    local_com1: Point<Real>,
    local_com2: Point<Real>,
    im1: Real,
    im2: Real,
    ii1: Real,
    ii2: Real,
    r1: Vector<Real>,
    r2: Vector<Real>,
    // The inverse of the effective-mass matrix (with the angular row
    // replaced by its softened version when the spring is enabled).
    mass: SdpMatrix3,
    gamma: Real,
    bias: Real,
}

impl WeldJoint {
    /// Creates a new weld joint from the local anchors and the locked
    /// relative angle.
    pub fn new(local_anchor1: Point<Real>, local_anchor2: Point<Real>, reference_angle: Real) -> Self {
        Self {
            local_anchor1,
            local_anchor2,
            reference_angle,
            frequency: 0.0,
            damping_ratio: 0.0,
            impulse: na::zero(),
            index1: 0,
            index2: 0,
            local_com1: Point::origin(),
            local_com2: Point::origin(),
            im1: 0.0,
            im2: 0.0,
            ii1: 0.0,
            ii2: 0.0,
            r1: na::zero(),
            r2: na::zero(),
            mass: SdpMatrix3::zero(),
            gamma: 0.0,
            bias: 0.0,
        }
    }

    /// Creates a new weld joint freezing the two bodies in their current
    /// relative pose, anchored at the given world-space point.
    pub fn from_world_anchor(rb1: &RigidBody, rb2: &RigidBody, anchor: Point<Real>) -> Self {
        let local_anchor1 = rb1.position().inverse_transform_point(&anchor);
        let local_anchor2 = rb2.position().inverse_transform_point(&anchor);
        let reference_angle = rb2.sweep().a - rb1.sweep().a;
        Self::new(local_anchor1, local_anchor2, reference_angle)
    }

    /// Softens the angular row into a spring-damper.
    pub fn with_angular_spring(mut self, frequency: Real, damping_ratio: Real) -> Self {
        assert!(
            frequency >= 0.0 && damping_ratio >= 0.0,
            "The spring frequency and damping ratio cannot be negative."
        );
        self.frequency = frequency;
        self.damping_ratio = damping_ratio;
        self
    }

    pub(crate) fn init_velocity_constraints(
        &mut self,
        rb1: &RigidBody,
        rb2: &RigidBody,
        data: &mut SolverData,
    ) {
        self.index1 = rb1.active_set_offset;
        self.index2 = rb2.active_set_offset;
        self.local_com1 = rb1.local_com();
        self.local_com2 = rb2.local_com();
        self.im1 = rb1.effective_inv_mass;
        self.im2 = rb2.effective_inv_mass;
        self.ii1 = rb1.effective_inv_inertia;
        self.ii2 = rb2.effective_inv_inertia;

        let position1 = data.positions[self.index1];
        let position2 = data.positions[self.index2];

        self.r1 = position1.rotation() * (self.local_anchor1 - self.local_com1);
        self.r2 = position2.rotation() * (self.local_anchor2 - self.local_com2);

        let (im1, im2, ii1, ii2) = (self.im1, self.im2, self.ii1, self.ii2);
        let (r1, r2) = (self.r1, self.r2);

        let k = SdpMatrix3::new(
            im1 + im2 + r1.y * r1.y * ii1 + r2.y * r2.y * ii2,
            -r1.y * r1.x * ii1 - r2.y * r2.x * ii2,
            -r1.y * ii1 - r2.y * ii2,
            im1 + im2 + r1.x * r1.x * ii1 + r2.x * r2.x * ii2,
            r1.x * ii1 + r2.x * ii2,
            ii1 + ii2,
        );

        if self.frequency > 0.0 {
            // Only the point rows stay rigid: invert the 2x2 block and
            // soften the decoupled angular row.
            let point_mass =
                SdpMatrix2::new(k.m11, k.m12, k.m22).inverse_unchecked();
            let mut inv_m = ii1 + ii2;
            let m = utils::inv(inv_m);

            let c = position2.a - position1.a - self.reference_angle;
            let omega = Real::two_pi() * self.frequency;
            let d = 2.0 * m * self.damping_ratio * omega;
            let spring_k = m * omega * omega;
            let h = data.dt();
            self.gamma = utils::inv(h * (d + h * spring_k));
            self.bias = c * h * spring_k * self.gamma;
            inv_m += self.gamma;

            self.mass = SdpMatrix3::new(
                point_mass.m11,
                point_mass.m12,
                0.0,
                point_mass.m22,
                0.0,
                utils::inv(inv_m),
            );
        } else {
            self.mass = k.inverse_unchecked();
            self.gamma = 0.0;
            self.bias = 0.0;
        }

        self.impulse *= data.warmstart_factor();

        let p = Vector::new(self.impulse.x, self.impulse.y);
        let mut vels1 = data.velocities[self.index1];
        let mut vels2 = data.velocities[self.index2];
        vels1.linvel -= p * im1;
        vels1.angvel -= ii1 * (r1.gcross(p) + self.impulse.z);
        vels2.linvel += p * im2;
        vels2.angvel += ii2 * (r2.gcross(p) + self.impulse.z);
        data.velocities[self.index1] = vels1;
        data.velocities[self.index2] = vels2;
    }

    pub(crate) fn solve_velocity_constraints(&mut self, data: &mut SolverData) {
        let mut vels1 = data.velocities[self.index1];
        let mut vels2 = data.velocities[self.index2];

        let (im1, im2, ii1, ii2) = (self.im1, self.im2, self.ii1, self.ii2);

        if self.frequency > 0.0 {
            let cdot2 = vels2.angvel - vels1.angvel;
            let impulse2 = -self.mass.m33 * (cdot2 + self.bias + self.gamma * self.impulse.z);
            self.impulse.z += impulse2;

            vels1.angvel -= ii1 * impulse2;
            vels2.angvel += ii2 * impulse2;

            let cdot1 = vels2.velocity_at_offset(self.r2) - vels1.velocity_at_offset(self.r1);
            let impulse1 = -(SdpMatrix2::new(self.mass.m11, self.mass.m12, self.mass.m22) * cdot1);
            self.impulse.x += impulse1.x;
            self.impulse.y += impulse1.y;

            vels1.linvel -= impulse1 * im1;
            vels1.angvel -= ii1 * self.r1.gcross(impulse1);
            vels2.linvel += impulse1 * im2;
            vels2.angvel += ii2 * self.r2.gcross(impulse1);
        } else {
            let cdot1 = vels2.velocity_at_offset(self.r2) - vels1.velocity_at_offset(self.r1);
            let cdot2 = vels2.angvel - vels1.angvel;
            let cdot = Vector3::new(cdot1.x, cdot1.y, cdot2);

            let impulse = -(self.mass * cdot);
            self.impulse += impulse;

            let p = Vector::new(impulse.x, impulse.y);
            vels1.linvel -= p * im1;
            vels1.angvel -= ii1 * (self.r1.gcross(p) + impulse.z);
            vels2.linvel += p * im2;
            vels2.angvel += ii2 * (self.r2.gcross(p) + impulse.z);
        }

        data.velocities[self.index1] = vels1;
        data.velocities[self.index2] = vels2;
    }

    pub(crate) fn solve_position_constraints(&mut self, data: &mut SolverData) -> bool {
        let mut position1 = data.positions[self.index1];
        let mut position2 = data.positions[self.index2];

        let (im1, im2, ii1, ii2) = (self.im1, self.im2, self.ii1, self.ii2);

        let r1 = position1.rotation() * (self.local_anchor1 - self.local_com1);
        let r2 = position2.rotation() * (self.local_anchor2 - self.local_com2);

        let c1 = (position2.c + r2) - (position1.c + r1);
        let position_error = c1.norm();
        let angular_error;

        let k = SdpMatrix3::new(
            im1 + im2 + r1.y * r1.y * ii1 + r2.y * r2.y * ii2,
            -r1.y * r1.x * ii1 - r2.y * r2.x * ii2,
            -r1.y * ii1 - r2.y * ii2,
            im1 + im2 + r1.x * r1.x * ii1 + r2.x * r2.x * ii2,
            r1.x * ii1 + r2.x * ii2,
            ii1 + ii2,
        );

        if self.frequency > 0.0 {
            // The angular spring absorbs its own drift; only the point
            // constraint is corrected.
            angular_error = 0.0;

            let p = -SdpMatrix2::new(k.m11, k.m12, k.m22).solve(c1);
            position1.c -= p * im1;
            position1.a -= ii1 * r1.gcross(p);
            position2.c += p * im2;
            position2.a += ii2 * r2.gcross(p);
        } else {
            let c2 = position2.a - position1.a - self.reference_angle;
            angular_error = c2.abs();

            let c = Vector3::new(c1.x, c1.y, c2);
            let impulse = if k.m33 > 0.0 {
                -k.solve33(c)
            } else {
                let impulse2 = -SdpMatrix2::new(k.m11, k.m12, k.m22).solve(c1);
                Vector3::new(impulse2.x, impulse2.y, 0.0)
            };

            let p = Vector::new(impulse.x, impulse.y);
            position1.c -= p * im1;
            position1.a -= ii1 * (r1.gcross(p) + impulse.z);
            position2.c += p * im2;
            position2.a += ii2 * (r2.gcross(p) + impulse.z);
        }

        data.positions[self.index1] = position1;
        data.positions[self.index2] = position2;

        position_error <= data.params.allowed_linear_error
            && angular_error <= data.params.allowed_angular_error
    }

    /// The force applied by this joint over the last step, given the inverse
    /// timestep length of that step.
    pub fn reaction_force(&self, inv_dt: Real) -> Vector<Real> {
        Vector::new(self.impulse.x, self.impulse.y) * inv_dt
    }

    /// The torque applied by this joint over the last step.
    pub fn reaction_torque(&self, inv_dt: Real) -> Real {
        self.impulse.z * inv_dt
    }
}
