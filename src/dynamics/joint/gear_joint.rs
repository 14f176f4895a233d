use crate::dynamics::joint::{Joint, JointParams};
use crate::dynamics::solver::SolverData;
use crate::dynamics::{RigidBodyHandle, RigidBodySet};
use crate::math::{Point, Real, Rotation, Vector};
use crate::utils::{self, WCross, WDot};
use na::Unit;

/// The kind of sub-joint a gear side was built from.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub enum GearSource {
    /// The side follows a revolute joint: its coordinate is an angle.
    Revolute,
    /// The side follows a prismatic joint: its coordinate is a translation.
    Prismatic,
}

/// A joint that couples the coordinates of two existing revolute or
/// prismatic joints: `coordinate1 + ratio * coordinate2` is held constant.
///
/// The gear only reads the static geometry of its source joints (anchors,
/// axes, reference angles) once, at construction. It keeps no live
/// reference to them: mutating or destroying a source joint afterwards
/// leaves the gear solving against a stale snapshot, with undefined
/// results. Each source joint is expected to attach one dynamic body to one
/// static body; this is not validated.
///
/// The constraint spans up to four bodies: the two dynamic bodies plus the
/// two bodies the source joints anchor them to.
#[derive(Copy, Clone, Debug)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct GearJoint {
    /// The transmission ratio between the two coordinates.
    pub ratio: Real,
    /// The accumulated impulse applied by this joint.
    pub impulse: Real,

    source1: GearSource,
    source2: GearSource,
    body_a: RigidBodyHandle,
    body_b: RigidBodyHandle,
    body_c: RigidBodyHandle,
    body_d: RigidBodyHandle,
    // Geometry snapshot of the two source joints.
    local_anchor_a: Point<Real>,
    local_anchor_b: Point<Real>,
    local_anchor_c: Point<Real>,
    local_anchor_d: Point<Real>,
    local_axis_c: Unit<Vector<Real>>,
    local_axis_d: Unit<Vector<Real>>,
    reference_angle1: Real,
    reference_angle2: Real,
    constant: Real,

    // Solver state, populated by `init_velocity_constraints`.
    index_a: usize,
    index_b: usize,
    index_c: usize,
    index_d: usize,
    local_com_a: Point<Real>,
    local_com_b: Point<Real>,
    local_com_c: Point<Real>,
    local_com_d: Point<Real>,
    im_a: Real,
    im_b: Real,
    im_c: Real,
    im_d: Real,
    ii_a: Real,
    ii_b: Real,
    ii_c: Real,
    ii_d: Real,
    jv_ac: Vector<Real>,
    jv_bd: Vector<Real>,
    jw_a: Real,
    jw_b: Real,
    jw_c: Real,
    jw_d: Real,
    mass: Real,
}

struct GearSide {
    source: GearSource,
    anchor1: Point<Real>,
    anchor2: Point<Real>,
    axis1: Unit<Vector<Real>>,
    reference_angle: Real,
    coordinate: Real,
}

/// Reads the geometry snapshot of one source joint and the current value of
/// its coordinate.
fn snapshot_side(bodies: &RigidBodySet, joint: &Joint) -> GearSide {
    let rb1 = &bodies[joint.body1];
    let rb2 = &bodies[joint
        .body2
        .expect("a gear source joint must attach two bodies")];

    match &joint.params {
        JointParams::Revolute(j) => GearSide {
            source: GearSource::Revolute,
            anchor1: j.local_anchor1,
            anchor2: j.local_anchor2,
            axis1: Unit::new_unchecked(Vector::x()),
            reference_angle: j.reference_angle,
            coordinate: rb2.sweep().a - rb1.sweep().a - j.reference_angle,
        },
        JointParams::Prismatic(j) => {
            let q1 = Rotation::new(rb1.sweep().a);
            let q2 = Rotation::new(rb2.sweep().a);
            let p1 = j.local_anchor1 - rb1.local_com();
            let r2 = q2 * (j.local_anchor2 - rb2.local_com());
            let p2 = q1.inverse() * (r2 + (rb2.world_com() - rb1.world_com()));
            GearSide {
                source: GearSource::Prismatic,
                anchor1: j.local_anchor1,
                anchor2: j.local_anchor2,
                axis1: j.local_axis1,
                reference_angle: j.reference_angle,
                coordinate: (p2 - p1).gdot(j.local_axis1.into_inner()),
            }
        }
        _ => panic!("a gear joint can only be built from revolute or prismatic joints"),
    }
}

impl GearJoint {
    /// Creates a new gear joint coupling `joint1` and `joint2` with the
    /// given ratio.
    ///
    /// The gear's own body pair is `(joint1.body2, joint2.body2)`, i.e. the
    /// second (dynamic) body of each source joint. The current value of
    /// `coordinate1 + ratio * coordinate2` becomes the constant the gear
    /// maintains.
    pub fn new(bodies: &RigidBodySet, joint1: &Joint, joint2: &Joint, ratio: Real) -> Self {
        assert!(ratio != 0.0, "The gear ratio cannot be zero.");

        let side1 = snapshot_side(bodies, joint1);
        let side2 = snapshot_side(bodies, joint2);

        Self {
            ratio,
            impulse: 0.0,
            source1: side1.source,
            source2: side2.source,
            body_a: joint1.body2.expect("a gear source joint must attach two bodies"),
            body_b: joint2.body2.expect("a gear source joint must attach two bodies"),
            body_c: joint1.body1,
            body_d: joint2.body1,
            local_anchor_a: side1.anchor2,
            local_anchor_b: side2.anchor2,
            local_anchor_c: side1.anchor1,
            local_anchor_d: side2.anchor1,
            local_axis_c: side1.axis1,
            local_axis_d: side2.axis1,
            reference_angle1: side1.reference_angle,
            reference_angle2: side2.reference_angle,
            constant: side1.coordinate + ratio * side2.coordinate,
            index_a: 0,
            index_b: 0,
            index_c: 0,
            index_d: 0,
            local_com_a: Point::origin(),
            local_com_b: Point::origin(),
            local_com_c: Point::origin(),
            local_com_d: Point::origin(),
            im_a: 0.0,
            im_b: 0.0,
            im_c: 0.0,
            im_d: 0.0,
            ii_a: 0.0,
            ii_b: 0.0,
            ii_c: 0.0,
            ii_d: 0.0,
            jv_ac: na::zero(),
            jv_bd: na::zero(),
            jw_a: 0.0,
            jw_b: 0.0,
            jw_c: 0.0,
            jw_d: 0.0,
            mass: 0.0,
        }
    }

    /// The four bodies this gear spans: the two dynamic bodies, then the
    /// two bodies the source joints anchor them to.
    pub fn bodies(
        &self,
    ) -> (
        RigidBodyHandle,
        RigidBodyHandle,
        RigidBodyHandle,
        RigidBodyHandle,
    ) {
        (self.body_a, self.body_b, self.body_c, self.body_d)
    }

    /// The value of `coordinate1 + ratio * coordinate2` captured at
    /// construction.
    pub fn constant(&self) -> Real {
        self.constant
    }

    pub(crate) fn init_velocity_constraints(
        &mut self,
        bodies: &RigidBodySet,
        data: &mut SolverData,
    ) {
        let rb_a = &bodies[self.body_a];
        let rb_b = &bodies[self.body_b];
        let rb_c = &bodies[self.body_c];
        let rb_d = &bodies[self.body_d];

        self.index_a = rb_a.active_set_offset;
        self.index_b = rb_b.active_set_offset;
        self.index_c = rb_c.active_set_offset;
        self.index_d = rb_d.active_set_offset;
        self.local_com_a = rb_a.local_com();
        self.local_com_b = rb_b.local_com();
        self.local_com_c = rb_c.local_com();
        self.local_com_d = rb_d.local_com();
        self.im_a = rb_a.effective_inv_mass;
        self.im_b = rb_b.effective_inv_mass;
        self.im_c = rb_c.effective_inv_mass;
        self.im_d = rb_d.effective_inv_mass;
        self.ii_a = rb_a.effective_inv_inertia;
        self.ii_b = rb_b.effective_inv_inertia;
        self.ii_c = rb_c.effective_inv_inertia;
        self.ii_d = rb_d.effective_inv_inertia;

        let pos_a = data.positions[self.index_a];
        let pos_b = data.positions[self.index_b];
        let pos_c = data.positions[self.index_c];
        let pos_d = data.positions[self.index_d];

        let mut mass = 0.0;

        match self.source1 {
            GearSource::Revolute => {
                self.jv_ac = na::zero();
                self.jw_a = 1.0;
                self.jw_c = 1.0;
                mass += self.ii_a + self.ii_c;
            }
            GearSource::Prismatic => {
                let u = pos_c.rotation() * self.local_axis_c.into_inner();
                let rc = pos_c.rotation() * (self.local_anchor_c - self.local_com_c);
                let ra = pos_a.rotation() * (self.local_anchor_a - self.local_com_a);
                self.jv_ac = u;
                self.jw_c = rc.gcross(u);
                self.jw_a = ra.gcross(u);
                mass += self.im_c
                    + self.im_a
                    + self.ii_c * self.jw_c * self.jw_c
                    + self.ii_a * self.jw_a * self.jw_a;
            }
        }

        match self.source2 {
            GearSource::Revolute => {
                self.jv_bd = na::zero();
                self.jw_b = self.ratio;
                self.jw_d = self.ratio;
                mass += self.ratio * self.ratio * (self.ii_b + self.ii_d);
            }
            GearSource::Prismatic => {
                let u = pos_d.rotation() * self.local_axis_d.into_inner();
                let rd = pos_d.rotation() * (self.local_anchor_d - self.local_com_d);
                let rb = pos_b.rotation() * (self.local_anchor_b - self.local_com_b);
                self.jv_bd = u * self.ratio;
                self.jw_d = self.ratio * rd.gcross(u);
                self.jw_b = self.ratio * rb.gcross(u);
                mass += self.ratio * self.ratio * (self.im_d + self.im_b)
                    + self.ii_d * self.jw_d * self.jw_d
                    + self.ii_b * self.jw_b * self.jw_b;
            }
        }

        self.mass = utils::inv(mass);

        self.impulse *= data.warmstart_factor();
        self.apply_impulse(self.impulse, data);
    }

    // The four bodies may alias (e.g. both source joints anchored to the
    // same ground body), so each entry is updated in place, one at a time.
    fn apply_impulse(&self, impulse: Real, data: &mut SolverData) {
        let v = &mut data.velocities[self.index_a];
        v.linvel += self.jv_ac * (self.im_a * impulse);
        v.angvel += self.ii_a * impulse * self.jw_a;

        let v = &mut data.velocities[self.index_b];
        v.linvel += self.jv_bd * (self.im_b * impulse);
        v.angvel += self.ii_b * impulse * self.jw_b;

        let v = &mut data.velocities[self.index_c];
        v.linvel -= self.jv_ac * (self.im_c * impulse);
        v.angvel -= self.ii_c * impulse * self.jw_c;

        let v = &mut data.velocities[self.index_d];
        v.linvel -= self.jv_bd * (self.im_d * impulse);
        v.angvel -= self.ii_d * impulse * self.jw_d;
    }

    pub(crate) fn solve_velocity_constraints(&mut self, data: &mut SolverData) {
        let va = data.velocities[self.index_a];
        let vb = data.velocities[self.index_b];
        let vc = data.velocities[self.index_c];
        let vd = data.velocities[self.index_d];

        let cdot = self.jv_ac.gdot(va.linvel - vc.linvel) + self.jv_bd.gdot(vb.linvel - vd.linvel)
            + self.jw_a * va.angvel
            - self.jw_c * vc.angvel
            + self.jw_b * vb.angvel
            - self.jw_d * vd.angvel;

        let impulse = -self.mass * cdot;
        self.impulse += impulse;
        self.apply_impulse(impulse, data);
    }

    pub(crate) fn solve_position_constraints(&mut self, data: &mut SolverData) -> bool {
        let pos_a = data.positions[self.index_a];
        let pos_b = data.positions[self.index_b];
        let pos_c = data.positions[self.index_c];
        let pos_d = data.positions[self.index_d];

        let mut mass = 0.0;

        let (jv_ac, jw_a, jw_c, coordinate1) = match self.source1 {
            GearSource::Revolute => {
                mass += self.ii_a + self.ii_c;
                let coordinate = pos_a.a - pos_c.a - self.reference_angle1;
                (na::zero::<Vector<Real>>(), 1.0, 1.0, coordinate)
            }
            GearSource::Prismatic => {
                let qc = pos_c.rotation();
                let u = qc * self.local_axis_c.into_inner();
                let rc = qc * (self.local_anchor_c - self.local_com_c);
                let ra = pos_a.rotation() * (self.local_anchor_a - self.local_com_a);
                let jw_c = rc.gcross(u);
                let jw_a = ra.gcross(u);
                mass += self.im_c + self.im_a + self.ii_c * jw_c * jw_c + self.ii_a * jw_a * jw_a;

                let pc = self.local_anchor_c - self.local_com_c;
                let pa = qc.inverse() * (ra + (pos_a.c - pos_c.c));
                let coordinate = (pa - pc).gdot(self.local_axis_c.into_inner());
                (u, jw_a, jw_c, coordinate)
            }
        };

        let (jv_bd, jw_b, jw_d, coordinate2) = match self.source2 {
            GearSource::Revolute => {
                mass += self.ratio * self.ratio * (self.ii_b + self.ii_d);
                let coordinate = pos_b.a - pos_d.a - self.reference_angle2;
                (na::zero::<Vector<Real>>(), self.ratio, self.ratio, coordinate)
            }
            GearSource::Prismatic => {
                let qd = pos_d.rotation();
                let u = qd * self.local_axis_d.into_inner();
                let rd = qd * (self.local_anchor_d - self.local_com_d);
                let rb = pos_b.rotation() * (self.local_anchor_b - self.local_com_b);
                let jw_d = self.ratio * rd.gcross(u);
                let jw_b = self.ratio * rb.gcross(u);
                mass += self.ratio * self.ratio * (self.im_d + self.im_b)
                    + self.ii_d * jw_d * jw_d
                    + self.ii_b * jw_b * jw_b;

                let pd = self.local_anchor_d - self.local_com_d;
                let pb = qd.inverse() * (rb + (pos_b.c - pos_d.c));
                let coordinate = (pb - pd).gdot(self.local_axis_d.into_inner());
                (u * self.ratio, jw_b, jw_d, coordinate)
            }
        };

        let c = (coordinate1 + self.ratio * coordinate2) - self.constant;
        let impulse = if mass > 0.0 { -c / mass } else { 0.0 };

        let p = &mut data.positions[self.index_a];
        p.c += jv_ac * (self.im_a * impulse);
        p.a += self.ii_a * impulse * jw_a;

        let p = &mut data.positions[self.index_b];
        p.c += jv_bd * (self.im_b * impulse);
        p.a += self.ii_b * impulse * jw_b;

        let p = &mut data.positions[self.index_c];
        p.c -= jv_ac * (self.im_c * impulse);
        p.a -= self.ii_c * impulse * jw_c;

        let p = &mut data.positions[self.index_d];
        p.c -= jv_bd * (self.im_d * impulse);
        p.a -= self.ii_d * impulse * jw_d;

        c.abs() < data.params.allowed_linear_error
    }

    /// The force applied by this joint over the last step, given the inverse
    /// timestep length of that step.
    pub fn reaction_force(&self, inv_dt: Real) -> Vector<Real> {
        self.jv_ac * (self.impulse * inv_dt)
    }

    /// The torque applied by this joint over the last step.
    pub fn reaction_torque(&self, inv_dt: Real) -> Real {
        self.jw_a * self.impulse * inv_dt
    }
}
