//! Miscellaneous utilities.

use crate::math::{Real, Vector};
use na::{Matrix2, Vector3};

const INV_EPSILON: Real = 1.0e-20;

/// A zero-preserving inverse: returns `0.0` instead of dividing by a
/// near-zero value.
pub(crate) fn inv(val: Real) -> Real {
    if (-INV_EPSILON..=INV_EPSILON).contains(&val) {
        0.0
    } else {
        1.0 / val
    }
}

/// Trait to compute the cross product between elements of possibly
/// different dimensions.
///
/// In 2D the cross product of two vectors is a scalar, and the cross
/// product of a scalar (an angular velocity) with a vector is a vector.
pub trait WCross<Rhs>: Sized {
    /// The result of the cross product.
    type Result;
    /// Computes the cross product `self × rhs`.
    fn gcross(&self, rhs: Rhs) -> Self::Result;
}

impl WCross<Vector<Real>> for Vector<Real> {
    type Result = Real;

    fn gcross(&self, rhs: Vector<Real>) -> Self::Result {
        self.x * rhs.y - self.y * rhs.x
    }
}

impl WCross<Vector<Real>> for Real {
    type Result = Vector<Real>;

    fn gcross(&self, rhs: Vector<Real>) -> Self::Result {
        Vector::new(-rhs.y * *self, rhs.x * *self)
    }
}

/// Trait to compute the dot product between elements of possibly
/// different dimensions.
pub trait WDot<Rhs>: Sized {
    /// The result of the dot product.
    type Result;
    /// Computes the dot product `self · rhs`.
    fn gdot(&self, rhs: Rhs) -> Self::Result;
}

impl WDot<Vector<Real>> for Vector<Real> {
    type Result = Real;

    fn gdot(&self, rhs: Vector<Real>) -> Self::Result {
        self.x * rhs.x + self.y * rhs.y
    }
}

impl WDot<Real> for Real {
    type Result = Real;

    fn gdot(&self, rhs: Real) -> Self::Result {
        *self * rhs
    }
}

/// Trait to compute a vector orthogonal to `self`.
pub trait WBasis: Sized {
    /// Computes a vector orthogonal to `self`, with the same magnitude.
    fn orthonormal_vector(self) -> Self;
}

impl WBasis for Vector<Real> {
    fn orthonormal_vector(self) -> Vector<Real> {
        Vector::new(-self.y, self.x)
    }
}

/// A 2x2 symmetric positive (semi-)definite matrix.
///
/// This is the shape of every two-dimensional effective-mass matrix
/// `J M⁻¹ Jᵗ` assembled by the joints.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct SdpMatrix2 {
    /// The component at the first row and first column.
    pub m11: Real,
    /// The component at the first row and second column.
    pub m12: Real,
    /// The component at the second row and second column.
    pub m22: Real,
}

impl SdpMatrix2 {
    /// Builds the matrix from its three distinct components.
    pub fn new(m11: Real, m12: Real, m22: Real) -> Self {
        Self { m11, m12, m22 }
    }

    /// The matrix with all its components set to zero.
    pub fn zero() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }

    /// Adds `elt` to the two diagonal components of `self`.
    pub fn add_diagonal(&self, elt: Real) -> Self {
        Self::new(self.m11 + elt, self.m12, self.m22 + elt)
    }

    /// The inverse of `self`, or the zero matrix if `self` is singular.
    pub fn inverse_unchecked(&self) -> Self {
        let determinant = self.m11 * self.m22 - self.m12 * self.m12;
        let inv_det = inv(determinant);
        Self::new(
            self.m22 * inv_det,
            -self.m12 * inv_det,
            self.m11 * inv_det,
        )
    }

    /// Solves `self * x = b`, or returns zero if `self` is singular.
    pub fn solve(&self, b: Vector<Real>) -> Vector<Real> {
        let determinant = self.m11 * self.m22 - self.m12 * self.m12;
        let inv_det = inv(determinant);
        Vector::new(
            inv_det * (self.m22 * b.x - self.m12 * b.y),
            inv_det * (self.m11 * b.y - self.m12 * b.x),
        )
    }

    /// Converts this matrix to a regular `Matrix2`.
    pub fn into_matrix(self) -> Matrix2<Real> {
        Matrix2::new(self.m11, self.m12, self.m12, self.m22)
    }
}

impl std::ops::Mul<Vector<Real>> for SdpMatrix2 {
    type Output = Vector<Real>;

    fn mul(self, rhs: Vector<Real>) -> Vector<Real> {
        Vector::new(
            self.m11 * rhs.x + self.m12 * rhs.y,
            self.m12 * rhs.x + self.m22 * rhs.y,
        )
    }
}

/// A 3x3 symmetric positive (semi-)definite matrix.
///
/// Used for the coupled point + angle constraints (weld, revolute and
/// prismatic joints with an active limit). The rows are ordered as the
/// constraint equations: two linear rows first, then the angular row.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct SdpMatrix3 {
    /// The component at the first row and first column.
    pub m11: Real,
    /// The component at the first row and second column.
    pub m12: Real,
    /// The component at the first row and third column.
    pub m13: Real,
    /// The component at the second row and second column.
    pub m22: Real,
    /// The component at the second row and third column.
    pub m23: Real,
    /// The component at the third row and third column.
    pub m33: Real,
}

impl SdpMatrix3 {
    /// Builds the matrix from its six distinct components.
    pub fn new(m11: Real, m12: Real, m13: Real, m22: Real, m23: Real, m33: Real) -> Self {
        Self {
            m11,
            m12,
            m13,
            m22,
            m23,
            m33,
        }
    }

    /// The matrix with all its components set to zero.
    pub fn zero() -> Self {
        Self::new(0.0, 0.0, 0.0, 0.0, 0.0, 0.0)
    }

    /// The first column of the matrix.
    fn col1(&self) -> Vector3<Real> {
        Vector3::new(self.m11, self.m12, self.m13)
    }

    /// The second column of the matrix.
    fn col2(&self) -> Vector3<Real> {
        Vector3::new(self.m12, self.m22, self.m23)
    }

    /// The third column of the matrix.
    fn col3(&self) -> Vector3<Real> {
        Vector3::new(self.m13, self.m23, self.m33)
    }

    /// The inverse of `self`, or the zero matrix if `self` is singular.
    pub fn inverse_unchecked(&self) -> Self {
        let minor_m22_m33 = self.m22 * self.m33 - self.m23 * self.m23;
        let minor_m12_m33 = self.m12 * self.m33 - self.m13 * self.m23;
        let minor_m12_m23 = self.m12 * self.m23 - self.m13 * self.m22;

        let determinant =
            self.m11 * minor_m22_m33 - self.m12 * minor_m12_m33 + self.m13 * minor_m12_m23;
        let inv_det = inv(determinant);

        SdpMatrix3 {
            m11: minor_m22_m33 * inv_det,
            m12: -minor_m12_m33 * inv_det,
            m13: minor_m12_m23 * inv_det,
            m22: (self.m11 * self.m33 - self.m13 * self.m13) * inv_det,
            m23: (self.m13 * self.m12 - self.m23 * self.m11) * inv_det,
            m33: (self.m11 * self.m22 - self.m12 * self.m12) * inv_det,
        }
    }

    /// Solves `self * x = b` with Cramer's rule, or returns zero if
    /// `self` is singular.
    pub fn solve33(&self, b: Vector3<Real>) -> Vector3<Real> {
        let (ex, ey, ez) = (self.col1(), self.col2(), self.col3());
        let det = inv(ex.dot(&ey.cross(&ez)));
        Vector3::new(
            det * b.dot(&ey.cross(&ez)),
            det * ex.dot(&b.cross(&ez)),
            det * ex.dot(&ey.cross(&b)),
        )
    }

    /// Solves the 2x2 system formed by the upper-left block of `self`,
    /// or returns zero if that block is singular.
    ///
    /// This is the reduced solve used by the block elimination of the
    /// 3x3 limit constraints: the linear rows are re-solved while the
    /// clamped angular row is held fixed.
    pub fn solve22(&self, b: Vector<Real>) -> Vector<Real> {
        let det = inv(self.m11 * self.m22 - self.m12 * self.m12);
        Vector::new(
            det * (self.m22 * b.x - self.m12 * b.y),
            det * (self.m11 * b.y - self.m12 * b.x),
        )
    }
}

impl std::ops::Mul<Vector3<Real>> for SdpMatrix3 {
    type Output = Vector3<Real>;

    fn mul(self, rhs: Vector3<Real>) -> Vector3<Real> {
        Vector3::new(
            self.m11 * rhs.x + self.m12 * rhs.y + self.m13 * rhs.z,
            self.m12 * rhs.x + self.m22 * rhs.y + self.m23 * rhs.z,
            self.m13 * rhs.x + self.m23 * rhs.y + self.m33 * rhs.z,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn inv_is_zero_preserving() {
        assert_eq!(inv(0.0), 0.0);
        assert_eq!(inv(2.0), 0.5);
        assert_eq!(inv(-4.0), -0.25);
    }

    #[test]
    fn sdp2_solve_matches_inverse() {
        let m = SdpMatrix2::new(4.0, 1.0, 3.0);
        let b = Vector::new(1.0, -2.0);
        let x = m.solve(b);
        assert_relative_eq!(m * x, b, epsilon = 1.0e-5);
        let x2 = m.inverse_unchecked() * b;
        assert_relative_eq!(x, x2, epsilon = 1.0e-5);
    }

    #[test]
    fn sdp2_singular_solve_is_zero() {
        let m = SdpMatrix2::zero();
        assert_eq!(m.solve(Vector::new(1.0, 1.0)), Vector::zeros());
    }

    #[test]
    fn sdp3_solve33_matches_inverse() {
        let m = SdpMatrix3::new(4.0, 1.0, 0.5, 3.0, 0.25, 2.0);
        let b = Vector3::new(1.0, -2.0, 0.5);
        let x = m.solve33(b);
        assert_relative_eq!(m * x, b, epsilon = 1.0e-4);
        let x2 = m.inverse_unchecked() * b;
        assert_relative_eq!(x, x2, epsilon = 1.0e-4);
    }

    #[test]
    fn sdp3_solve22_ignores_angular_row() {
        let m = SdpMatrix3::new(4.0, 1.0, 100.0, 3.0, 100.0, 100.0);
        let b = Vector::new(1.0, -2.0);
        let x = m.solve22(b);
        assert_relative_eq!(4.0 * x.x + 1.0 * x.y, b.x, epsilon = 1.0e-5);
        assert_relative_eq!(1.0 * x.x + 3.0 * x.y, b.y, epsilon = 1.0e-5);
    }

    #[test]
    fn gcross_identities() {
        let a = Vector::new(1.0, 2.0);
        let b = Vector::new(3.0, 4.0);
        assert_eq!(a.gcross(b), -b.gcross(a));
        let w: Real = 2.0;
        assert_eq!(w.gcross(a), Vector::new(-4.0, 2.0));
    }
}
