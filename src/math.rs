//! Compact definitions of the 2D math types used by the solver.

pub use crate::utils::{SdpMatrix2, SdpMatrix3};

/// The scalar type used throughout the engine.
#[cfg(feature = "f64")]
pub type Real = f64;
/// The scalar type used throughout the engine.
#[cfg(not(feature = "f64"))]
pub type Real = f32;

/// The dimension of the ambient space.
pub const DIM: usize = 2;

/// The number of degrees of freedom of a rigid body: two linear, one angular.
pub const SPATIAL_DIM: usize = 3;

/// A 2D vector.
pub type Vector<N> = na::Vector2<N>;
/// A 2D point.
pub type Point<N> = na::Point2<N>;
/// The angular part of a 2D spatial vector: a single scalar.
pub type AngVector<N> = N;
/// A 2D rotation, represented as a unit complex number.
pub type Rotation<N> = na::UnitComplex<N>;
/// The inverse angular inertia of a 2D rigid body: a single scalar.
pub type AngularInertia<N> = N;
/// A 2D isometry: rotation followed by translation.
pub type Isometry<N> = na::Isometry2<N>;
/// A 2D translation.
pub type Translation<N> = na::Translation2<N>;
