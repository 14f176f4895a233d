//! # pivot2d
//!
//! pivot2d is the joint constraint-solving core of a 2-dimensional rigid-body
//! physics engine. It provides a family of joint types (distance, rope,
//! revolute, prismatic, weld, wheel, pulley, gear, motor, angle, mouse) that
//! restrict the relative motion of one or two bodies, together with the
//! per-step protocol an island driver uses to enforce them: initialize the
//! velocity constraints once, iterate the velocity solve, integrate
//! positions, then iterate the position solve.
//!
//! The solver is a sequential-impulse iterative method with warm-starting
//! and clamped position correction. It trades exactness for stability and
//! predictable real-time cost: constraints converge over a fixed number of
//! Gauss-Seidel iterations instead of being solved as an exact LCP.

#![deny(bare_trait_objects)]
#![warn(missing_docs)]
#![allow(clippy::too_many_arguments)]
#![allow(clippy::module_inception)]

pub extern crate nalgebra as na;
#[cfg(feature = "serde-serialize")]
#[macro_use]
extern crate serde;

pub mod data;
pub mod dynamics;
pub mod math;
pub mod utils;

/// The most commonly used types re-exported in one place.
pub mod prelude {
    pub use crate::dynamics::*;
    pub use crate::math::*;
}
