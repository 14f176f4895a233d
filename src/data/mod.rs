//! Data structures used by the simulation sets.

pub mod arena;

pub use arena::{Arena, Index};
