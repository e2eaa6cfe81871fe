//! Numerical primitives: coordinate frames and the perpendicular line fit.

pub mod frame;
pub mod perpendicular;

pub use frame::*;
pub use perpendicular::*;
