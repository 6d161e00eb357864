//! Strata math - shared math types for scene translation.
//!
//! Re-exports `glam` so every crate in the workspace agrees on matrix and
//! vector types, and adds the few helpers the translator needs on top.

// Re-export glam for convenience
pub use glam::*;

mod interval;
mod transform;

pub use interval::Interval;
pub use transform::to_render_matrix;
