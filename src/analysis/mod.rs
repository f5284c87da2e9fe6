//! Structural analysis of built trees.
pub mod levels;

pub use levels::compute_levels;
