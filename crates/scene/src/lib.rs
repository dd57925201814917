//! Scene math.
//!
//! This crate provides the transforms fed to the uniform buffer:
//! - a look-at camera with a Y-flipped perspective projection
//! - the time-based model rotation

pub mod camera;
pub mod transform;

pub use camera::{Camera, aspect_ratio};
pub use transform::spin;
