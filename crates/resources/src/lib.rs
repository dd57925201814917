//! Asset loading.
//!
//! This crate reads the files the renderer consumes:
//! - raw bytes (SPIR-V shader code)
//! - images decoded to RGBA8
//! - OBJ models flattened into deduplicated vertex and index lists

pub mod error;
pub mod loader;
pub mod model;

pub use error::{ResourceError, ResourceResult};
pub use loader::{ImageData, load_image, read_file};
pub use model::{MeshBuilder, MeshData, load_model, parse_obj};
