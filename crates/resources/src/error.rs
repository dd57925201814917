//! Error types for resource loading.

use std::path::PathBuf;
use thiserror::Error;

/// Error type for resource loading operations.
#[derive(Error, Debug)]
pub enum ResourceError {
    /// A file could not be read.
    #[error("Failed to read '{path}': {source}")]
    Read {
        /// Path to the file that failed to load.
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// IO error during file operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Image decoding error.
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// OBJ parsing error.
    #[error("OBJ error: {0}")]
    Obj(#[from] tobj::LoadError),

    /// An OBJ index pointed outside its attribute array.
    #[error("Model '{model}' references missing {attribute} at index {index}")]
    IndexOutOfRange {
        /// Name of the OBJ model.
        model: String,
        /// Attribute that was indexed.
        attribute: &'static str,
        /// Offending index.
        index: u32,
    },

    /// The file produced no triangles.
    #[error("Model '{0}' contains no geometry")]
    EmptyModel(PathBuf),
}

/// Result type alias for resource operations.
pub type ResourceResult<T> = Result<T, ResourceError>;
