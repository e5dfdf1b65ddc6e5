//! Error types for image handling.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while reading, preparing or writing images.
#[derive(Error, Debug)]
pub enum VisionError {
    /// An array does not have the expected image layout.
    #[error("Invalid image shape: expected {expected}, got {got:?}")]
    InvalidImageShape {
        /// Description of the expected layout.
        expected: String,
        /// Actual dimensions.
        got: Vec<usize>,
    },

    /// An image file could not be decoded.
    #[error("Failed to decode image {}: {source}", path.display())]
    Decode {
        /// File being decoded.
        path: PathBuf,
        /// Decoder error.
        #[source]
        source: image::ImageError,
    },

    /// An image file could not be written.
    #[error("Failed to write image {}: {source}", path.display())]
    Encode {
        /// File being written.
        path: PathBuf,
        /// Encoder error.
        #[source]
        source: image::ImageError,
    },

    /// The input directory could not be listed.
    #[error("Failed to read directory {}: {source}", path.display())]
    ReadDir {
        /// Directory being listed.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Result type for image operations.
pub type Result<T> = std::result::Result<T, VisionError>;
