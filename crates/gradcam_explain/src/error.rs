//! Error types for Grad-CAM computation.

use gradcam_core::CoreError;
use thiserror::Error;

/// Errors raised while computing a class activation map.
#[derive(Error, Debug)]
pub enum ExplainError {
    /// A target layer was never visited by the forward pass.
    #[error("Target layer '{name}' not found in {architecture}")]
    UnknownTargetLayer {
        /// Requested layer name.
        name: String,
        /// Architecture that was run.
        architecture: String,
    },

    /// No target layer was configured.
    #[error("No target layer configured")]
    NoTargetLayers,

    /// A captured activation received no gradient from the backward pass.
    #[error("No gradient reached target layer '{layer}'")]
    MissingGradient {
        /// Layer whose gradient is missing.
        layer: String,
    },

    /// Requested class index is not produced by the head.
    #[error("Class index {index} out of range for {num_classes} classes")]
    ClassIndexOutOfRange {
        /// Requested index.
        index: usize,
        /// Size of the classification head.
        num_classes: usize,
    },

    /// Activation and gradient shapes disagree.
    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),

    /// Tensor data could not be read back.
    #[error("Tensor data error: {0}")]
    TensorData(String),

    /// Input tensor does not look like a single preprocessed image.
    #[error(transparent)]
    Core(#[from] CoreError),
}

/// Result type for Grad-CAM operations.
pub type Result<T> = std::result::Result<T, ExplainError>;
