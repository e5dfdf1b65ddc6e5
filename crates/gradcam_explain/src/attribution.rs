//! Grad-CAM map computation.
//!
//! The tensor half ([`channel_weights`], [`grad_cam`]) runs on the backend;
//! the post-processing half ([`normalize_shifted_max`]) works on the host
//! copy of the map.

use burn::prelude::*;
use ndarray::Array2;

use crate::error::{ExplainError, Result};

/// Per-channel Grad-CAM weights.
///
/// # Arguments
///
/// * `gradients` - Gradients w.r.t. activations (batch, channels, height, width)
///
/// # Returns
///
/// The spatial mean of each channel, shape (batch, channels, 1, 1).
pub fn channel_weights<B: Backend>(gradients: Tensor<B, 4>) -> Tensor<B, 4> {
    gradients.mean_dim(3).mean_dim(2)
}

/// Compute the rectified Grad-CAM map of the first batch element.
///
/// # Arguments
///
/// * `activations` - Activations of the target layer (batch, channels, height, width)
/// * `gradients` - Gradients w.r.t. those activations, same shape
///
/// # Returns
///
/// Map of shape (height, width) with negatives clipped to zero.
pub fn grad_cam<B: Backend>(activations: Tensor<B, 4>, gradients: Tensor<B, 4>) -> Result<Tensor<B, 2>> {
    let act_dims = activations.dims();
    let grad_dims = gradients.dims();
    if act_dims != grad_dims {
        return Err(ExplainError::ShapeMismatch(format!(
            "activations {act_dims:?} vs gradients {grad_dims:?}"
        )));
    }
    let [_, _, height, width] = act_dims;

    // (batch, channels, h, w) * (batch, channels, 1, 1) -> (batch, 1, h, w)
    let cam = (activations * channel_weights(gradients)).sum_dim(1);

    Ok(cam.slice([0..1]).reshape([height, width]).clamp_min(0.0))
}

/// Copy a 2D tensor to the host.
pub fn to_array2<B: Backend>(tensor: Tensor<B, 2>) -> Result<Array2<f32>> {
    let [height, width] = tensor.dims();
    let values = tensor
        .into_data()
        .to_vec::<f32>()
        .map_err(|e| ExplainError::TensorData(format!("{e:?}")))?;
    Array2::from_shape_vec((height, width), values)
        .map_err(|e| ExplainError::ShapeMismatch(e.to_string()))
}

/// Shift the map to a zero minimum, then divide by the shifted maximum.
///
/// A map whose shifted maximum is zero (constant map) becomes all zeros.
pub fn normalize_shifted_max(mut map: Array2<f32>) -> Array2<f32> {
    if map.is_empty() {
        return map;
    }

    let min = map.iter().copied().fold(f32::INFINITY, f32::min);
    map.mapv_inplace(|v| v - min);

    let max = map.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    if max > 0.0 {
        map.mapv_inplace(|v| v / max);
    } else {
        map.fill(0.0);
    }
    map
}
