//! Network input preparation.

use burn::prelude::*;
use ndarray::Array3;

use crate::error::{Result, VisionError};

/// ImageNet channel means, RGB order.
pub const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];

/// ImageNet channel standard deviations, RGB order.
pub const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Turn a BGR image into a normalized network input.
///
/// The image is reordered to RGB, normalized per channel with the ImageNet
/// statistics, laid out channel-first and wrapped as a tensor that tracks
/// gradients.
///
/// # Arguments
///
/// * `image` - Array of shape (height, width, 3), BGR, values in [0, 1]
///
/// # Returns
///
/// Tensor of shape (1, 3, height, width).
pub fn preprocess_image<B: Backend>(image: &Array3<f32>, device: &B::Device) -> Result<Tensor<B, 4>> {
    let (height, width, channels) = image.dim();
    if channels != 3 {
        return Err(VisionError::InvalidImageShape {
            expected: "(height, width, 3)".to_string(),
            got: image.shape().to_vec(),
        });
    }

    let mut data = Vec::with_capacity(3 * height * width);
    for c in 0..3 {
        // BGR -> RGB
        let plane = image.index_axis(ndarray::Axis(2), 2 - c);
        data.extend(plane.iter().map(|v| (v - IMAGENET_MEAN[c]) / IMAGENET_STD[c]));
    }

    let tensor = Tensor::<B, 4>::from_data(TensorData::new(data, [1, 3, height, width]), device);
    Ok(tensor.require_grad())
}
