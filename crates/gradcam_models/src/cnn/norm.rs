//! Batch normalization with frozen running statistics.
//!
//! Burn's `BatchNorm` picks batch statistics whenever the backend tracks
//! gradients. Grad-CAM runs on an autodiff backend yet must behave like an
//! evaluated network, so the convolutional models normalize with the stored
//! running statistics unconditionally.

use burn::module::Param;
use burn::prelude::*;

const EPSILON: f64 = 1e-5;

/// Inference-mode 2D batch normalization.
#[derive(Module, Debug)]
pub struct FrozenBatchNorm2d<B: Backend> {
    /// Scale (gamma).
    pub weight: Param<Tensor<B, 1>>,
    /// Shift (beta).
    pub bias: Param<Tensor<B, 1>>,
    /// Running mean.
    pub running_mean: Param<Tensor<B, 1>>,
    /// Running variance.
    pub running_var: Param<Tensor<B, 1>>,
}

impl<B: Backend> FrozenBatchNorm2d<B> {
    /// Identity-initialized normalization over `channels` channels.
    pub fn new(channels: usize, device: &B::Device) -> Self {
        Self {
            weight: Param::from_tensor(Tensor::ones([channels], device)),
            bias: Param::from_tensor(Tensor::zeros([channels], device)),
            running_mean: Param::from_tensor(Tensor::zeros([channels], device)),
            running_var: Param::from_tensor(Tensor::ones([channels], device)),
        }
    }

    /// Normalize `x` of shape (batch, channels, height, width).
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let [channels] = self.weight.val().dims();
        let scale = self.weight.val() / (self.running_var.val() + EPSILON).sqrt();
        let shift = self.bias.val() - self.running_mean.val() * scale.clone();

        x * scale.reshape([1, channels, 1, 1]) + shift.reshape([1, channels, 1, 1])
    }
}
