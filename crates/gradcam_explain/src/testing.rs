//! Small networks with known weights and layout for unit tests.

use burn::module::Param;
use burn::nn::{
    conv::{Conv2d, Conv2dConfig},
    Linear, LinearConfig, PaddingConfig2d,
};
use burn::prelude::*;
use burn::tensor::activation::relu;

use gradcam_core::{CamArchitecture, LayerTap};

/// conv3×3 → relu → linear head over the flattened map.
#[derive(Module, Debug)]
pub struct TinyNet<B: Backend> {
    conv: Conv2d<B>,
    fc: Linear<B>,
    num_classes: usize,
}

impl<B: Backend> TinyNet<B> {
    pub fn new(size: usize, num_classes: usize, device: &B::Device) -> Self {
        Self {
            conv: Conv2dConfig::new([3, 4], [3, 3])
                .with_padding(PaddingConfig2d::Explicit(1, 1))
                .init(device),
            fc: LinearConfig::new(4 * size * size, num_classes).init(device),
            num_classes,
        }
    }
}

impl<B: Backend> CamArchitecture<B> for TinyNet<B> {
    fn name(&self) -> &'static str {
        "tiny"
    }

    fn target_layers(&self) -> Vec<String> {
        vec!["relu".to_string()]
    }

    fn num_classes(&self) -> usize {
        self.num_classes
    }

    fn run_backbone(&self, x: Tensor<B, 4>, tap: &mut dyn LayerTap<B>) -> Tensor<B, 4> {
        let x = tap.tap("conv", self.conv.forward(x));
        tap.tap("relu", relu(x))
    }

    fn run_head(&self, features: Tensor<B, 2>) -> Tensor<B, 2> {
        self.fc.forward(features)
    }
}

/// Single linear layer over the raw input, the input itself reported as `"input"`.
#[derive(Module, Debug)]
pub struct LinearNet<B: Backend> {
    fc: Linear<B>,
    num_classes: usize,
}

impl<B: Backend> LinearNet<B> {
    /// `weight` is row-major `[in_features, num_classes]`.
    pub fn from_weights(
        weight: Vec<f32>,
        bias: Vec<f32>,
        in_features: usize,
        device: &B::Device,
    ) -> Self {
        let num_classes = bias.len();
        let mut fc = LinearConfig::new(in_features, num_classes).init(device);
        fc.weight = Param::from_tensor(Tensor::from_data(
            TensorData::new(weight, [in_features, num_classes]),
            device,
        ));
        fc.bias = Some(Param::from_tensor(Tensor::from_data(
            TensorData::new(bias, [num_classes]),
            device,
        )));
        Self { fc, num_classes }
    }
}

impl<B: Backend> CamArchitecture<B> for LinearNet<B> {
    fn name(&self) -> &'static str {
        "linear"
    }

    fn target_layers(&self) -> Vec<String> {
        vec!["input".to_string()]
    }

    fn num_classes(&self) -> usize {
        self.num_classes
    }

    fn run_backbone(&self, x: Tensor<B, 4>, tap: &mut dyn LayerTap<B>) -> Tensor<B, 4> {
        tap.tap("input", x)
    }

    fn run_head(&self, features: Tensor<B, 2>) -> Tensor<B, 2> {
        self.fc.forward(features)
    }
}
