//! VGG-19 for ImageNet classification.
//!
//! Sublayers of `features` are reported with the positional names used by
//! torchvision checkpoints: every convolution and every ReLU take one index,
//! every max-pool takes one index, so the last ReLU is `"35"` and the last
//! pool is `"36"`.

use burn::nn::{
    conv::{Conv2d, Conv2dConfig},
    pool::{AdaptiveAvgPool2d, AdaptiveAvgPool2dConfig, MaxPool2d, MaxPool2dConfig},
    Linear, LinearConfig, PaddingConfig2d,
};
use burn::prelude::*;
use burn::tensor::activation::relu;
use serde::{Deserialize, Serialize};

use gradcam_core::{CamArchitecture, LayerTap};

use crate::checkpoint::Result;
use crate::torchvision::{key, load_conv2d, load_linear, StateDict, TorchvisionImport};

/// Convolution widths of VGG-19; `None` marks a 2×2 max-pool.
const VGG19_LAYOUT: [Option<usize>; 21] = [
    Some(64),
    Some(64),
    None,
    Some(128),
    Some(128),
    None,
    Some(256),
    Some(256),
    Some(256),
    Some(256),
    None,
    Some(512),
    Some(512),
    Some(512),
    Some(512),
    None,
    Some(512),
    Some(512),
    Some(512),
    Some(512),
    None,
];

/// Spatial size of the adaptive pool ahead of the classifier.
const POOLED_SIZE: usize = 7;

/// Last ReLU of `features`, the deepest layer that keeps spatial structure.
pub const VGG19_TARGET_LAYER: &str = "35";

/// Positions of the convolutions inside torchvision's `features` sequence.
fn torchvision_conv_indices() -> Vec<usize> {
    let mut indices = Vec::new();
    let mut index = 0;
    for entry in VGG19_LAYOUT {
        if entry.is_some() {
            indices.push(index);
            index += 2;
        } else {
            index += 1;
        }
    }
    indices
}

/// Configuration for VGG-19.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vgg19Config {
    /// Number of output classes.
    pub num_classes: usize,
    /// Width of the two hidden classifier layers.
    pub classifier_width: usize,
}

impl Default for Vgg19Config {
    fn default() -> Self {
        Self {
            num_classes: 1000,
            classifier_width: 4096,
        }
    }
}

impl Vgg19Config {
    /// Create a new config.
    pub fn new(num_classes: usize) -> Self {
        Self {
            num_classes,
            ..Default::default()
        }
    }

    /// Initialize the model.
    pub fn init<B: Backend>(&self, device: &B::Device) -> Vgg19<B> {
        Vgg19::new(self.clone(), device)
    }
}

/// Classification head of VGG-19.
///
/// Dropout layers of the torchvision head are identities at inference and
/// are not represented.
#[derive(Module, Debug)]
pub struct VggClassifier<B: Backend> {
    fc1: Linear<B>,
    fc2: Linear<B>,
    fc3: Linear<B>,
}

impl<B: Backend> VggClassifier<B> {
    /// Create a new classifier head.
    pub fn new(in_features: usize, width: usize, num_classes: usize, device: &B::Device) -> Self {
        Self {
            fc1: LinearConfig::new(in_features, width).init(device),
            fc2: LinearConfig::new(width, width).init(device),
            fc3: LinearConfig::new(width, num_classes).init(device),
        }
    }

    /// Copy `{prefix}.0`, `{prefix}.3` and `{prefix}.6` (the linear layers
    /// between torchvision's ReLU and dropout entries).
    pub fn load_torchvision(
        mut self,
        state: &mut StateDict,
        prefix: &str,
        device: &B::Device,
    ) -> Result<Self> {
        self.fc1 = load_linear(self.fc1, state, &key(prefix, "0"), device)?;
        self.fc2 = load_linear(self.fc2, state, &key(prefix, "3"), device)?;
        self.fc3 = load_linear(self.fc3, state, &key(prefix, "6"), device)?;
        Ok(self)
    }

    /// Forward pass.
    pub fn forward(&self, x: Tensor<B, 2>) -> Tensor<B, 2> {
        let x = relu(self.fc1.forward(x));
        let x = relu(self.fc2.forward(x));
        self.fc3.forward(x)
    }
}

/// VGG-19 image classifier.
#[derive(Module, Debug)]
pub struct Vgg19<B: Backend> {
    features: Vec<Conv2d<B>>,
    pool: MaxPool2d,
    avgpool: AdaptiveAvgPool2d,
    classifier: VggClassifier<B>,
    num_classes: usize,
}

impl<B: Backend> Vgg19<B> {
    /// Create a new VGG-19 model.
    pub fn new(config: Vgg19Config, device: &B::Device) -> Self {
        let mut features = Vec::new();
        let mut in_channels = 3;
        for out_channels in VGG19_LAYOUT.iter().flatten() {
            let conv = Conv2dConfig::new([in_channels, *out_channels], [3, 3])
                .with_padding(PaddingConfig2d::Explicit(1, 1))
                .init(device);
            features.push(conv);
            in_channels = *out_channels;
        }

        let pool = MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init();
        let avgpool = AdaptiveAvgPool2dConfig::new([POOLED_SIZE, POOLED_SIZE]).init();
        let classifier = VggClassifier::new(
            in_channels * POOLED_SIZE * POOLED_SIZE,
            config.classifier_width,
            config.num_classes,
            device,
        );

        Self {
            features,
            pool,
            avgpool,
            classifier,
            num_classes: config.num_classes,
        }
    }
}

impl<B: Backend> CamArchitecture<B> for Vgg19<B> {
    fn name(&self) -> &'static str {
        "vgg19"
    }

    fn target_layers(&self) -> Vec<String> {
        vec![VGG19_TARGET_LAYER.to_string()]
    }

    fn num_classes(&self) -> usize {
        self.num_classes
    }

    fn run_backbone(&self, x: Tensor<B, 4>, tap: &mut dyn LayerTap<B>) -> Tensor<B, 4> {
        let mut x = x;
        let mut index = 0;
        let mut conv_index = 0;

        for entry in VGG19_LAYOUT {
            if entry.is_some() {
                let conv = &self.features[conv_index];
                conv_index += 1;
                x = tap.tap(&index.to_string(), conv.forward(x));
                x = tap.tap(&(index + 1).to_string(), relu(x));
                index += 2;
            } else {
                x = tap.tap(&index.to_string(), self.pool.forward(x));
                index += 1;
            }
        }

        tap.tap("avgpool", self.avgpool.forward(x))
    }

    fn run_head(&self, features: Tensor<B, 2>) -> Tensor<B, 2> {
        self.classifier.forward(features)
    }
}

impl<B: Backend> TorchvisionImport<B> for Vgg19<B> {
    fn load_torchvision(mut self, state: &mut StateDict, device: &B::Device) -> Result<Self> {
        let indices = torchvision_conv_indices();
        self.features = self
            .features
            .into_iter()
            .zip(indices)
            .map(|(conv, index)| load_conv2d(conv, state, &format!("features.{index}"), device))
            .collect::<Result<Vec<_>>>()?;
        self.classifier = self.classifier.load_torchvision(state, "classifier", device)?;
        Ok(self)
    }
}
