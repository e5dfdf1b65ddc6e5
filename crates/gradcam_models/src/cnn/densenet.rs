//! DenseNet-121 for ImageNet classification.
//!
//! Layers inside a dense block are reported as `"denseblockN.denselayerM"`
//! (1-based, as in torchvision checkpoints) so that names stay unique across
//! blocks.

use burn::nn::{
    conv::{Conv2d, Conv2dConfig},
    pool::{
        AdaptiveAvgPool2d, AdaptiveAvgPool2dConfig, AvgPool2d, AvgPool2dConfig, MaxPool2d,
        MaxPool2dConfig,
    },
    Linear, LinearConfig, PaddingConfig2d,
};
use burn::prelude::*;
use burn::tensor::activation::relu;
use serde::{Deserialize, Serialize};

use gradcam_core::{CamArchitecture, LayerTap};

use crate::checkpoint::Result;
use crate::torchvision::{key, load_conv2d, load_linear, StateDict, TorchvisionImport};

use super::norm::FrozenBatchNorm2d;

/// Last dense layer of the last dense block.
pub const DENSENET121_TARGET_LAYER: &str = "denseblock4.denselayer16";

/// Older torchvision checkpoints name dense layer parts `norm.1`, `conv.2`...
fn legacy_dense_layer_key(name: &str) -> Option<String> {
    if !name.contains(".denselayer") {
        return None;
    }
    let mut renamed = name.to_string();
    for part in ["norm", "relu", "conv"] {
        for index in ["1", "2"] {
            renamed = renamed.replace(&format!(".{part}.{index}."), &format!(".{part}{index}."));
        }
    }
    (renamed != name).then_some(renamed)
}

/// Configuration for DenseNet-121.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DenseNet121Config {
    /// Number of output classes.
    pub num_classes: usize,
    /// Channels added by every dense layer.
    pub growth_rate: usize,
    /// Dense layers in each of the four blocks.
    pub block_config: [usize; 4],
    /// Channels produced by the stem convolution.
    pub num_init_features: usize,
    /// Bottleneck width multiplier (times `growth_rate`).
    pub bn_size: usize,
}

impl Default for DenseNet121Config {
    fn default() -> Self {
        Self {
            num_classes: 1000,
            growth_rate: 32,
            block_config: [6, 12, 24, 16],
            num_init_features: 64,
            bn_size: 4,
        }
    }
}

impl DenseNet121Config {
    /// Create a new config.
    pub fn new(num_classes: usize) -> Self {
        Self {
            num_classes,
            ..Default::default()
        }
    }

    /// Initialize the model.
    pub fn init<B: Backend>(&self, device: &B::Device) -> DenseNet121<B> {
        DenseNet121::new(self.clone(), device)
    }

    /// Channels at the end of the feature extractor.
    pub fn num_features(&self) -> usize {
        let mut channels = self.num_init_features;
        for (index, &layers) in self.block_config.iter().enumerate() {
            channels += layers * self.growth_rate;
            if index + 1 < self.block_config.len() {
                channels /= 2;
            }
        }
        channels
    }
}

/// Dense layer: BN-ReLU-Conv1×1-BN-ReLU-Conv3×3 producing `growth_rate` channels.
#[derive(Module, Debug)]
pub struct DenseLayer<B: Backend> {
    norm1: FrozenBatchNorm2d<B>,
    conv1: Conv2d<B>,
    norm2: FrozenBatchNorm2d<B>,
    conv2: Conv2d<B>,
}

impl<B: Backend> DenseLayer<B> {
    /// Create a new dense layer.
    pub fn new(in_channels: usize, growth_rate: usize, bn_size: usize, device: &B::Device) -> Self {
        let bottleneck = bn_size * growth_rate;
        Self {
            norm1: FrozenBatchNorm2d::new(in_channels, device),
            conv1: Conv2dConfig::new([in_channels, bottleneck], [1, 1])
                .with_bias(false)
                .init(device),
            norm2: FrozenBatchNorm2d::new(bottleneck, device),
            conv2: Conv2dConfig::new([bottleneck, growth_rate], [3, 3])
                .with_padding(PaddingConfig2d::Explicit(1, 1))
                .with_bias(false)
                .init(device),
        }
    }

    /// Copy `norm1`, `conv1`, `norm2` and `conv2` from `prefix`.
    pub fn load_torchvision(
        mut self,
        state: &mut StateDict,
        prefix: &str,
        device: &B::Device,
    ) -> Result<Self> {
        self.norm1 = self.norm1.load_torchvision(state, &key(prefix, "norm1"), device)?;
        self.conv1 = load_conv2d(self.conv1, state, &key(prefix, "conv1"), device)?;
        self.norm2 = self.norm2.load_torchvision(state, &key(prefix, "norm2"), device)?;
        self.conv2 = load_conv2d(self.conv2, state, &key(prefix, "conv2"), device)?;
        Ok(self)
    }

    /// Forward pass returning only the new feature maps.
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let out = self.conv1.forward(relu(self.norm1.forward(x)));
        self.conv2.forward(relu(self.norm2.forward(out)))
    }
}

/// Dense block: every layer sees the concatenation of all previous outputs.
#[derive(Module, Debug)]
pub struct DenseBlock<B: Backend> {
    layers: Vec<DenseLayer<B>>,
}

impl<B: Backend> DenseBlock<B> {
    /// Create a new dense block.
    pub fn new(
        num_layers: usize,
        in_channels: usize,
        growth_rate: usize,
        bn_size: usize,
        device: &B::Device,
    ) -> Self {
        let layers = (0..num_layers)
            .map(|i| DenseLayer::new(in_channels + i * growth_rate, growth_rate, bn_size, device))
            .collect();
        Self { layers }
    }

    /// Copy every `{prefix}.denselayerM`.
    pub fn load_torchvision(
        mut self,
        state: &mut StateDict,
        prefix: &str,
        device: &B::Device,
    ) -> Result<Self> {
        self.layers = self
            .layers
            .into_iter()
            .enumerate()
            .map(|(index, layer)| {
                layer.load_torchvision(state, &format!("{prefix}.denselayer{}", index + 1), device)
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(self)
    }

    /// Forward pass, reporting each dense layer as `"{block_name}.denselayerM"`.
    pub fn forward(
        &self,
        x: Tensor<B, 4>,
        block_name: &str,
        tap: &mut dyn LayerTap<B>,
    ) -> Tensor<B, 4> {
        let mut features = vec![x];
        for (index, layer) in self.layers.iter().enumerate() {
            let input = Tensor::cat(features.clone(), 1);
            let name = format!("{block_name}.denselayer{}", index + 1);
            features.push(tap.tap(&name, layer.forward(input)));
        }
        Tensor::cat(features, 1)
    }
}

/// Transition between blocks: BN-ReLU-Conv1×1 halving channels, then 2×2 average pool.
#[derive(Module, Debug)]
pub struct Transition<B: Backend> {
    norm: FrozenBatchNorm2d<B>,
    conv: Conv2d<B>,
    pool: AvgPool2d,
}

impl<B: Backend> Transition<B> {
    /// Create a new transition.
    pub fn new(in_channels: usize, out_channels: usize, device: &B::Device) -> Self {
        Self {
            norm: FrozenBatchNorm2d::new(in_channels, device),
            conv: Conv2dConfig::new([in_channels, out_channels], [1, 1])
                .with_bias(false)
                .init(device),
            pool: AvgPool2dConfig::new([2, 2]).with_strides([2, 2]).init(),
        }
    }

    /// Copy `norm` and `conv` from `prefix`.
    pub fn load_torchvision(
        mut self,
        state: &mut StateDict,
        prefix: &str,
        device: &B::Device,
    ) -> Result<Self> {
        self.norm = self.norm.load_torchvision(state, &key(prefix, "norm"), device)?;
        self.conv = load_conv2d(self.conv, state, &key(prefix, "conv"), device)?;
        Ok(self)
    }

    /// Forward pass.
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        self.pool
            .forward(self.conv.forward(relu(self.norm.forward(x))))
    }
}

/// DenseNet-121 image classifier.
#[derive(Module, Debug)]
pub struct DenseNet121<B: Backend> {
    conv0: Conv2d<B>,
    norm0: FrozenBatchNorm2d<B>,
    pool0: MaxPool2d,
    blocks: Vec<DenseBlock<B>>,
    transitions: Vec<Transition<B>>,
    norm5: FrozenBatchNorm2d<B>,
    avgpool: AdaptiveAvgPool2d,
    classifier: Linear<B>,
    num_classes: usize,
}

impl<B: Backend> DenseNet121<B> {
    /// Create a new DenseNet-121 model.
    pub fn new(config: DenseNet121Config, device: &B::Device) -> Self {
        let conv0 = Conv2dConfig::new([3, config.num_init_features], [7, 7])
            .with_stride([2, 2])
            .with_padding(PaddingConfig2d::Explicit(3, 3))
            .with_bias(false)
            .init(device);
        let pool0 = MaxPool2dConfig::new([3, 3])
            .with_strides([2, 2])
            .with_padding(PaddingConfig2d::Explicit(1, 1))
            .init();

        let mut blocks = Vec::with_capacity(config.block_config.len());
        let mut transitions = Vec::with_capacity(config.block_config.len() - 1);
        let mut channels = config.num_init_features;
        for (index, &num_layers) in config.block_config.iter().enumerate() {
            blocks.push(DenseBlock::new(
                num_layers,
                channels,
                config.growth_rate,
                config.bn_size,
                device,
            ));
            channels += num_layers * config.growth_rate;
            if index + 1 < config.block_config.len() {
                transitions.push(Transition::new(channels, channels / 2, device));
                channels /= 2;
            }
        }

        Self {
            conv0,
            norm0: FrozenBatchNorm2d::new(config.num_init_features, device),
            pool0,
            blocks,
            transitions,
            norm5: FrozenBatchNorm2d::new(channels, device),
            avgpool: AdaptiveAvgPool2dConfig::new([1, 1]).init(),
            classifier: LinearConfig::new(channels, config.num_classes).init(device),
            num_classes: config.num_classes,
        }
    }
}

impl<B: Backend> CamArchitecture<B> for DenseNet121<B> {
    fn name(&self) -> &'static str {
        "densenet121"
    }

    fn target_layers(&self) -> Vec<String> {
        vec![DENSENET121_TARGET_LAYER.to_string()]
    }

    fn num_classes(&self) -> usize {
        self.num_classes
    }

    fn run_backbone(&self, x: Tensor<B, 4>, tap: &mut dyn LayerTap<B>) -> Tensor<B, 4> {
        let x = tap.tap("conv0", self.conv0.forward(x));
        let x = tap.tap("norm0", self.norm0.forward(x));
        let x = tap.tap("relu0", relu(x));
        let mut x = tap.tap("pool0", self.pool0.forward(x));

        for (index, block) in self.blocks.iter().enumerate() {
            let block_name = format!("denseblock{}", index + 1);
            let out = block.forward(x, &block_name, &mut *tap);
            x = tap.tap(&block_name, out);
            if let Some(transition) = self.transitions.get(index) {
                x = tap.tap(&format!("transition{}", index + 1), transition.forward(x));
            }
        }

        let x = tap.tap("norm5", self.norm5.forward(x));
        let x = tap.tap("relu5", relu(x));
        tap.tap("avgpool", self.avgpool.forward(x))
    }

    fn run_head(&self, features: Tensor<B, 2>) -> Tensor<B, 2> {
        self.classifier.forward(features)
    }
}

impl<B: Backend> TorchvisionImport<B> for DenseNet121<B> {
    fn load_torchvision(mut self, state: &mut StateDict, device: &B::Device) -> Result<Self> {
        state.rename_keys(legacy_dense_layer_key);

        self.conv0 = load_conv2d(self.conv0, state, "features.conv0", device)?;
        self.norm0 = self.norm0.load_torchvision(state, "features.norm0", device)?;
        self.blocks = self
            .blocks
            .into_iter()
            .enumerate()
            .map(|(index, block)| {
                block.load_torchvision(state, &format!("features.denseblock{}", index + 1), device)
            })
            .collect::<Result<Vec<_>>>()?;
        self.transitions = self
            .transitions
            .into_iter()
            .enumerate()
            .map(|(index, transition)| {
                transition.load_torchvision(state, &format!("features.transition{}", index + 1), device)
            })
            .collect::<Result<Vec<_>>>()?;
        self.norm5 = self.norm5.load_torchvision(state, "features.norm5", device)?;
        self.classifier = load_linear(self.classifier, state, "classifier", device)?;
        Ok(self)
    }
}
