//! ResNet-50 for ImageNet classification.

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

use super::norm::FrozenBatchNorm2d;

/// Channel expansion of a bottleneck block.
const EXPANSION: usize = 4;

/// Output of the last residual stage.
pub const RESNET50_TARGET_LAYER: &str = "layer4";

/// Configuration for ResNet-50.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResNet50Config {
    /// Number of output classes.
    pub num_classes: usize,
    /// Number of bottleneck blocks in each of the four stages.
    pub blocks_per_stage: [usize; 4],
}

impl Default for ResNet50Config {
    fn default() -> Self {
        Self {
            num_classes: 1000,
            blocks_per_stage: [3, 4, 6, 3],
        }
    }
}

impl ResNet50Config {
    /// Create a new config.
    pub fn new(num_classes: usize) -> Self {
        Self {
            num_classes,
            ..Default::default()
        }
    }

    /// Initialize the model.
    pub fn init<B: Backend>(&self, device: &B::Device) -> ResNet50<B> {
        ResNet50::new(self.clone(), device)
    }
}

/// Projection shortcut used when a block changes resolution or width.
#[derive(Module, Debug)]
pub struct Downsample<B: Backend> {
    conv: Conv2d<B>,
    bn: FrozenBatchNorm2d<B>,
}

/// Bottleneck residual block: 1×1 reduce, 3×3 (strided), 1×1 expand.
#[derive(Module, Debug)]
pub struct Bottleneck<B: Backend> {
    conv1: Conv2d<B>,
    bn1: FrozenBatchNorm2d<B>,
    conv2: Conv2d<B>,
    bn2: FrozenBatchNorm2d<B>,
    conv3: Conv2d<B>,
    bn3: FrozenBatchNorm2d<B>,
    downsample: Option<Downsample<B>>,
}

impl<B: Backend> Bottleneck<B> {
    /// Create a new bottleneck block.
    pub fn new(in_channels: usize, planes: usize, stride: usize, device: &B::Device) -> Self {
        let out_channels = planes * EXPANSION;

        let conv1 = Conv2dConfig::new([in_channels, planes], [1, 1])
            .with_bias(false)
            .init(device);
        let conv2 = Conv2dConfig::new([planes, planes], [3, 3])
            .with_stride([stride, stride])
            .with_padding(PaddingConfig2d::Explicit(1, 1))
            .with_bias(false)
            .init(device);
        let conv3 = Conv2dConfig::new([planes, out_channels], [1, 1])
            .with_bias(false)
            .init(device);

        // Shortcut connection if dimensions differ
        let downsample = if stride != 1 || in_channels != out_channels {
            Some(Downsample {
                conv: Conv2dConfig::new([in_channels, out_channels], [1, 1])
                    .with_stride([stride, stride])
                    .with_bias(false)
                    .init(device),
                bn: FrozenBatchNorm2d::new(out_channels, device),
            })
        } else {
            None
        };

        Self {
            conv1,
            bn1: FrozenBatchNorm2d::new(planes, device),
            conv2,
            bn2: FrozenBatchNorm2d::new(planes, device),
            conv3,
            bn3: FrozenBatchNorm2d::new(out_channels, device),
            downsample,
        }
    }

    /// Copy the block stored under `prefix` (e.g. `layer2.0`); torchvision
    /// keeps the shortcut as `downsample.0` (conv) and `downsample.1` (norm).
    pub fn load_torchvision(
        mut self,
        state: &mut StateDict,
        prefix: &str,
        device: &B::Device,
    ) -> Result<Self> {
        self.conv1 = load_conv2d(self.conv1, state, &key(prefix, "conv1"), device)?;
        self.bn1 = self.bn1.load_torchvision(state, &key(prefix, "bn1"), device)?;
        self.conv2 = load_conv2d(self.conv2, state, &key(prefix, "conv2"), device)?;
        self.bn2 = self.bn2.load_torchvision(state, &key(prefix, "bn2"), device)?;
        self.conv3 = load_conv2d(self.conv3, state, &key(prefix, "conv3"), device)?;
        self.bn3 = self.bn3.load_torchvision(state, &key(prefix, "bn3"), device)?;
        self.downsample = match self.downsample {
            Some(Downsample { conv, bn }) => Some(Downsample {
                conv: load_conv2d(conv, state, &key(prefix, "downsample.0"), device)?,
                bn: bn.load_torchvision(state, &key(prefix, "downsample.1"), device)?,
            }),
            None => None,
        };
        Ok(self)
    }

    /// Forward pass.
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let out = relu(self.bn1.forward(self.conv1.forward(x.clone())));
        let out = relu(self.bn2.forward(self.conv2.forward(out)));
        let out = self.bn3.forward(self.conv3.forward(out));

        let identity = match &self.downsample {
            Some(downsample) => downsample.bn.forward(downsample.conv.forward(x)),
            None => x,
        };

        relu(out + identity)
    }
}

/// Build one residual stage; only the first block may downsample.
fn make_stage<B: Backend>(
    in_channels: usize,
    planes: usize,
    blocks: usize,
    stride: usize,
    device: &B::Device,
) -> Vec<Bottleneck<B>> {
    let mut stage = Vec::with_capacity(blocks);
    let mut channels = in_channels;
    for block in 0..blocks {
        let block_stride = if block == 0 { stride } else { 1 };
        stage.push(Bottleneck::new(channels, planes, block_stride, device));
        channels = planes * EXPANSION;
    }
    stage
}

fn load_stage<B: Backend>(
    stage: Vec<Bottleneck<B>>,
    state: &mut StateDict,
    name: &str,
    device: &B::Device,
) -> Result<Vec<Bottleneck<B>>> {
    stage
        .into_iter()
        .enumerate()
        .map(|(index, block)| block.load_torchvision(state, &format!("{name}.{index}"), device))
        .collect()
}

fn run_stage<B: Backend>(stage: &[Bottleneck<B>], x: Tensor<B, 4>) -> Tensor<B, 4> {
    stage.iter().fold(x, |out, block| block.forward(out))
}

/// ResNet-50 image classifier.
#[derive(Module, Debug)]
pub struct ResNet50<B: Backend> {
    conv1: Conv2d<B>,
    bn1: FrozenBatchNorm2d<B>,
    maxpool: MaxPool2d,
    layer1: Vec<Bottleneck<B>>,
    layer2: Vec<Bottleneck<B>>,
    layer3: Vec<Bottleneck<B>>,
    layer4: Vec<Bottleneck<B>>,
    avgpool: AdaptiveAvgPool2d,
    fc: Linear<B>,
    num_classes: usize,
}

impl<B: Backend> ResNet50<B> {
    /// Create a new ResNet-50 model.
    pub fn new(config: ResNet50Config, device: &B::Device) -> Self {
        let conv1 = Conv2dConfig::new([3, 64], [7, 7])
            .with_stride([2, 2])
            .with_padding(PaddingConfig2d::Explicit(3, 3))
            .with_bias(false)
            .init(device);
        let maxpool = MaxPool2dConfig::new([3, 3])
            .with_strides([2, 2])
            .with_padding(PaddingConfig2d::Explicit(1, 1))
            .init();

        let [b1, b2, b3, b4] = config.blocks_per_stage;
        let layer1 = make_stage(64, 64, b1, 1, device);
        let layer2 = make_stage(64 * EXPANSION, 128, b2, 2, device);
        let layer3 = make_stage(128 * EXPANSION, 256, b3, 2, device);
        let layer4 = make_stage(256 * EXPANSION, 512, b4, 2, device);

        let avgpool = AdaptiveAvgPool2dConfig::new([1, 1]).init();
        let fc = LinearConfig::new(512 * EXPANSION, config.num_classes).init(device);

        Self {
            conv1,
            bn1: FrozenBatchNorm2d::new(64, device),
            maxpool,
            layer1,
            layer2,
            layer3,
            layer4,
            avgpool,
            fc,
            num_classes: config.num_classes,
        }
    }
}

impl<B: Backend> CamArchitecture<B> for ResNet50<B> {
    fn name(&self) -> &'static str {
        "resnet50"
    }

    fn target_layers(&self) -> Vec<String> {
        vec![RESNET50_TARGET_LAYER.to_string()]
    }

    fn num_classes(&self) -> usize {
        self.num_classes
    }

    fn run_backbone(&self, x: Tensor<B, 4>, tap: &mut dyn LayerTap<B>) -> Tensor<B, 4> {
        let x = tap.tap("conv1", self.conv1.forward(x));
        let x = tap.tap("bn1", self.bn1.forward(x));
        let x = tap.tap("relu", relu(x));
        let x = tap.tap("maxpool", self.maxpool.forward(x));

        let x = tap.tap("layer1", run_stage(&self.layer1, x));
        let x = tap.tap("layer2", run_stage(&self.layer2, x));
        let x = tap.tap("layer3", run_stage(&self.layer3, x));
        let x = tap.tap("layer4", run_stage(&self.layer4, x));

        tap.tap("avgpool", self.avgpool.forward(x))
    }

    fn run_head(&self, features: Tensor<B, 2>) -> Tensor<B, 2> {
        self.fc.forward(features)
    }
}

impl<B: Backend> TorchvisionImport<B> for ResNet50<B> {
    fn load_torchvision(mut self, state: &mut StateDict, device: &B::Device) -> Result<Self> {
        self.conv1 = load_conv2d(self.conv1, state, "conv1", device)?;
        self.bn1 = self.bn1.load_torchvision(state, "bn1", device)?;
        self.layer1 = load_stage(self.layer1, state, "layer1", device)?;
        self.layer2 = load_stage(self.layer2, state, "layer2", device)?;
        self.layer3 = load_stage(self.layer3, state, "layer3", device)?;
        self.layer4 = load_stage(self.layer4, state, "layer4", device)?;
        self.fc = load_linear(self.fc, state, "fc", device)?;
        Ok(self)
    }
}
