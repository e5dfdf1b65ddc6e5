//! Convolutional image classifiers.

mod densenet;
mod norm;
mod resnet;
mod vgg;

pub use densenet::{
    DenseBlock, DenseLayer, DenseNet121, DenseNet121Config, Transition, DENSENET121_TARGET_LAYER,
};
pub use norm::FrozenBatchNorm2d;
pub use resnet::{Bottleneck, Downsample, ResNet50, ResNet50Config, RESNET50_TARGET_LAYER};
pub use vgg::{Vgg19, Vgg19Config, VggClassifier, VGG19_TARGET_LAYER};
