//! # gradcam_models
//!
//! Image classifiers that can be explained with Grad-CAM.
//!
//! Every network implements [`gradcam_core::CamArchitecture`], reporting its
//! named sublayers in declaration order so intermediate activations can be
//! captured:
//!
//! - [`Vgg19`] - sublayers of `features` named `"0"`…`"36"`, target `"35"`
//! - [`ResNet50`] - stages `layer1`…`layer4`, target `"layer4"`
//! - [`DenseNet121`] - dense layers named `"denseblockN.denselayerM"`,
//!   target `"denseblock4.denselayer16"`
//!
//! [`Architecture`] parses the user-facing names, [`checkpoint`] loads Burn
//! records and [`torchvision`] imports torchvision checkpoints.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod checkpoint;
pub mod cnn;
pub mod registry;
pub mod torchvision;

pub use checkpoint::{load_pretrained, load_weights, save_weights, CheckpointError, WeightsFormat};
pub use cnn::*;
pub use registry::{Architecture, RegistryError};
pub use torchvision::{load_torchvision_weights, StateDict, TorchvisionImport};
