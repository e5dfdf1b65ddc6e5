//! # gradcam_explain
//!
//! Grad-CAM for networks implementing [`gradcam_core::CamArchitecture`].
//!
//! This crate provides:
//! - [`FeatureExtractor`], the layer tap that captures target activations
//!   and their gradients
//! - [`ModelOutputs`], the adapter from backbone features to logits
//! - [`GradCam`], the engine producing a normalized saliency map
//! - The map arithmetic itself in [`attribution`]

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

mod activation;
pub mod attribution;
mod engine;
mod error;
mod extractor;
mod outputs;

#[cfg(test)]
mod testing;

pub use activation::{ActivationCapture, GradientCapture};
pub use attribution::{channel_weights, grad_cam, normalize_shifted_max};
pub use engine::{argmax, CamOutput, CamState, GradCam};
pub use error::{ExplainError, Result};
pub use extractor::FeatureExtractor;
pub use outputs::ModelOutputs;
