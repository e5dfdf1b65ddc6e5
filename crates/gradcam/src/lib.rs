//! # gradcam
//!
//! Grad-CAM saliency maps for image classifiers, built on Burn.
//!
//! gradcam-rs explains a prediction of VGG-19, ResNet-50 or DenseNet-121 by
//! weighting the activations of a late convolutional layer with the
//! gradient of the class score, and overlays the result on the image:
//!
//! - **Core**: the architecture adapter trait and layer taps
//! - **Models**: the three networks, name registry and weight loading
//! - **Explain**: activation/gradient capture and the Grad-CAM engine
//! - **Vision**: image I/O, preprocessing, colormap and overlay
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use gradcam::prelude::*;
//!
//! let device = Default::default();
//! let model = ResNet50Config::default().init::<CpuAutodiff>(&device);
//! let model = load_pretrained(model, "resnet50-0676ba61.pth", &device)?;
//! let mut engine = GradCam::new(model);
//!
//! let image = load_image_bgr("images/cat.jpg", 224)?;
//! let input = preprocess_image::<CpuAutodiff>(&image, &device)?;
//! let output = engine.compute(input, None)?;
//! show_cam_on_image(&image, &output.mask, "results", 1)?;
//! ```
//!
//! ## Feature Flags
//!
//! - `backend-ndarray` (default): CPU backend using ndarray
//! - `backend-wgpu`: GPU backend using WGPU (Metal on macOS, Vulkan on Linux/Windows)

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod pipeline;

// Re-export all crates
pub use gradcam_core as core;
pub use gradcam_explain as explain;
pub use gradcam_models as models;
pub use gradcam_vision as vision;

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use gradcam::prelude::*;
/// ```
pub mod prelude {
    // Core types
    pub use gradcam_core::backend::*;
    pub use gradcam_core::{CamArchitecture, ImageShape, LayerTap, INPUT_SIZE};

    // Models
    pub use gradcam_models::{
        load_pretrained, load_weights, Architecture, DenseNet121, DenseNet121Config, ResNet50,
        ResNet50Config, Vgg19, Vgg19Config,
    };

    // Explain
    pub use gradcam_explain::{CamOutput, CamState, FeatureExtractor, GradCam};

    // Vision
    pub use gradcam_vision::{
        list_images, load_image_bgr, overlay, preprocess_image, show_cam_on_image,
    };

    // Pipeline
    pub use crate::pipeline::{explain_image, CamRecord};
}
