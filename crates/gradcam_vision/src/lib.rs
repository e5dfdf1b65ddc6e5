//! # gradcam_vision
//!
//! Image handling around the Grad-CAM engine.
//!
//! This crate provides:
//! - Input enumeration and decoding ([`io`])
//! - OpenCV-style bilinear resizing of images and maps ([`resize`])
//! - Network input preparation with ImageNet normalization ([`preprocess`])
//! - The jet colormap and heatmap overlay rendering ([`colormap`], [`render`])
//!
//! Images are carried as `ndarray::Array3<f32>` of shape (height, width, 3)
//! in BGR channel order with values in [0, 1].
//!
//! ## Example
//!
//! ```rust,ignore
//! use gradcam_vision::{load_image_bgr, preprocess_image, show_cam_on_image};
//!
//! let image = load_image_bgr("images/cat.jpg", 224)?;
//! let input = preprocess_image::<Backend>(&image, &device)?;
//! let output = engine.compute(input, None)?;
//! show_cam_on_image(&image, &output.mask, "results", 1)?;
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod colormap;
mod error;
pub mod io;
pub mod preprocess;
pub mod render;
pub mod resize;

pub use colormap::{apply_colormap, jet};
pub use error::{Result, VisionError};
pub use io::{list_images, load_image_bgr, write_bgr_image};
pub use preprocess::{preprocess_image, IMAGENET_MEAN, IMAGENET_STD};
pub use render::{cam_file_name, overlay, show_cam_on_image};
pub use resize::{resize_bilinear, resize_rgb_to_bgr};
