//! # gradcam_core
//!
//! Core types and traits for gradcam-rs.
//!
//! This crate provides:
//! - [`ImageShape`] for channel-first image tensor shape metadata
//! - [`CamArchitecture`], the adapter every explainable network implements
//! - [`LayerTap`], the observer backbones report named sublayer outputs to
//! - Error types and backend aliases
//!
//! ## Shape Convention
//!
//! Image tensors follow the convention `(N, C, H, W)`:
//! - `N`: Batch size (1 for a Grad-CAM run)
//! - `C`: Channels
//! - `H`, `W`: Spatial resolution (224×224 at the network input)

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
mod model_trait;
mod shape;

pub use error::{CoreError, Result};
pub use model_trait::{flatten, CamArchitecture, LayerNames, LayerTap, PassThrough};
pub use shape::{ImageShape, INPUT_CHANNELS, INPUT_SIZE};

/// Backend type aliases for convenience
pub mod backend {
    pub use burn_autodiff::Autodiff;

    #[cfg(feature = "backend-ndarray")]
    pub use burn_ndarray::{NdArray, NdArrayDevice};

    #[cfg(feature = "backend-wgpu")]
    pub use burn_wgpu::{Wgpu, WgpuDevice};

    /// CPU backend with autodiff, the default for Grad-CAM runs.
    #[cfg(feature = "backend-ndarray")]
    pub type CpuAutodiff = Autodiff<NdArray>;

    /// GPU backend with autodiff.
    #[cfg(feature = "backend-wgpu")]
    pub type GpuAutodiff = Autodiff<Wgpu>;
}
