//! Pretrained weight loading.
//!
//! Two formats are accepted. Burn records are stored as named MessagePack
//! (`*.mpk`) at full precision; the recorder always works with the `.mpk`
//! extension, so a path given without one is resolved to `<path>.mpk`.
//! torchvision checkpoints (`*.pth`, `*.pt`, `*.safetensors`) are imported
//! through [`crate::torchvision`].
//!
//! # Example
//!
//! ```rust,ignore
//! use gradcam_models::{checkpoint::load_weights, ResNet50Config};
//!
//! let model = ResNet50Config::default().init::<Backend>(&device);
//! let model = load_weights(model, "resnet50.mpk", &device)?;
//! ```

use std::path::{Path, PathBuf};

use burn::module::Module;
use burn::prelude::*;
use burn::record::{FullPrecisionSettings, NamedMpkFileRecorder};
use tracing::debug;

use crate::torchvision::{load_torchvision_weights, TorchvisionImport};

/// File extension written and read by the recorder.
pub const WEIGHTS_EXTENSION: &str = "mpk";

/// Result type for checkpoint operations.
pub type Result<T> = std::result::Result<T, CheckpointError>;

/// Checkpoint-related errors.
#[derive(Debug, thiserror::Error)]
pub enum CheckpointError {
    /// Error saving weights.
    #[error("Failed to save weights: {0}")]
    Save(String),

    /// Error loading weights (unreadable file or mismatched architecture).
    #[error("Failed to load weights: {0}")]
    Load(String),

    /// No weight file at the given location.
    #[error("Weight file not found: {}", .0.display())]
    NotFound(PathBuf),

    /// A torchvision checkpoint could not be read.
    #[error("Failed to import checkpoint {0}")]
    Import(String),

    /// The checkpoint lacks a parameter the network needs.
    #[error("Checkpoint has no entry '{0}'")]
    MissingKey(String),

    /// A checkpoint entry has the wrong shape for the network.
    #[error("Checkpoint entry '{key}' has shape {got:?}, expected {expected:?}")]
    KeyShape {
        /// Entry name.
        key: String,
        /// Shape the network expects.
        expected: Vec<usize>,
        /// Shape found in the checkpoint.
        got: Vec<usize>,
    },
}

/// On-disk weight formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeightsFormat {
    /// Burn named MessagePack record.
    Burn,
    /// torchvision state dict (PyTorch pickle or safetensors).
    Torchvision,
}

impl WeightsFormat {
    /// Format implied by the file extension; anything unknown is a Burn record.
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        match path.as_ref().extension().and_then(|ext| ext.to_str()) {
            Some("pth" | "pt" | "safetensors") => WeightsFormat::Torchvision,
            _ => WeightsFormat::Burn,
        }
    }
}

fn recorder() -> NamedMpkFileRecorder<FullPrecisionSettings> {
    NamedMpkFileRecorder::<FullPrecisionSettings>::new()
}

/// Resolve a user-supplied weight path to the file the recorder will read.
pub fn resolve_weights_path(path: impl AsRef<Path>) -> Result<PathBuf> {
    let path = path.as_ref();
    if path.extension().is_some_and(|ext| ext == WEIGHTS_EXTENSION) {
        if path.is_file() {
            return Ok(path.to_path_buf());
        }
        return Err(CheckpointError::NotFound(path.to_path_buf()));
    }

    let with_extension = path.with_extension(WEIGHTS_EXTENSION);
    if with_extension.is_file() {
        Ok(with_extension)
    } else {
        Err(CheckpointError::NotFound(path.to_path_buf()))
    }
}

/// Save a model's weights.
///
/// # Arguments
///
/// * `model` - The model to save
/// * `path` - Output path; the `.mpk` extension is applied
pub fn save_weights<B, M>(model: M, path: impl AsRef<Path>) -> Result<PathBuf>
where
    B: Backend,
    M: Module<B>,
{
    let path = path.as_ref().with_extension(WEIGHTS_EXTENSION);
    model
        .save_file(path.clone(), &recorder())
        .map_err(|e| CheckpointError::Save(e.to_string()))?;
    debug!(path = %path.display(), "saved weights");
    Ok(path)
}

/// Load weights into an initialized model.
///
/// # Arguments
///
/// * `model` - A model initialized with the same configuration as the saved one
/// * `path` - Path to the weight file
/// * `device` - Device to load the weights onto
///
/// # Returns
///
/// The model carrying the loaded weights.
pub fn load_weights<B, M>(model: M, path: impl AsRef<Path>, device: &B::Device) -> Result<M>
where
    B: Backend,
    M: Module<B>,
{
    let path = resolve_weights_path(path)?;
    let model = model
        .load_file(path.clone(), &recorder(), device)
        .map_err(|e| CheckpointError::Load(e.to_string()))?;
    debug!(path = %path.display(), "loaded weights");
    Ok(model)
}

/// Load weights in whichever format `path` names.
pub fn load_pretrained<B, M>(model: M, path: impl AsRef<Path>, device: &B::Device) -> Result<M>
where
    B: Backend,
    M: Module<B> + TorchvisionImport<B>,
{
    let path = path.as_ref();
    match WeightsFormat::from_path(path) {
        WeightsFormat::Burn => load_weights(model, path, device),
        WeightsFormat::Torchvision => load_torchvision_weights(model, path, device),
    }
}
