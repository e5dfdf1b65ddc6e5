//! Import of torchvision checkpoints.
//!
//! A torchvision checkpoint is a flat state dict: parameter names such as
//! `features.0.weight` or `layer1.0.downsample.1.running_var` mapped to
//! tensors. It is read either from a PyTorch pickle (`.pth`, `.pt`) or from
//! `.safetensors`, and every network copies the entries it owns into its
//! own layers under the torchvision names.
//!
//! # Example
//!
//! ```rust,ignore
//! use gradcam_models::{torchvision::load_torchvision_weights, ResNet50Config};
//!
//! let model = ResNet50Config::default().init::<Backend>(&device);
//! let model = load_torchvision_weights(model, "resnet50-0676ba61.pth", &device)?;
//! ```

use std::collections::HashMap;
use std::path::Path;

use burn::module::Param;
use burn::nn::{conv::Conv2d, Linear};
use burn::prelude::*;
use tracing::{debug, warn};

use crate::checkpoint::{CheckpointError, Result};
use crate::cnn::FrozenBatchNorm2d;

/// Prefix added by `torch.nn.DataParallel` to every key.
const DATA_PARALLEL_PREFIX: &str = "module.";

/// Batch-norm bookkeeping that has no counterpart at inference.
const NUM_BATCHES_TRACKED: &str = "num_batches_tracked";

/// Networks that can copy their parameters out of a torchvision state dict.
pub trait TorchvisionImport<B: Backend>: Sized {
    /// Replace every parameter with the state dict entry of the same
    /// torchvision name, removing the consumed entries from `state`.
    ///
    /// # Errors
    ///
    /// [`CheckpointError::MissingKey`] or [`CheckpointError::KeyShape`] when
    /// the checkpoint does not fit the network.
    fn load_torchvision(self, state: &mut StateDict, device: &B::Device) -> Result<Self>;
}

/// Host copy of a checkpoint's tensors, keyed by parameter name.
#[derive(Debug, Clone, Default)]
pub struct StateDict {
    tensors: HashMap<String, TensorData>,
}

impl StateDict {
    /// Create an empty state dict.
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a `.pth`/`.pt` pickle or a `.safetensors` file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(CheckpointError::NotFound(path.to_path_buf()));
        }

        let import_err = |e: candle_core::Error| {
            CheckpointError::Import(format!("{}: {e}", path.display()))
        };
        let tensors = if path.extension().is_some_and(|ext| ext == "safetensors") {
            candle_core::safetensors::load(path, &candle_core::Device::Cpu)
                .map_err(import_err)?
                .into_iter()
                .collect::<Vec<_>>()
        } else {
            candle_core::pickle::read_all(path).map_err(import_err)?
        };

        let mut state = Self::new();
        for (name, tensor) in tensors {
            let shape = tensor.dims().to_vec();
            let values = tensor
                .to_dtype(candle_core::DType::F32)
                .and_then(|t| t.flatten_all())
                .and_then(|t| t.to_vec1::<f32>())
                .map_err(import_err)?;
            let name = if name.starts_with(DATA_PARALLEL_PREFIX) {
                name[DATA_PARALLEL_PREFIX.len()..].to_string()
            } else {
                name
            };
            state.insert(name, TensorData::new(values, shape));
        }

        debug!(path = %path.display(), tensors = state.len(), "read checkpoint");
        Ok(state)
    }

    /// Add or replace an entry.
    pub fn insert(&mut self, name: impl Into<String>, data: TensorData) {
        self.tensors.insert(name.into(), data);
    }

    /// Whether `name` is present.
    pub fn contains(&self, name: &str) -> bool {
        self.tensors.contains_key(name)
    }

    /// Number of entries not consumed yet.
    pub fn len(&self) -> usize {
        self.tensors.len()
    }

    /// Whether every entry was consumed.
    pub fn is_empty(&self) -> bool {
        self.tensors.is_empty()
    }

    /// Remaining entry names, sorted.
    pub fn keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.tensors.keys().map(String::as_str).collect();
        keys.sort_unstable();
        keys
    }

    /// Rename every entry for which `rename` returns a new name.
    pub fn rename_keys(&mut self, rename: impl Fn(&str) -> Option<String>) {
        let renamed: Vec<(String, String)> = self
            .tensors
            .keys()
            .filter_map(|name| rename(name).map(|new| (name.clone(), new)))
            .collect();
        for (old, new) in renamed {
            if let Some(data) = self.tensors.remove(&old) {
                self.tensors.insert(new, data);
            }
        }
    }

    /// Remove `name` and turn it into a tensor of exactly `shape`.
    pub fn take<B: Backend, const D: usize>(
        &mut self,
        name: &str,
        shape: [usize; D],
        device: &B::Device,
    ) -> Result<Tensor<B, D>> {
        let data = self
            .tensors
            .remove(name)
            .ok_or_else(|| CheckpointError::MissingKey(name.to_string()))?;
        if data.shape != shape {
            return Err(CheckpointError::KeyShape {
                key: name.to_string(),
                expected: shape.to_vec(),
                got: data.shape,
            });
        }
        Ok(Tensor::from_data(data, device))
    }

    /// Drop `name` if present.
    pub fn discard(&mut self, name: &str) {
        self.tensors.remove(name);
    }
}

/// `prefix.name`, or `name` alone at the top level.
pub(crate) fn key(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}.{name}")
    }
}

/// Copy `prefix.weight` (and `prefix.bias` when the layer has one).
pub(crate) fn load_conv2d<B: Backend>(
    mut conv: Conv2d<B>,
    state: &mut StateDict,
    prefix: &str,
    device: &B::Device,
) -> Result<Conv2d<B>> {
    let weight = state.take(&key(prefix, "weight"), conv.weight.dims(), device)?;
    conv.weight = Param::from_tensor(weight);
    if let Some(bias) = &conv.bias {
        let bias = state.take(&key(prefix, "bias"), bias.dims(), device)?;
        conv.bias = Some(Param::from_tensor(bias));
    }
    Ok(conv)
}

/// Copy a torch `(out, in)` weight into Burn's `(in, out)` layout.
pub(crate) fn load_linear<B: Backend>(
    mut linear: Linear<B>,
    state: &mut StateDict,
    prefix: &str,
    device: &B::Device,
) -> Result<Linear<B>> {
    let [d_input, d_output] = linear.weight.dims();
    let weight: Tensor<B, 2> = state.take(&key(prefix, "weight"), [d_output, d_input], device)?;
    linear.weight = Param::from_tensor(weight.transpose());
    if let Some(bias) = &linear.bias {
        let bias = state.take(&key(prefix, "bias"), bias.dims(), device)?;
        linear.bias = Some(Param::from_tensor(bias));
    }
    Ok(linear)
}

impl<B: Backend> FrozenBatchNorm2d<B> {
    /// Copy affine parameters and running statistics from `prefix`.
    pub(crate) fn load_torchvision(
        mut self,
        state: &mut StateDict,
        prefix: &str,
        device: &B::Device,
    ) -> Result<Self> {
        let shape = self.weight.dims();
        self.weight = Param::from_tensor(state.take(&key(prefix, "weight"), shape, device)?);
        self.bias = Param::from_tensor(state.take(&key(prefix, "bias"), shape, device)?);
        self.running_mean =
            Param::from_tensor(state.take(&key(prefix, "running_mean"), shape, device)?);
        self.running_var =
            Param::from_tensor(state.take(&key(prefix, "running_var"), shape, device)?);
        state.discard(&key(prefix, NUM_BATCHES_TRACKED));
        Ok(self)
    }
}

/// Load a torchvision checkpoint file into `model`.
///
/// Entries the network does not use are reported with a warning.
pub fn load_torchvision_weights<B, M>(
    model: M,
    path: impl AsRef<Path>,
    device: &B::Device,
) -> Result<M>
where
    B: Backend,
    M: TorchvisionImport<B>,
{
    let path = path.as_ref();
    let mut state = StateDict::from_file(path)?;
    let model = model.load_torchvision(&mut state, device)?;
    if !state.is_empty() {
        warn!(path = %path.display(), unused = ?state.keys(), "checkpoint entries not used");
    }
    debug!(path = %path.display(), "loaded torchvision weights");
    Ok(model)
}
