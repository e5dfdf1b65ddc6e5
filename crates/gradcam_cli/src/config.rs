//! Resolved run configuration.

use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

use gradcam_models::Architecture;

use crate::Cli;

/// Where the tensors live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceChoice {
    /// ndarray CPU backend.
    Cpu,
    /// wgpu GPU backend.
    Gpu,
}

/// Validated settings of one run, written to `config.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    pub architecture: Architecture,
    pub device: DeviceChoice,
    pub image_dir: PathBuf,
    pub output_dir: PathBuf,
    pub weights: Option<PathBuf>,
    pub target_index: Option<usize>,
    pub target_layers: Vec<String>,
    pub num_classes: usize,
}

impl RunConfig {
    /// Validate parsed flags.
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        let architecture: Architecture = cli
            .model
            .parse()
            .context("Unsupported --model value")?;

        let device = if cli.use_cuda && cfg!(feature = "backend-wgpu") {
            DeviceChoice::Gpu
        } else {
            if cli.use_cuda {
                warn!("--use-cuda requested but this build has no GPU backend; using the CPU");
            }
            DeviceChoice::Cpu
        };

        let target_layers = if cli.target_layers.is_empty() {
            vec![architecture.default_target_layer().to_string()]
        } else {
            cli.target_layers.clone()
        };

        if let Some(index) = cli.target_index {
            anyhow::ensure!(
                index < cli.num_classes,
                "--target-index {index} is out of range for {} classes",
                cli.num_classes
            );
        }

        Ok(Self {
            architecture,
            device,
            image_dir: cli.image_path.clone(),
            output_dir: cli.output_dir.clone(),
            weights: cli.weights.clone(),
            target_index: cli.target_index,
            target_layers,
            num_classes: cli.num_classes,
        })
    }
}
