//! Per-image Grad-CAM pipeline: load, preprocess, compute, render.

use std::path::{Path, PathBuf};

use burn::tensor::backend::AutodiffBackend;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use gradcam_core::{CamArchitecture, INPUT_SIZE};
use gradcam_explain::{ExplainError, GradCam};
use gradcam_vision::{load_image_bgr, preprocess_image, show_cam_on_image, VisionError};

/// Errors raised while explaining one image.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Reading, preparing or writing the image failed.
    #[error(transparent)]
    Vision(#[from] VisionError),

    /// The Grad-CAM computation failed.
    #[error(transparent)]
    Explain(#[from] ExplainError),
}

/// Outcome of explaining one image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CamRecord {
    /// Input image.
    pub input: PathBuf,
    /// Written heatmap overlay.
    pub output: PathBuf,
    /// Class whose score was explained.
    pub class_index: usize,
    /// Logit of that class.
    pub score: f32,
}

/// Explain the image at `path` and write `cam<index>.jpg` into `output_dir`.
///
/// # Arguments
///
/// * `engine` - Grad-CAM engine wrapping the network
/// * `path` - Input image file
/// * `output_dir` - Directory for the result, created if missing
/// * `index` - Result number, used in the file name
/// * `target_index` - Class to explain; the top class when `None`
pub fn explain_image<B, M>(
    engine: &mut GradCam<B, M>,
    path: &Path,
    output_dir: &Path,
    index: usize,
    target_index: Option<usize>,
    device: &B::Device,
) -> Result<CamRecord, PipelineError>
where
    B: AutodiffBackend,
    M: CamArchitecture<B>,
{
    let image = load_image_bgr(path, INPUT_SIZE as u32)?;
    let input = preprocess_image::<B>(&image, device)?;
    let output = engine.compute(input, target_index)?;

    println!("Creating heatmap");
    let written = show_cam_on_image(&image, &output.mask, output_dir, index)?;
    info!(
        input = %path.display(),
        output = %written.display(),
        class_index = output.class_index,
        score = output.score,
        "explained image"
    );

    Ok(CamRecord {
        input: path.to_path_buf(),
        output: written,
        class_index: output.class_index,
        score: output.score,
    })
}
