//! gradcam-rs CLI: Grad-CAM heatmaps for a directory of images.

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod run;

use config::RunConfig;

#[derive(Parser, Debug)]
#[command(name = "gradcam")]
#[command(author, version)]
#[command(about = "Grad-CAM saliency heatmaps for VGG-19, ResNet-50 and DenseNet-121")]
#[command(long_about = "gradcam-rs: overlay Grad-CAM heatmaps on every image of a directory.

EXAMPLES:
  # Explain the top class of every image in ./images with DenseNet-121
  gradcam --weights densenet121-a639ec97.pth

  # ResNet-50, class 243, results in ./out
  gradcam --model resnet50 --weights resnet50-0676ba61.pth --target-index 243 --output-dir out

  # VGG-19 on the GPU (requires the backend-wgpu feature)
  gradcam --model vgg19 --weights vgg19.mpk --use-cuda

AVAILABLE MODELS:
  vgg19        - target layer \"35\" (last ReLU of features)
  resnet50     - target layer \"layer4\"
  densenet121  - target layer \"denseblock4.denselayer16\" [default]")]
pub struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Use the GPU backend
    #[arg(long, default_value = "false")]
    use_cuda: bool,

    /// Directory of input images
    #[arg(long, default_value = "./images", value_name = "DIR")]
    image_path: PathBuf,

    /// Network: vgg19, resnet50, densenet121
    #[arg(long, default_value = "densenet121", value_name = "MODEL")]
    model: String,

    /// Directory the cam<N>.jpg files are written to
    #[arg(long, default_value = "./results", value_name = "DIR")]
    output_dir: PathBuf,

    /// Pretrained weights: torchvision .pth/.safetensors, or a Burn .mpk record
    #[arg(long, value_name = "FILE")]
    weights: Option<PathBuf>,

    /// Class to explain (the top-scoring class when omitted)
    #[arg(long, value_name = "N")]
    target_index: Option<usize>,

    /// Layer to explain instead of the model default (repeatable)
    #[arg(long = "target-layer", value_name = "NAME")]
    target_layers: Vec<String>,

    /// Size of the classification head
    #[arg(long, default_value = "1000", value_name = "N")]
    num_classes: usize,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let log_level = match cli.verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        2 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::filter::LevelFilter::from_level(log_level))
        .init();

    let config = RunConfig::from_cli(&cli)?;
    info!(?config, "resolved configuration");

    let records = run::run(&config)?;
    info!(images = records.len(), output = %config.output_dir.display(), "done");

    Ok(())
}
