//! The render loop.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use burn::module::Module;
use burn::tensor::backend::AutodiffBackend;
use tracing::{info, warn};

use gradcam::pipeline::{explain_image, CamRecord};
use gradcam_core::CamArchitecture;
use gradcam_explain::GradCam;
use gradcam_models::{
    load_pretrained, Architecture, DenseNet121Config, ResNet50Config, TorchvisionImport,
    Vgg19Config,
};
use gradcam_vision::list_images;

use crate::config::{DeviceChoice, RunConfig};

/// Explain every image of the configured directory.
pub fn run(config: &RunConfig) -> Result<Vec<CamRecord>> {
    fs::create_dir_all(&config.output_dir).with_context(|| {
        format!("Failed to create output directory {}", config.output_dir.display())
    })?;

    let config_path = config.output_dir.join("config.json");
    fs::write(&config_path, serde_json::to_string_pretty(config)?)?;
    info!(path = %config_path.display(), "saved config");

    // Enumerated up front; files added while running are not picked up.
    let images = list_images(&config.image_dir)
        .with_context(|| format!("Failed to list images in {}", config.image_dir.display()))?;
    if images.is_empty() {
        warn!(dir = %config.image_dir.display(), "no input images found");
    }

    let records = match config.device {
        DeviceChoice::Cpu => {
            println!("Using CPU for computation");
            let device = Default::default();
            run_on::<gradcam_core::backend::CpuAutodiff>(config, &images, &device)?
        }
        DeviceChoice::Gpu => run_gpu(config, &images)?,
    };

    let summary_path = config.output_dir.join("summary.json");
    fs::write(&summary_path, serde_json::to_string_pretty(&records)?)?;
    info!(path = %summary_path.display(), images = records.len(), "saved summary");

    Ok(records)
}

#[cfg(feature = "backend-wgpu")]
fn run_gpu(config: &RunConfig, images: &[PathBuf]) -> Result<Vec<CamRecord>> {
    println!("Using GPU for acceleration");
    let device = gradcam_core::backend::WgpuDevice::default();
    run_on::<gradcam_core::backend::GpuAutodiff>(config, images, &device)
}

#[cfg(not(feature = "backend-wgpu"))]
fn run_gpu(_config: &RunConfig, _images: &[PathBuf]) -> Result<Vec<CamRecord>> {
    anyhow::bail!("GPU support requires building with the backend-wgpu feature")
}

fn run_on<B: AutodiffBackend>(
    config: &RunConfig,
    images: &[PathBuf],
    device: &B::Device,
) -> Result<Vec<CamRecord>> {
    let num_classes = config.num_classes;
    match config.architecture {
        Architecture::Vgg19 => {
            let model = Vgg19Config::new(num_classes).init::<B>(device);
            explain_all(with_weights(model, config, device)?, config, images, device)
        }
        Architecture::ResNet50 => {
            let model = ResNet50Config::new(num_classes).init::<B>(device);
            explain_all(with_weights(model, config, device)?, config, images, device)
        }
        Architecture::DenseNet121 => {
            let model = DenseNet121Config::new(num_classes).init::<B>(device);
            explain_all(with_weights(model, config, device)?, config, images, device)
        }
    }
}

fn with_weights<B: AutodiffBackend, M: Module<B> + TorchvisionImport<B>>(
    model: M,
    config: &RunConfig,
    device: &B::Device,
) -> Result<M> {
    match &config.weights {
        Some(path) => load_pretrained(model, path, device)
            .with_context(|| format!("Failed to load {} weights", config.architecture)),
        None => {
            warn!(
                architecture = %config.architecture,
                "no --weights given; using randomly initialized parameters"
            );
            Ok(model)
        }
    }
}

fn explain_all<B: AutodiffBackend, M: CamArchitecture<B>>(
    model: M,
    config: &RunConfig,
    images: &[PathBuf],
    device: &B::Device,
) -> Result<Vec<CamRecord>> {
    let mut engine = GradCam::new(model).with_target_layers(config.target_layers.clone());
    info!(
        architecture = engine.model().name(),
        targets = ?engine.target_layers(),
        "grad-cam engine ready"
    );

    let mut records = Vec::with_capacity(images.len());
    let mut counter = 1;
    for path in images {
        let record = explain_one(&mut engine, path, config, counter, device)?;
        records.push(record);
        counter += 1;
    }
    Ok(records)
}

fn explain_one<B: AutodiffBackend, M: CamArchitecture<B>>(
    engine: &mut GradCam<B, M>,
    path: &Path,
    config: &RunConfig,
    counter: usize,
    device: &B::Device,
) -> Result<CamRecord> {
    explain_image(
        engine,
        path,
        &config.output_dir,
        counter,
        config.target_index,
        device,
    )
    .with_context(|| format!("Failed to explain {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::module::Param;
    use burn::nn::{Linear, LinearConfig};
    use burn::prelude::*;
    use gradcam_core::backend::CpuAutodiff;
    use gradcam_core::LayerTap;
    use image::RgbImage;

    type TestBackend = CpuAutodiff;

    /// Spatial mean of the input followed by a zero linear layer.
    #[derive(Module, Debug)]
    struct MeanNet<B: Backend> {
        fc: Linear<B>,
    }

    impl<B: Backend> MeanNet<B> {
        fn new(device: &B::Device) -> Self {
            let mut fc = LinearConfig::new(3, 2).init(device);
            fc.weight = Param::from_tensor(Tensor::zeros([3, 2], device));
            Self { fc }
        }
    }

    impl<B: Backend> CamArchitecture<B> for MeanNet<B> {
        fn name(&self) -> &'static str {
            "mean"
        }

        fn target_layers(&self) -> Vec<String> {
            vec!["input".to_string()]
        }

        fn num_classes(&self) -> usize {
            2
        }

        fn run_backbone(&self, x: Tensor<B, 4>, tap: &mut dyn LayerTap<B>) -> Tensor<B, 4> {
            tap.tap("input", x).mean_dim(2).mean_dim(3)
        }

        fn run_head(&self, features: Tensor<B, 2>) -> Tensor<B, 2> {
            self.fc.forward(features)
        }
    }

    fn config_for(image_dir: &Path, output_dir: &Path) -> RunConfig {
        RunConfig {
            architecture: Architecture::DenseNet121,
            device: DeviceChoice::Cpu,
            image_dir: image_dir.to_path_buf(),
            output_dir: output_dir.to_path_buf(),
            weights: None,
            target_index: None,
            target_layers: vec!["input".to_string()],
            num_classes: 2,
        }
    }

    fn write_png(path: &Path) {
        RgbImage::from_pixel(8, 6, image::Rgb([200, 40, 10]))
            .save(path)
            .unwrap();
    }

    #[test]
    fn test_explain_all_numbers_from_one() {
        let images_dir = tempfile::tempdir().unwrap();
        let output_dir = tempfile::tempdir().unwrap();
        let images = vec![images_dir.path().join("a.png"), images_dir.path().join("b.png")];
        images.iter().for_each(|path| write_png(path));

        let device = Default::default();
        let config = config_for(images_dir.path(), output_dir.path());
        let records =
            explain_all(MeanNet::<TestBackend>::new(&device), &config, &images, &device).unwrap();

        let outputs: Vec<_> = records.iter().map(|record| record.output.clone()).collect();
        assert_eq!(
            outputs,
            [output_dir.path().join("cam1.jpg"), output_dir.path().join("cam2.jpg")]
        );
        assert!(outputs.iter().all(|path| path.is_file()));
        assert!(!output_dir.path().join("cam0.jpg").exists());
        assert_eq!(records[1].input, images[1]);
    }

    #[test]
    fn test_explain_all_stops_at_undecodable_file() {
        let images_dir = tempfile::tempdir().unwrap();
        let output_dir = tempfile::tempdir().unwrap();
        let images = vec![
            images_dir.path().join("a.png"),
            images_dir.path().join("b.txt"),
            images_dir.path().join("c.png"),
        ];
        write_png(&images[0]);
        fs::write(&images[1], "not an image").unwrap();
        write_png(&images[2]);

        let device = Default::default();
        let config = config_for(images_dir.path(), output_dir.path());
        let err =
            explain_all(MeanNet::<TestBackend>::new(&device), &config, &images, &device)
                .unwrap_err();

        assert!(err.to_string().contains("b.txt"), "{err:#}");
        assert!(output_dir.path().join("cam1.jpg").is_file());
        assert!(!output_dir.path().join("cam2.jpg").exists());
        assert!(!output_dir.path().join("cam3.jpg").exists());
    }

    #[test]
    fn test_run_writes_config_and_summary() {
        let images_dir = tempfile::tempdir().unwrap();
        let output_root = tempfile::tempdir().unwrap();
        let output_dir = output_root.path().join("results");
        let config = config_for(images_dir.path(), &output_dir);

        let records = run(&config).unwrap();
        assert!(records.is_empty());

        let saved: RunConfig =
            serde_json::from_str(&fs::read_to_string(output_dir.join("config.json")).unwrap())
                .unwrap();
        assert_eq!(saved, config);
        let summary: Vec<CamRecord> =
            serde_json::from_str(&fs::read_to_string(output_dir.join("summary.json")).unwrap())
                .unwrap();
        assert!(summary.is_empty());
    }

    #[test]
    fn test_run_aborts_on_undecodable_file() {
        let images_dir = tempfile::tempdir().unwrap();
        let output_dir = tempfile::tempdir().unwrap();
        fs::write(images_dir.path().join("notes.txt"), "not an image").unwrap();
        let config = config_for(images_dir.path(), output_dir.path());

        let err = run(&config).unwrap_err();
        assert!(err.to_string().contains("notes.txt"), "{err:#}");
        assert!(output_dir.path().join("config.json").is_file());
        assert!(!output_dir.path().join("summary.json").exists());
        assert!(!output_dir.path().join("cam1.jpg").exists());
    }
}
