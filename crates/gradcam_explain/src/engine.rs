//! The Grad-CAM engine.
//!
//! One [`GradCam::compute`] call walks the states
//! `Idle -> ForwardDone -> GradientReady -> MapComputed`:
//! forward with capture, one-hot class score, backward, then the weighted
//! activation map of the deepest target layer, resized and normalized.

use std::fmt;

use burn::prelude::*;
use burn::tensor::backend::AutodiffBackend;
use ndarray::Array2;
use tracing::debug;

use gradcam_core::{CamArchitecture, CoreError, ImageShape, INPUT_CHANNELS, INPUT_SIZE};
use gradcam_vision::resize_bilinear;

use crate::attribution::{grad_cam, normalize_shifted_max, to_array2};
use crate::error::{ExplainError, Result};
use crate::extractor::FeatureExtractor;
use crate::outputs::ModelOutputs;

/// Progress of the current [`GradCam::compute`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CamState {
    /// Nothing computed yet.
    #[default]
    Idle,
    /// Activations and logits are available.
    ForwardDone,
    /// Gradients of the target layers are captured.
    GradientReady,
    /// The saliency map is ready.
    MapComputed,
}

impl fmt::Display for CamState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CamState::Idle => "idle",
            CamState::ForwardDone => "forward-done",
            CamState::GradientReady => "gradient-ready",
            CamState::MapComputed => "map-computed",
        };
        f.write_str(name)
    }
}

/// Result of one Grad-CAM computation.
#[derive(Debug, Clone)]
pub struct CamOutput {
    /// Saliency map in [0, 1], at the output resolution.
    pub mask: Array2<f32>,
    /// Class whose score was backpropagated.
    pub class_index: usize,
    /// Logit of that class.
    pub score: f32,
}

/// Grad-CAM over a network implementing [`CamArchitecture`].
#[derive(Debug)]
pub struct GradCam<B: AutodiffBackend, M: CamArchitecture<B>> {
    model: M,
    extractor: FeatureExtractor<B>,
    output_size: [usize; 2],
    state: CamState,
}

impl<B: AutodiffBackend, M: CamArchitecture<B>> GradCam<B, M> {
    /// Create an engine targeting the network's default layers.
    ///
    /// Parameter gradient tracking is turned off here, once, so backward
    /// passes only ever reach the captured activations.
    pub fn new(model: M) -> Self {
        let targets = model.target_layers();
        Self {
            model: model.zero_gradients(),
            extractor: FeatureExtractor::new(targets),
            output_size: [INPUT_SIZE, INPUT_SIZE],
            state: CamState::Idle,
        }
    }

    /// Override the target layers.
    #[must_use]
    pub fn with_target_layers(mut self, target_layers: Vec<String>) -> Self {
        self.extractor.set_target_layers(target_layers);
        self
    }

    /// Override the resolution of the produced map (default 224×224).
    #[must_use]
    pub fn with_output_size(mut self, height: usize, width: usize) -> Self {
        self.output_size = [height, width];
        self
    }

    /// Target layers, in the order they were requested.
    pub fn target_layers(&self) -> &[String] {
        self.extractor.target_layers()
    }

    /// The wrapped network.
    pub fn model(&self) -> &M {
        &self.model
    }

    /// Current state.
    pub fn state(&self) -> CamState {
        self.state
    }

    fn transition(&mut self, state: CamState) {
        debug!(from = %self.state, to = %state, "grad-cam state");
        self.state = state;
    }

    /// Plain forward pass returning the logits.
    pub fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 2> {
        self.model.forward(input)
    }

    /// Compute the saliency map of `input` for `target_index`, or for the
    /// highest-scoring class when `None`.
    ///
    /// # Arguments
    ///
    /// * `input` - Preprocessed image of shape (1, 3, height, width)
    /// * `target_index` - Class to explain
    ///
    /// On error the engine is left [`CamState::Idle`].
    pub fn compute(&mut self, input: Tensor<B, 4>, target_index: Option<usize>) -> Result<CamOutput> {
        self.transition(CamState::Idle);
        let output = self.run_stages(input, target_index);
        if output.is_err() {
            self.transition(CamState::Idle);
        }
        output
    }

    fn run_stages(&mut self, input: Tensor<B, 4>, target_index: Option<usize>) -> Result<CamOutput> {
        let shape = ImageShape::from(input.dims());
        if shape.batch() != 1 || shape.channels() != INPUT_CHANNELS || shape.is_empty() {
            return Err(CoreError::InvalidShape {
                expected: format!("(N=1, C={INPUT_CHANNELS}, H, W)"),
                got: shape.to_string(),
            }
            .into());
        }

        let (_, logits) = ModelOutputs::new(&self.model).run(&mut self.extractor, input)?;
        self.transition(CamState::ForwardDone);

        let [_, num_classes] = logits.dims();
        let class_index = match target_index {
            Some(index) if index >= num_classes => {
                return Err(ExplainError::ClassIndexOutOfRange { index, num_classes });
            }
            Some(index) => index,
            None => {
                let values = logits
                    .clone()
                    .into_data()
                    .to_vec::<f32>()
                    .map_err(|e| ExplainError::TensorData(format!("{e:?}")))?;
                argmax(&values[..num_classes])
            }
        };

        let device = logits.device();
        let one_hot = one_hot::<B>(class_index, num_classes, &device);
        let score = (one_hot * logits).sum();
        let score_value: f32 = score.clone().into_scalar().elem();

        let grads = score.backward();
        self.extractor.capture_gradients(&grads)?;
        self.transition(CamState::GradientReady);

        let (layer, activation) = self
            .extractor
            .activations()
            .last()
            .map(|(name, tensor)| (name.to_string(), tensor.clone().inner()))
            .ok_or(ExplainError::NoTargetLayers)?;
        let gradient = self
            .extractor
            .gradients()
            .get(&layer)
            .cloned()
            .ok_or_else(|| ExplainError::MissingGradient {
                layer: layer.clone(),
            })?;

        let cam = to_array2(grad_cam(activation, gradient)?)?;
        debug!(layer = %layer, size = ?cam.dim(), class_index, "weighted activation map");

        let [height, width] = self.output_size;
        let mask = normalize_shifted_max(resize_bilinear(&cam, height, width));
        self.transition(CamState::MapComputed);

        Ok(CamOutput {
            mask,
            class_index,
            score: score_value,
        })
    }
}

/// Index of the first maximum.
pub fn argmax(values: &[f32]) -> usize {
    values
        .iter()
        .enumerate()
        .fold((0, f32::NEG_INFINITY), |(best, best_value), (index, &value)| {
            if value > best_value {
                (index, value)
            } else {
                (best, best_value)
            }
        })
        .0
}

fn one_hot<B: Backend>(index: usize, num_classes: usize, device: &B::Device) -> Tensor<B, 2> {
    let mut values = vec![0.0f32; num_classes];
    values[index] = 1.0;
    Tensor::from_data(TensorData::new(values, [1, num_classes]), device)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{LinearNet, TinyNet};
    use gradcam_core::backend::CpuAutodiff;

    type TestBackend = CpuAutodiff;

    fn input(values: Vec<f32>, shape: [usize; 4]) -> Tensor<TestBackend, 4> {
        Tensor::from_data(TensorData::new(values, shape), &Default::default())
    }

    /// Two classes over a 3×2×2 input with distinct per-class weights.
    fn two_class_net() -> LinearNet<TestBackend> {
        let weight = (0..12)
            .flat_map(|i| [i as f32 * 0.1, (12 - i) as f32 * 0.1])
            .collect();
        LinearNet::from_weights(weight, vec![0.0, 0.0], 12, &Default::default())
    }

    fn two_class_input() -> Tensor<TestBackend, 4> {
        input((0..12).map(|i| (i % 5) as f32).collect(), [1, 3, 2, 2])
    }

    #[test]
    fn test_rejects_batched_input() {
        let device = Default::default();
        let mut cam = GradCam::new(TinyNet::<TestBackend>::new(4, 2, &device));
        let x = Tensor::<TestBackend, 4>::ones([2, 3, 4, 4], &device);
        let err = cam.compute(x, None).unwrap_err();
        assert!(matches!(
            err,
            ExplainError::Core(CoreError::InvalidShape { .. })
        ));
        assert_eq!(cam.state(), CamState::Idle);
    }

    #[test]
    fn test_argmax_first_maximum() {
        assert_eq!(argmax(&[0.1, 0.7, 0.7, 0.2]), 1);
        assert_eq!(argmax(&[-3.0, -1.0, -2.0]), 1);
    }

    #[test]
    fn test_map_in_unit_range_at_output_size() {
        let device = Default::default();
        let model = TinyNet::<TestBackend>::new(8, 3, &device);
        let mut cam = GradCam::new(model);
        assert_eq!(cam.state(), CamState::Idle);

        let x = Tensor::<TestBackend, 4>::ones([1, 3, 8, 8], &device);
        let output = cam.compute(x, Some(2)).unwrap();

        assert_eq!(output.mask.dim(), (224, 224));
        assert!(output.mask.iter().all(|&v| (0.0..=1.0).contains(&v)));
        assert_eq!(output.class_index, 2);
        assert_eq!(cam.state(), CamState::MapComputed);
    }

    #[test]
    fn test_compute_is_deterministic() {
        let device = Default::default();
        let model = TinyNet::<TestBackend>::new(8, 3, &device);
        let mut cam = GradCam::new(model);

        let x = Tensor::<TestBackend, 4>::ones([1, 3, 8, 8], &device);
        let first = cam.compute(x.clone(), Some(1)).unwrap();
        let second = cam.compute(x, Some(1)).unwrap();

        assert_eq!(first.mask, second.mask);
        assert_eq!(first.score, second.score);
    }

    #[test]
    fn test_selects_highest_logit() {
        let device = Default::default();
        let model = LinearNet::<TestBackend>::from_weights(
            vec![0.0; 12 * 3],
            vec![1.0, 5.0, 2.0],
            12,
            &device,
        );
        let mut cam = GradCam::new(model);

        let output = cam.compute(input(vec![0.0; 12], [1, 3, 2, 2]), None).unwrap();
        assert_eq!(output.class_index, 1);
        assert!((output.score - 5.0).abs() < 1e-6);
        // Zero gradient everywhere gives a zero map.
        assert!(output.mask.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_no_stale_gradients_between_calls() {
        let mut reused = GradCam::new(two_class_net()).with_output_size(2, 2);
        let class0 = reused.compute(two_class_input(), Some(0)).unwrap();
        let class1 = reused.compute(two_class_input(), Some(1)).unwrap();

        let mut fresh = GradCam::new(two_class_net()).with_output_size(2, 2);
        let alone = fresh.compute(two_class_input(), Some(1)).unwrap();

        assert_ne!(class0.mask, class1.mask);
        assert_eq!(class1.mask, alone.mask);
    }

    #[test]
    fn test_class_index_out_of_range() {
        let mut cam = GradCam::new(two_class_net());
        cam.compute(two_class_input(), Some(1)).unwrap();
        assert_eq!(cam.state(), CamState::MapComputed);

        // Fails after the forward pass; the state must not stay at forward-done.
        let err = cam.compute(two_class_input(), Some(2)).unwrap_err();
        assert!(matches!(
            err,
            ExplainError::ClassIndexOutOfRange {
                index: 2,
                num_classes: 2
            }
        ));
        assert_eq!(cam.state(), CamState::Idle);
    }

    #[test]
    fn test_target_layer_override() {
        let device = Default::default();
        let model = TinyNet::<TestBackend>::new(4, 2, &device);
        let mut cam = GradCam::new(model).with_target_layers(vec!["conv".to_string()]);
        assert_eq!(cam.target_layers(), ["conv"]);

        let x = Tensor::<TestBackend, 4>::ones([1, 3, 4, 4], &device);
        assert!(cam.compute(x.clone(), Some(0)).is_ok());

        let mut cam = cam.with_target_layers(vec!["features.35".to_string()]);
        let err = cam.compute(x, Some(0)).unwrap_err();
        assert!(matches!(err, ExplainError::UnknownTargetLayer { .. }));
        assert_eq!(cam.state(), CamState::Idle);
    }
}
