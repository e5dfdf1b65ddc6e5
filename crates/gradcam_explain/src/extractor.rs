//! Feature extraction with gradient capture points.
//!
//! The extractor is the [`LayerTap`] handed to a backbone during a Grad-CAM
//! forward pass. When a target layer reports its output, the extractor
//! creates a leaf tensor that requires a gradient and records it. The
//! forward pass continues from a tensor that is numerically the original
//! output but routes its gradient both into the leaf and upstream, so that
//! every target receives a gradient even when several targets are chained.

use burn::prelude::*;
use burn::tensor::backend::AutodiffBackend;
use tracing::{debug, trace};

use gradcam_core::{CamArchitecture, LayerTap};

use crate::activation::{ActivationCapture, GradientCapture};
use crate::error::{ExplainError, Result};

/// Runs a backbone while capturing target-layer activations and gradients.
#[derive(Debug)]
pub struct FeatureExtractor<B: AutodiffBackend> {
    target_layers: Vec<String>,
    activations: ActivationCapture<B>,
    gradients: GradientCapture<B::InnerBackend>,
}

impl<B: AutodiffBackend> FeatureExtractor<B> {
    /// Create an extractor for the given target layers.
    pub fn new(target_layers: Vec<String>) -> Self {
        Self {
            target_layers,
            activations: ActivationCapture::new(),
            gradients: GradientCapture::new(),
        }
    }

    /// Target layer names.
    pub fn target_layers(&self) -> &[String] {
        &self.target_layers
    }

    /// Replace the target layers; captured tensors are dropped.
    pub fn set_target_layers(&mut self, target_layers: Vec<String>) {
        self.target_layers = target_layers;
        self.reset();
    }

    /// Drop every captured activation and gradient.
    pub fn reset(&mut self) {
        self.activations.clear();
        self.gradients.clear();
    }

    /// Activations captured by the last [`extract`](Self::extract).
    pub fn activations(&self) -> &ActivationCapture<B> {
        &self.activations
    }

    /// Gradients captured by the last [`capture_gradients`](Self::capture_gradients).
    pub fn gradients(&self) -> &GradientCapture<B::InnerBackend> {
        &self.gradients
    }

    /// Run the backbone of `model` on `x`.
    ///
    /// # Returns
    ///
    /// The target activations in visitation order and the final feature map.
    ///
    /// # Errors
    ///
    /// [`ExplainError::UnknownTargetLayer`] if a target was never visited.
    pub fn extract<M>(&mut self, model: &M, x: Tensor<B, 4>) -> Result<(Vec<Tensor<B, 4>>, Tensor<B, 4>)>
    where
        M: CamArchitecture<B>,
    {
        if self.target_layers.is_empty() {
            return Err(ExplainError::NoTargetLayers);
        }
        self.reset();

        let features = model.run_backbone(x, self);

        if let Some(missing) = self
            .target_layers
            .iter()
            .find(|name| !self.activations.contains(name))
        {
            return Err(ExplainError::UnknownTargetLayer {
                name: missing.clone(),
                architecture: model.name().to_string(),
            });
        }

        debug!(
            captured = ?self.activations.names(),
            features = ?features.dims(),
            "forward pass captured target layers"
        );
        Ok((self.activations.tensors(), features))
    }

    /// Read the gradient of every captured activation from `grads`.
    ///
    /// Gradients are stored in forward visitation order, so the last one
    /// belongs to the deepest target layer.
    pub fn capture_gradients(&mut self, grads: &B::Gradients) -> Result<()> {
        self.gradients.clear();
        for (name, activation) in self.activations.iter() {
            let gradient = activation
                .grad(grads)
                .ok_or_else(|| ExplainError::MissingGradient {
                    layer: name.to_string(),
                })?;
            trace!(layer = name, shape = ?gradient.dims(), "captured gradient");
            self.gradients.store(name, gradient);
        }
        Ok(())
    }
}

impl<B: AutodiffBackend> LayerTap<B> for FeatureExtractor<B> {
    fn tap(&mut self, name: &str, output: Tensor<B, 4>) -> Tensor<B, 4> {
        if !self.target_layers.iter().any(|target| target == name) {
            return output;
        }

        let leaf = output.clone().detach().require_grad();
        self.activations.store(name, leaf.clone());
        trace!(layer = name, shape = ?leaf.dims(), "captured activation");

        // Numerically `output`; the gradient reaches both `leaf` and `output`.
        output + leaf.clone() - leaf.detach()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::TinyNet;
    use gradcam_core::backend::CpuAutodiff;
    use gradcam_core::flatten;

    type TestBackend = CpuAutodiff;

    fn targets(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn test_extract_captures_targets_in_order() {
        let device = Default::default();
        let model = TinyNet::<TestBackend>::new(4, 2, &device);
        let mut extractor = FeatureExtractor::new(targets(&["relu", "conv"]));

        let x = Tensor::<TestBackend, 4>::ones([1, 3, 4, 4], &device);
        let (activations, features) = extractor.extract(&model, x).unwrap();

        assert_eq!(activations.len(), 2);
        assert_eq!(extractor.activations().names(), ["conv", "relu"]);
        assert_eq!(features.dims(), [1, 4, 4, 4]);
    }

    #[test]
    fn test_every_chained_target_gets_a_gradient() {
        let device = Default::default();
        let model = TinyNet::<TestBackend>::new(4, 2, &device);
        let mut extractor = FeatureExtractor::new(targets(&["conv", "relu"]));

        let x = Tensor::<TestBackend, 4>::ones([1, 3, 4, 4], &device);
        let (_, features) = extractor.extract(&model, x).unwrap();
        let score = model.run_head(flatten(features)).sum();
        let grads = score.backward();

        extractor.capture_gradients(&grads).unwrap();
        assert_eq!(extractor.gradients().names(), ["conv", "relu"]);
        assert_eq!(extractor.gradients().last().unwrap().1.dims(), [1, 4, 4, 4]);
    }

    #[test]
    fn test_unknown_target_layer() {
        let device = Default::default();
        let model = TinyNet::<TestBackend>::new(4, 2, &device);
        let mut extractor = FeatureExtractor::new(targets(&["layer4"]));

        let x = Tensor::<TestBackend, 4>::ones([1, 3, 4, 4], &device);
        let err = extractor.extract(&model, x).unwrap_err();
        assert!(matches!(err, ExplainError::UnknownTargetLayer { ref name, .. } if name == "layer4"));
    }

    #[test]
    fn test_extract_resets_captures() {
        let device = Default::default();
        let model = TinyNet::<TestBackend>::new(4, 2, &device);
        let mut extractor = FeatureExtractor::new(targets(&["relu"]));

        for _ in 0..2 {
            let x = Tensor::<TestBackend, 4>::ones([1, 3, 4, 4], &device);
            extractor.extract(&model, x).unwrap();
        }
        assert_eq!(extractor.activations().len(), 1);
        assert!(extractor.gradients().is_empty());
    }

    #[test]
    fn test_no_targets() {
        let device = Default::default();
        let model = TinyNet::<TestBackend>::new(4, 2, &device);
        let mut extractor = FeatureExtractor::new(Vec::new());

        let x = Tensor::<TestBackend, 4>::ones([1, 3, 4, 4], &device);
        assert!(matches!(
            extractor.extract(&model, x),
            Err(ExplainError::NoTargetLayers)
        ));
    }
}
