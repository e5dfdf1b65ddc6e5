//! Output adapter: backbone features to class logits.

use burn::prelude::*;
use burn::tensor::backend::AutodiffBackend;

use gradcam_core::{flatten, CamArchitecture};

use crate::error::Result;
use crate::extractor::FeatureExtractor;

/// Runs a full Grad-CAM forward pass through a network.
#[derive(Debug, Clone, Copy)]
pub struct ModelOutputs<'a, M> {
    model: &'a M,
}

impl<'a, M> ModelOutputs<'a, M> {
    /// Wrap a network.
    pub fn new(model: &'a M) -> Self {
        Self { model }
    }

    /// Flatten the final feature map and apply the classification head.
    pub fn logits<B: Backend>(&self, features: Tensor<B, 4>) -> Tensor<B, 2>
    where
        M: CamArchitecture<B>,
    {
        self.model.run_head(flatten(features))
    }

    /// Forward `x` through the backbone (capturing target activations) and the head.
    ///
    /// # Returns
    ///
    /// Target activations in visitation order and logits of shape (1, num_classes).
    pub fn run<B: AutodiffBackend>(
        &self,
        extractor: &mut FeatureExtractor<B>,
        x: Tensor<B, 4>,
    ) -> Result<(Vec<Tensor<B, 4>>, Tensor<B, 2>)>
    where
        M: CamArchitecture<B>,
    {
        let (activations, features) = extractor.extract(self.model, x)?;
        Ok((activations, self.logits(features)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::TinyNet;
    use gradcam_core::backend::CpuAutodiff;

    type TestBackend = CpuAutodiff;

    #[test]
    fn test_run_returns_activations_and_logits() {
        let device = Default::default();
        let model = TinyNet::<TestBackend>::new(6, 3, &device);
        let mut extractor = FeatureExtractor::new(model.target_layers());

        let x = Tensor::<TestBackend, 4>::ones([1, 3, 6, 6], &device);
        let (activations, logits) = ModelOutputs::new(&model).run(&mut extractor, x).unwrap();

        assert_eq!(activations.len(), 1);
        assert_eq!(activations[0].dims(), [1, 4, 6, 6]);
        assert_eq!(logits.dims(), [1, 3]);
    }

    #[test]
    fn test_logits_match_plain_forward() {
        let device = Default::default();
        let model = TinyNet::<TestBackend>::new(4, 2, &device);
        let mut extractor = FeatureExtractor::new(model.target_layers());

        let x = Tensor::<TestBackend, 4>::ones([1, 3, 4, 4], &device);
        let (_, captured) = ModelOutputs::new(&model)
            .run(&mut extractor, x.clone())
            .unwrap();
        let plain = model.forward(x);

        let captured: Vec<f32> = captured.into_data().to_vec().unwrap();
        let plain: Vec<f32> = plain.into_data().to_vec().unwrap();
        for (a, b) in captured.iter().zip(&plain) {
            assert!((a - b).abs() < 1e-5);
        }
    }
}
