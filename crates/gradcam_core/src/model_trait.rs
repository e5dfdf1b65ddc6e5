//! Architecture adapter traits.
//!
//! A classification network is seen as an ordered sequence of named
//! sublayers (the backbone) followed by a classification head. Backbones
//! report every named sublayer output to a [`LayerTap`], which is how
//! intermediate activations are captured without the network knowing
//! anything about Grad-CAM.

use burn::module::Module;
use burn::prelude::*;

/// Observer of named sublayer outputs during a backbone pass.
///
/// The tap receives ownership of each output and returns the tensor the
/// backbone continues with. Returning the input unchanged is a no-op;
/// returning a tensor that also feeds a gradient-tracking leaf turns the
/// layer into a gradient capture point.
pub trait LayerTap<B: Backend> {
    /// Called right after the sublayer `name` produced `output`.
    fn tap(&mut self, name: &str, output: Tensor<B, 4>) -> Tensor<B, 4>;
}

/// Tap that lets every output through untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassThrough;

impl<B: Backend> LayerTap<B> for PassThrough {
    fn tap(&mut self, _name: &str, output: Tensor<B, 4>) -> Tensor<B, 4> {
        output
    }
}

/// Tap that records the name of every sublayer it sees, in order.
#[derive(Debug, Clone, Default)]
pub struct LayerNames {
    names: Vec<String>,
}

impl LayerNames {
    /// Names recorded so far.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Consume the recorder, returning the names.
    pub fn into_names(self) -> Vec<String> {
        self.names
    }
}

impl<B: Backend> LayerTap<B> for LayerNames {
    fn tap(&mut self, name: &str, output: Tensor<B, 4>) -> Tensor<B, 4> {
        self.names.push(name.to_string());
        output
    }
}

/// Capabilities a network family must provide to be explained with Grad-CAM.
///
/// One implementation exists per supported family; the concrete type is
/// selected once at startup and handed to the engine.
pub trait CamArchitecture<B: Backend>: Module<B> {
    /// Canonical architecture name (e.g. `"resnet50"`).
    fn name(&self) -> &'static str;

    /// Default target layers, in forward order.
    fn target_layers(&self) -> Vec<String>;

    /// Number of classes produced by the head.
    fn num_classes(&self) -> usize;

    /// Run the named sublayers in declaration order, reporting each output
    /// to `tap`, and return the final feature map.
    ///
    /// # Arguments
    ///
    /// * `x` - Input tensor of shape (batch, 3, height, width)
    fn run_backbone(&self, x: Tensor<B, 4>, tap: &mut dyn LayerTap<B>) -> Tensor<B, 4>;

    /// Classification head applied to flattened backbone features.
    ///
    /// # Returns
    ///
    /// Logits tensor of shape (batch, n_classes)
    fn run_head(&self, features: Tensor<B, 2>) -> Tensor<B, 2>;

    /// Turn off gradient tracking for every parameter.
    ///
    /// Backward passes then only reach the captured activations, and no
    /// parameter gradient can accumulate between calls.
    fn zero_gradients(self) -> Self
    where
        Self: Sized,
    {
        self.no_grad()
    }

    /// Names of every sublayer the backbone reports for `input`, in order.
    fn layer_names(&self, input: Tensor<B, 4>) -> Vec<String> {
        let mut names = LayerNames::default();
        let _ = self.run_backbone(input, &mut names);
        names.into_names()
    }

    /// Plain forward pass returning logits.
    fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 2> {
        let features = self.run_backbone(x, &mut PassThrough);
        self.run_head(flatten(features))
    }
}

/// Flatten every non-batch dimension: (N, C, H, W) -> (N, C*H*W).
pub fn flatten<B: Backend>(x: Tensor<B, 4>) -> Tensor<B, 2> {
    let [batch, channels, height, width] = x.dims();
    x.reshape([batch, channels * height * width])
}
