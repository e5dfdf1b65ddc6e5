//! Activation and gradient capture lists.
//!
//! Both lists keep insertion order, which is the order in which the forward
//! pass visited the layers.

use burn::prelude::*;

/// Captured activations from target layers.
#[derive(Debug, Clone)]
pub struct ActivationCapture<B: Backend> {
    /// Activations by layer name, in visitation order.
    activations: Vec<(String, Tensor<B, 4>)>,
}

impl<B: Backend> ActivationCapture<B> {
    /// Create a new activation capture.
    pub fn new() -> Self {
        Self {
            activations: Vec::new(),
        }
    }

    /// Store an activation, replacing an earlier one with the same name.
    pub fn store(&mut self, name: &str, activation: Tensor<B, 4>) {
        match self.activations.iter_mut().find(|(n, _)| n == name) {
            Some(entry) => entry.1 = activation,
            None => self.activations.push((name.to_string(), activation)),
        }
    }

    /// Get an activation by name.
    pub fn get(&self, name: &str) -> Option<&Tensor<B, 4>> {
        self.activations
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, t)| t)
    }

    /// Whether `name` was captured.
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Get all layer names in order.
    pub fn names(&self) -> Vec<&str> {
        self.activations.iter().map(|(n, _)| n.as_str()).collect()
    }

    /// Iterate over `(name, activation)` pairs in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Tensor<B, 4>)> {
        self.activations.iter().map(|(n, t)| (n.as_str(), t))
    }

    /// Activations in order.
    pub fn tensors(&self) -> Vec<Tensor<B, 4>> {
        self.activations.iter().map(|(_, t)| t.clone()).collect()
    }

    /// Most recently visited entry.
    pub fn last(&self) -> Option<(&str, &Tensor<B, 4>)> {
        self.activations.last().map(|(n, t)| (n.as_str(), t))
    }

    /// Number of captured activations.
    pub fn len(&self) -> usize {
        self.activations.len()
    }

    /// Whether nothing was captured.
    pub fn is_empty(&self) -> bool {
        self.activations.is_empty()
    }

    /// Clear all stored activations.
    pub fn clear(&mut self) {
        self.activations.clear();
    }
}

impl<B: Backend> Default for ActivationCapture<B> {
    fn default() -> Self {
        Self::new()
    }
}

/// Captured gradients from target layers.
#[derive(Debug, Clone)]
pub struct GradientCapture<B: Backend> {
    /// Gradients by layer name, in forward visitation order.
    gradients: Vec<(String, Tensor<B, 4>)>,
}

impl<B: Backend> GradientCapture<B> {
    /// Create a new gradient capture.
    pub fn new() -> Self {
        Self {
            gradients: Vec::new(),
        }
    }

    /// Append a gradient.
    pub fn store(&mut self, name: &str, gradient: Tensor<B, 4>) {
        self.gradients.push((name.to_string(), gradient));
    }

    /// Get a gradient by name.
    pub fn get(&self, name: &str) -> Option<&Tensor<B, 4>> {
        self.gradients
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, t)| t)
    }

    /// Get all layer names in order.
    pub fn names(&self) -> Vec<&str> {
        self.gradients.iter().map(|(n, _)| n.as_str()).collect()
    }

    /// Gradients in order.
    pub fn tensors(&self) -> Vec<Tensor<B, 4>> {
        self.gradients.iter().map(|(_, t)| t.clone()).collect()
    }

    /// Gradient of the deepest captured layer.
    pub fn last(&self) -> Option<(&str, &Tensor<B, 4>)> {
        self.gradients.last().map(|(n, t)| (n.as_str(), t))
    }

    /// Number of captured gradients.
    pub fn len(&self) -> usize {
        self.gradients.len()
    }

    /// Whether nothing was captured.
    pub fn is_empty(&self) -> bool {
        self.gradients.is_empty()
    }

    /// Clear all stored gradients.
    pub fn clear(&mut self) {
        self.gradients.clear();
    }
}

impl<B: Backend> Default for GradientCapture<B> {
    fn default() -> Self {
        Self::new()
    }
}
