//! Multilayer perceptron: an owned, ordered chain of fully connected layers.
//!
//! The head is the first hidden layer and the tail is the output layer.
//! Cloning a network deep-copies every node's weights; the activation
//! functions are plain values.

use std::fmt;

use rand::rngs::StdRng;
use rand::SeedableRng;

use super::activation::Activation;
use super::layer::{Layer, WeightInit};
use crate::config::NetworkConfig;
use crate::error::TrainingError;

#[derive(Debug, Clone)]
pub struct MultiLayerPerceptron {
    layers: Vec<Layer>,
    init: WeightInit,
}

impl MultiLayerPerceptron {
    /// Empty network whose weights will be drawn from `U(min, max)`
    ///
    /// # Arguments
    /// * `min` - Lower bound of the initial weights
    /// * `max` - Upper bound (exclusive) of the initial weights
    /// * `seed` - RNG seed; `None` seeds from the OS
    pub fn new(min: f64, max: f64, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            layers: Vec::new(),
            init: WeightInit { min, max, rng },
        }
    }

    /// Build the configured topology: hidden layers head first, then the
    /// output layer
    pub fn from_config(config: &NetworkConfig) -> Result<Self, TrainingError> {
        let mut network = Self::new(
            config.initial_weight_min,
            config.initial_weight_max,
            config.seed,
        );
        let hidden = Activation::from_kind(config.hidden_activation, config.alpha);
        for &size in &config.hidden_layers {
            network.append(Layer::new(size, hidden)?);
        }
        let output = Activation::from_kind(config.output_activation, config.alpha);
        network.append(Layer::new(config.output_nodes, output)?);

        tracing::debug!(
            "[Network] Built {:?} -> {} network",
            config.hidden_layers,
            config.output_nodes
        );
        Ok(network)
    }

    /// Add `layer` at the tail
    pub fn append(&mut self, layer: Layer) -> &mut Self {
        self.layers.push(layer);
        self
    }

    /// Add `layer` at the head
    pub fn prepend(&mut self, layer: Layer) -> &mut Self {
        self.layers.insert(0, layer);
        self
    }

    /// Insert `layer` so that it ends up at position `index`
    pub fn insert_at(&mut self, index: usize, layer: Layer) -> Result<&mut Self, TrainingError> {
        if index > self.layers.len() {
            return Err(TrainingError::InvalidTopology {
                reason: format!(
                    "cannot insert layer at {} in a network of {} layers",
                    index,
                    self.layers.len()
                ),
            });
        }
        self.layers.insert(index, layer);
        Ok(self)
    }

    /// Number of layers
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub fn layer(&self, index: usize) -> Option<&Layer> {
        self.layers.get(index)
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub(crate) fn layers_mut(&mut self) -> &mut [Layer] {
        &mut self.layers
    }

    /// Input dimension, `None` until the first forward pass sizes the weights
    pub fn input_len(&self) -> Option<usize> {
        self.layers.first().and_then(Layer::input_len)
    }

    /// Number of output nodes
    pub fn output_len(&self) -> usize {
        self.layers.last().map_or(0, Layer::len)
    }

    /// Inference-mode forward pass
    pub fn evaluate(&mut self, inputs: &[f64]) -> Result<Vec<f64>, TrainingError> {
        self.evaluate_mode(inputs, false)
    }

    /// Forward pass head to tail
    ///
    /// In training mode every layer caches its inputs and outputs and
    /// resets its blames for the following back-propagation.
    pub fn evaluate_mode(&mut self, inputs: &[f64], training: bool) -> Result<Vec<f64>, TrainingError> {
        if self.layers.is_empty() {
            return Err(TrainingError::InvalidTopology {
                reason: "network has no layers".to_string(),
            });
        }
        let mut outputs = inputs.to_vec();
        for layer in &mut self.layers {
            outputs = layer.evaluate(&outputs, training, &mut self.init)?;
        }
        Ok(outputs)
    }

    /// Replace the weights of one node
    pub fn set_weights(&mut self, layer: usize, node: usize, weights: Vec<f64>) -> Result<(), TrainingError> {
        let len = self.layers.len();
        self.layers
            .get_mut(layer)
            .ok_or(TrainingError::DimensionMismatch {
                what: "layer index",
                expected: len,
                actual: layer,
            })?
            .set_weights(node, weights)
    }

    pub fn weights(&self, layer: usize, node: usize) -> Option<&[f64]> {
        self.layers.get(layer).and_then(|layer| layer.weights(node))
    }

    /// Zero every delta-weight accumulator in the network
    pub fn zero_delta_weights(&mut self) {
        for layer in &mut self.layers {
            layer.zero_delta_weights();
        }
    }

    /// Copy every weight vector from `other`, which must share this topology
    pub fn copy_weights_from(&mut self, other: &MultiLayerPerceptron) {
        for (mine, theirs) in self.layers.iter_mut().zip(&other.layers) {
            for (node, source) in mine.nodes_mut().iter_mut().zip(theirs.nodes()) {
                node.weights.clone_from(&source.weights);
                if node.delta_weights.len() != node.weights.len() {
                    node.delta_weights = vec![0.0; node.weights.len()];
                }
            }
        }
    }
}

impl fmt::Display for MultiLayerPerceptron {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, layer) in self.layers.iter().enumerate() {
            writeln!(f, "== Layer {} ===================", i)?;
            writeln!(f, "{}", layer)?;
        }
        Ok(())
    }
}
