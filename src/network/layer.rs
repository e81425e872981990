// Layer - fully connected nodes sharing one activation function
//
// Node weights are sized lazily from the first input vector the layer sees.
// A training-mode pass caches the layer inputs and activated outputs and
// resets the per-node blame accumulator; back-propagation reads and fills
// those caches.

use std::fmt;

use rand::rngs::StdRng;
use rand::Rng;

use super::activation::Activation;
use crate::analysis::vector;
use crate::error::TrainingError;

/// Uniform initial weight range plus the generator drawing from it
#[derive(Debug, Clone)]
pub struct WeightInit {
    pub min: f64,
    pub max: f64,
    pub rng: StdRng,
}

impl WeightInit {
    fn draw(&mut self, len: usize) -> Vec<f64> {
        if self.max <= self.min {
            return vec![self.min; len];
        }
        (0..len).map(|_| self.rng.gen_range(self.min..self.max)).collect()
    }
}

/// A single neuron: input weights and their accumulated updates
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Node {
    pub(crate) weights: Vec<f64>,
    pub(crate) delta_weights: Vec<f64>,
}

impl Node {
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    pub fn delta_weights(&self) -> &[f64] {
        &self.delta_weights
    }

    fn is_initialized(&self) -> bool {
        !self.weights.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct Layer {
    nodes: Vec<Node>,
    activation: Activation,
    last_inputs: Vec<f64>,
    last_outputs: Vec<f64>,
    blames: Vec<f64>,
}

impl Layer {
    /// Create a layer of `size` nodes
    ///
    /// # Errors
    /// `InvalidTopology` when `size` is zero.
    pub fn new(size: usize, activation: Activation) -> Result<Self, TrainingError> {
        if size == 0 {
            return Err(TrainingError::InvalidTopology {
                reason: "a layer needs at least one node".to_string(),
            });
        }
        Ok(Self {
            nodes: vec![Node::default(); size],
            activation,
            last_inputs: Vec::new(),
            last_outputs: Vec::new(),
            blames: Vec::new(),
        })
    }

    /// Number of nodes
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn activation(&self) -> Activation {
        self.activation
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub(crate) fn nodes_mut(&mut self) -> &mut [Node] {
        &mut self.nodes
    }

    /// Input dimension, once the weights have been sized
    pub fn input_len(&self) -> Option<usize> {
        self.nodes
            .first()
            .filter(|node| node.is_initialized())
            .map(|node| node.weights.len())
    }

    pub fn last_inputs(&self) -> &[f64] {
        &self.last_inputs
    }

    pub fn last_outputs(&self) -> &[f64] {
        &self.last_outputs
    }

    pub fn blames(&self) -> &[f64] {
        &self.blames
    }

    pub(crate) fn blames_mut(&mut self) -> &mut [f64] {
        &mut self.blames
    }

    /// Forward pass through this layer only
    ///
    /// Uninitialised nodes get `inputs.len()` weights drawn from `init`.
    ///
    /// # Errors
    /// `DimensionMismatch` if sized weights disagree with `inputs`.
    pub fn evaluate(
        &mut self,
        inputs: &[f64],
        training: bool,
        init: &mut WeightInit,
    ) -> Result<Vec<f64>, TrainingError> {
        let mut raw = Vec::with_capacity(self.nodes.len());
        for node in &mut self.nodes {
            if !node.is_initialized() {
                node.weights = init.draw(inputs.len());
                node.delta_weights = vec![0.0; inputs.len()];
            } else if node.weights.len() != inputs.len() {
                return Err(TrainingError::DimensionMismatch {
                    what: "input",
                    expected: node.weights.len(),
                    actual: inputs.len(),
                });
            }
            raw.push(vector::dot(&node.weights, inputs));
        }

        let outputs = self.activation.y(&raw);
        if training {
            self.last_inputs = inputs.to_vec();
            self.last_outputs = outputs.clone();
            self.blames = vec![0.0; self.nodes.len()];
        }
        Ok(outputs)
    }

    /// Replace the weights of node `index`, resizing its delta accumulator
    pub fn set_weights(&mut self, index: usize, weights: Vec<f64>) -> Result<(), TrainingError> {
        let len = self.nodes.len();
        let node = self.nodes.get_mut(index).ok_or(TrainingError::DimensionMismatch {
            what: "node index",
            expected: len,
            actual: index,
        })?;
        if node.delta_weights.len() != weights.len() {
            node.delta_weights = vec![0.0; weights.len()];
        }
        node.weights = weights;
        Ok(())
    }

    pub fn weights(&self, index: usize) -> Option<&[f64]> {
        self.nodes.get(index).map(|node| node.weights.as_slice())
    }

    pub fn delta_weights(&self, index: usize) -> Option<&[f64]> {
        self.nodes.get(index).map(|node| node.delta_weights.as_slice())
    }

    /// Zero every node's delta-weight accumulator
    pub fn zero_delta_weights(&mut self) {
        for node in &mut self.nodes {
            node.delta_weights.fill(0.0);
        }
    }
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "lastInputs: {:?}", self.last_inputs)?;
        writeln!(f, "Nodes:")?;
        for (i, node) in self.nodes.iter().enumerate() {
            writeln!(f, "  Node {}", i)?;
            if let Some(blame) = self.blames.get(i) {
                writeln!(f, "    blame: {}", blame)?;
            }
            writeln!(f, "    weights: {:?}", node.weights)?;
            writeln!(f, "    deltaWeights: {:?}", node.delta_weights)?;
        }
        Ok(())
    }
}
