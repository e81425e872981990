// Network module - feed-forward multilayer perceptron

pub mod activation;
pub mod layer;
pub mod mlp;

pub use activation::Activation;
pub use layer::{Layer, Node, WeightInit};
pub use mlp::MultiLayerPerceptron;
