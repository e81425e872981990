//! Configuration management for the feature pipeline and trainer
//!
//! This module provides runtime configuration loading from JSON files,
//! enabling experiments with network shape, convergence criteria and
//! feature parameters without recompilation. Command line flags override
//! whatever the file provides.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::audio::WindowConfig;

/// Complete application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub window: WindowConfig,
    pub features: FeatureConfig,
    pub network: NetworkConfig,
    pub training: TrainingConfig,
}

/// Feature extraction parameters (ETSI ES 201 108 front-end)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    /// Number of cepstral coefficients returned per channel
    pub num_coefficients: usize,
    /// DCT basis index of the first returned coefficient (1 skips c0)
    pub offset_coefficient: usize,
    /// Half-window T used by the central-difference derivatives
    pub derivative_half_window: usize,
    /// Lower edge of the mel filterbank in Hz
    pub mel_start_hz: f64,
    /// Number of triangular mel filters
    pub num_mel_channels: usize,
    /// Pole of the DC offset compensation filter
    pub dc_offset_coefficient: f64,
    /// Pre-emphasis filter coefficient
    pub pre_emphasis_coefficient: f64,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            num_coefficients: 13,
            offset_coefficient: 1,
            derivative_half_window: 2,
            mel_start_hz: 64.0,
            num_mel_channels: 24,
            dc_offset_coefficient: 0.999,
            pre_emphasis_coefficient: 0.97,
        }
    }
}

impl FeatureConfig {
    /// Base feature length per channel: log energy followed by the cepstrum
    pub fn features_per_channel(&self) -> usize {
        1 + self.num_coefficients
    }
}

/// Activation function selector used by the network config
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivationKind {
    Logistic,
    SoftMax,
}

/// Network topology and initialisation parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Node count of each hidden layer, head first
    pub hidden_layers: Vec<usize>,
    /// Activation shared by every hidden layer
    pub hidden_activation: ActivationKind,
    /// Node count of the output layer
    pub output_nodes: usize,
    /// Activation of the output layer
    pub output_activation: ActivationKind,
    /// Steepness of the logistic / softmax functions
    pub alpha: f64,
    /// Lower bound of the uniform initial weight range
    pub initial_weight_min: f64,
    /// Upper bound (exclusive) of the uniform initial weight range
    pub initial_weight_max: f64,
    /// Seed for weight initialisation; `None` seeds from entropy
    pub seed: Option<u64>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            hidden_layers: vec![30, 10],
            hidden_activation: ActivationKind::Logistic,
            output_nodes: 1,
            output_activation: ActivationKind::SoftMax,
            alpha: 1.0,
            initial_weight_min: 0.2,
            initial_weight_max: 0.8,
            seed: None,
        }
    }
}

/// Trainer convergence and scheduling parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Hard cap on epochs; reaching it is logged as a warning
    pub max_epochs: usize,
    /// Training stops once |error - previous error| drops below this
    pub min_delta_error: f64,
    /// Upper bound on worker threads (further bounded by CPU count)
    pub max_threads: usize,
    /// Fraction of containers used for training; the rest are for testing
    pub training_fraction: f64,
    /// Learning rate decay: eta(epoch) = 1 / (1 + decay * epoch)
    pub learning_rate_decay: f64,
    /// Completion poll backoff start in milliseconds
    pub poll_start_ms: u64,
    /// Completion poll backoff increment in milliseconds
    pub poll_step_ms: u64,
    /// Completion poll backoff cap in milliseconds
    pub poll_max_ms: u64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            max_epochs: 1000,
            min_delta_error: 1e-5,
            max_threads: usize::MAX,
            training_fraction: 0.75,
            learning_rate_decay: 0.01,
            poll_start_ms: 2,
            poll_step_ms: 10,
            poll_max_ms: 150,
        }
    }
}

impl TrainingConfig {
    /// Learning rate for the given (zero-based) epoch
    pub fn learning_rate(&self, epoch: usize) -> f64 {
        1.0 / (1.0 + self.learning_rate_decay * epoch as f64)
    }
}

impl AppConfig {
    /// Load configuration from JSON file
    ///
    /// # Arguments
    /// * `path` - Path to JSON config file
    ///
    /// # Returns
    /// The loaded configuration, or the defaults if the file doesn't exist
    /// or holds invalid JSON (the failure is logged).
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        match fs::read_to_string(&path) {
            Ok(contents) => match Self::from_json_str(&contents) {
                Ok(config) => {
                    log::info!("[Config] Loaded configuration from {:?}", path.as_ref());
                    config
                }
                Err(err) => {
                    log::warn!(
                        "[Config] Failed to parse JSON from {:?}: {}. Using defaults.",
                        path.as_ref(),
                        err
                    );
                    Self::default()
                }
            },
            Err(err) => {
                log::warn!(
                    "[Config] Failed to read config file {:?}: {}. Using defaults.",
                    path.as_ref(),
                    err
                );
                Self::default()
            }
        }
    }

    /// Parse configuration from a JSON string, failing on invalid input
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
