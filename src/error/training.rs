// Training error types and constants

use crate::error::{ErrorCode, PipelineError};
use std::fmt;
use tracing::error;

/// Training error code constants
///
/// Error code range: 4001-4006
pub struct TrainingErrorCodes {}

impl TrainingErrorCodes {
    /// NaN or infinite blame / delta-weight detected
    pub const NUMERIC_ANOMALY: i32 = 4001;

    /// Example dimension does not match the network
    pub const DIMENSION_MISMATCH: i32 = 4002;

    /// No training or testing data
    pub const EMPTY_DATASET: i32 = 4003;

    /// Network has no layers or a layer has no nodes
    pub const INVALID_TOPOLOGY: i32 = 4004;

    /// A worker thread panicked
    pub const WORKER_PANICKED: i32 = 4005;

    /// Fatal pipeline error surfaced during training
    pub const PIPELINE: i32 = 4006;
}

/// Log a training error with structured context
pub fn log_training_error(err: &TrainingError, context: &str) {
    error!(
        "Training error in {}: code={}, component=BackpropTrainer, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Training-related errors
#[derive(Debug, Clone, PartialEq)]
pub enum TrainingError {
    /// A blame or delta-weight diverged to NaN / infinity
    NumericAnomaly {
        layer: usize,
        node: usize,
        quantity: &'static str,
    },

    /// Input or target length does not match the network shape
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    /// Training or testing set is empty
    EmptyDataset { which: &'static str },

    /// Network topology is unusable
    InvalidTopology { reason: String },

    /// A worker thread panicked; the epoch is discarded
    WorkerPanicked { worker: usize },

    /// Pipeline failure that cannot be skipped
    Pipeline(PipelineError),
}

impl ErrorCode for TrainingError {
    fn code(&self) -> i32 {
        match self {
            TrainingError::NumericAnomaly { .. } => TrainingErrorCodes::NUMERIC_ANOMALY,
            TrainingError::DimensionMismatch { .. } => TrainingErrorCodes::DIMENSION_MISMATCH,
            TrainingError::EmptyDataset { .. } => TrainingErrorCodes::EMPTY_DATASET,
            TrainingError::InvalidTopology { .. } => TrainingErrorCodes::INVALID_TOPOLOGY,
            TrainingError::WorkerPanicked { .. } => TrainingErrorCodes::WORKER_PANICKED,
            TrainingError::Pipeline(_) => TrainingErrorCodes::PIPELINE,
        }
    }

    fn message(&self) -> String {
        match self {
            TrainingError::NumericAnomaly {
                layer,
                node,
                quantity,
            } => format!(
                "Non-finite {} at layer {}, node {}; training diverged",
                quantity, layer, node
            ),
            TrainingError::DimensionMismatch {
                what,
                expected,
                actual,
            } => format!(
                "{} length mismatch: network expects {}, example has {}",
                what, expected, actual
            ),
            TrainingError::EmptyDataset { which } => format!("The {} set is empty", which),
            TrainingError::InvalidTopology { reason } => {
                format!("Invalid network topology: {}", reason)
            }
            TrainingError::WorkerPanicked { worker } => {
                format!("Worker {} panicked; epoch discarded", worker)
            }
            TrainingError::Pipeline(err) => err.message(),
        }
    }
}

impl fmt::Display for TrainingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "TrainingError (code {}): {}",
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for TrainingError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TrainingError::Pipeline(err) => Some(err),
            _ => None,
        }
    }
}

impl From<PipelineError> for TrainingError {
    fn from(err: PipelineError) -> Self {
        TrainingError::Pipeline(err)
    }
}
