// Error types for the vocal detection pipeline and trainer
//
// This module defines custom error types for feature extraction and training,
// providing structured error handling with numeric error codes so the CLI
// (and any embedding application) can react to failures programmatically.

mod pipeline;
mod training;

pub use pipeline::{log_pipeline_error, PipelineError, PipelineErrorCodes};
pub use training::{log_training_error, TrainingError, TrainingErrorCodes};

/// Error codes for structured error reporting
///
/// This trait provides a standard way to get error codes and messages
/// from custom error types.
pub trait ErrorCode {
    /// Get the numeric error code
    fn code(&self) -> i32;

    /// Get the human-readable error message
    fn message(&self) -> String;
}
