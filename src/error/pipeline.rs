// Pipeline error types and constants

use crate::error::ErrorCode;
use std::fmt;
use tracing::error;

/// Pipeline error code constants
///
/// Error code range: 3001-3006
pub struct PipelineErrorCodes {}

impl PipelineErrorCodes {
    /// Sample rate has no entry in the window table
    pub const UNSUPPORTED_SAMPLE_RATE: i32 = 3001;

    /// A data container could not be opened or read
    pub const DATA_UNAVAILABLE: i32 = 3002;

    /// Input file is malformed (missing headers, wrong file type, bad line)
    pub const MALFORMED_INPUT: i32 = 3003;

    /// Underlying I/O failure
    pub const IO: i32 = 3004;

    /// Frame reader kept returning zero frames although frames remain
    pub const READER_STALLED: i32 = 3005;

    /// Container was used before `open()`
    pub const NOT_OPEN: i32 = 3006;
}

/// Log a pipeline error with structured context
///
/// The logging is non-blocking and will not panic on failure.
pub fn log_pipeline_error(err: &PipelineError, context: &str) {
    error!(
        "Pipeline error in {}: code={}, component=FeaturePipeline, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Feature pipeline errors
///
/// These errors cover everything between a file on disk and a stream of
/// labeled feature frames: audio decoding, windowing, label manifests and
/// the labeled-example file format.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineError {
    /// Sample rate is not one of the supported window table entries
    UnsupportedSampleRate { sample_rate: u32 },

    /// Container could not open or read its data
    DataUnavailable { source: String, reason: String },

    /// Input does not have the expected shape
    MalformedInput { reason: String },

    /// I/O failure while reading or writing
    Io { details: String },

    /// Reader returned no frames repeatedly while reporting frames remaining
    ReaderStalled { remaining: u64 },

    /// Container accessed before open() or after close()
    NotOpen,
}

impl PipelineError {
    /// Shorthand for a [`PipelineError::DataUnavailable`] error.
    pub fn unavailable(source: impl Into<String>, reason: impl Into<String>) -> Self {
        PipelineError::DataUnavailable {
            source: source.into(),
            reason: reason.into(),
        }
    }

    /// Shorthand for a [`PipelineError::MalformedInput`] error.
    pub fn malformed(reason: impl Into<String>) -> Self {
        PipelineError::MalformedInput {
            reason: reason.into(),
        }
    }
}

impl ErrorCode for PipelineError {
    fn code(&self) -> i32 {
        match self {
            PipelineError::UnsupportedSampleRate { .. } => {
                PipelineErrorCodes::UNSUPPORTED_SAMPLE_RATE
            }
            PipelineError::DataUnavailable { .. } => PipelineErrorCodes::DATA_UNAVAILABLE,
            PipelineError::MalformedInput { .. } => PipelineErrorCodes::MALFORMED_INPUT,
            PipelineError::Io { .. } => PipelineErrorCodes::IO,
            PipelineError::ReaderStalled { .. } => PipelineErrorCodes::READER_STALLED,
            PipelineError::NotOpen => PipelineErrorCodes::NOT_OPEN,
        }
    }

    fn message(&self) -> String {
        match self {
            PipelineError::UnsupportedSampleRate { sample_rate } => format!(
                "Unsupported sample rate ({} Hz); supported rates are 8000, 11000, 16000 and 44100 Hz",
                sample_rate
            ),
            PipelineError::DataUnavailable { source, reason } => {
                format!("Data unavailable from {}: {}", source, reason)
            }
            PipelineError::MalformedInput { reason } => format!("Malformed input: {}", reason),
            PipelineError::Io { details } => format!("I/O error: {}", details),
            PipelineError::ReaderStalled { remaining } => format!(
                "Frame reader returned no data with {} frames remaining",
                remaining
            ),
            PipelineError::NotOpen => "Container is not open. Call open() first.".to_string(),
        }
    }
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "PipelineError (code {}): {}",
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for PipelineError {}

impl From<std::io::Error> for PipelineError {
    fn from(err: std::io::Error) -> Self {
        PipelineError::Io {
            details: err.to_string(),
        }
    }
}

impl From<hound::Error> for PipelineError {
    fn from(err: hound::Error) -> Self {
        match err {
            hound::Error::IoError(io) => io.into(),
            other => PipelineError::unavailable("wav decoder", other.to_string()),
        }
    }
}

impl From<csv::Error> for PipelineError {
    fn from(err: csv::Error) -> Self {
        PipelineError::malformed(format!("csv: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_error_codes() {
        assert_eq!(
            PipelineError::UnsupportedSampleRate { sample_rate: 22050 }.code(),
            3001
        );
        assert_eq!(PipelineError::unavailable("a.wav", "gone").code(), 3002);
        assert_eq!(PipelineError::malformed("bad").code(), 3003);
        assert_eq!(
            PipelineError::Io {
                details: "x".to_string()
            }
            .code(),
            3004
        );
        assert_eq!(PipelineError::ReaderStalled { remaining: 3 }.code(), 3005);
        assert_eq!(PipelineError::NotOpen.code(), 3006);
    }

    #[test]
    fn test_unsupported_rate_message_names_rate() {
        let err = PipelineError::UnsupportedSampleRate { sample_rate: 22050 };
        assert!(err.message().contains("22050"));
        assert!(err.to_string().contains("3001"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "no such file");
        let err: PipelineError = io_err.into();
        match err {
            PipelineError::Io { details } => assert!(details.contains("no such file")),
            other => panic!("Expected Io variant, got {:?}", other),
        }
    }
}
