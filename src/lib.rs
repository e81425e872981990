// Has Vocals - speech feature pipeline and vocals classifier trainer
//
// Audio windows are turned into MFCC-plus-derivative feature frames which
// train a multilayer perceptron to tell apart recordings with and without
// vocals.

// Module declarations
pub mod analysis;
pub mod audio;
pub mod config;
pub mod containers;
pub mod error;
pub mod network;
pub mod training;

// Re-exports for convenience
pub use analysis::features::{open_speech_frames, FeatureFrame, SpeechFrames};
pub use audio::{WavFrameReader, WindowConfig, WindowedSignalSource};
pub use config::AppConfig;
pub use containers::{FrameContainer, LabelManifest, LabeledFrameFile};
pub use error::{ErrorCode, PipelineError, TrainingError};
pub use network::MultiLayerPerceptron;
pub use training::{BackpropTrainer, TrainingSummary};
