// Feature extraction - speech front end for vocals detection
//
// Each analysis window is turned into one feature frame per stream step.
// Per channel the frame holds the log energy followed by the mel cepstrum;
// channels are concatenated. Derivative blocks are appended afterwards by
// the `DerivativeAugmenter`.
//
// Module organization:
// - types: FeatureFrame and its line encoding
// - fft: Hamming window + magnitude spectrum
// - mel: mel filterbank, log compression, DCT, log energy
// - derivatives: delta / delta-delta augmentation over a frame queue
// - stream: windowed audio -> base frames -> augmented frames
// - mod.rs: per-window coordinator (WindowFeatureExtractor)
//
// References:
// - ETSI ES 201 108 V1.1.3 (2003-09), distributed speech recognition
//   front-end feature extraction algorithm

mod derivatives;
mod fft;
mod mel;
mod stream;
mod types;

pub use derivatives::{append_derivatives, BaseFrameSource, DerivativeAugmenter, DERIVATIVE_ORDERS};
pub use fft::{hamming_window, FftProcessor};
pub use mel::{limited_ln, log_energy, mel, mel_inverse, MelCepstrumExtractor, LOG_FLOOR};
pub use stream::{open_speech_frames, SpeechFeatureStream, SpeechFrames};
pub use types::FeatureFrame;

use crate::audio::WindowSpec;
use crate::config::FeatureConfig;

/// WindowFeatureExtractor turns one multi-channel window into a base frame
pub struct WindowFeatureExtractor {
    fft: FftProcessor,
    mel: MelCepstrumExtractor,
    features_per_channel: usize,
}

impl WindowFeatureExtractor {
    /// Create an extractor for the given window geometry
    ///
    /// # Arguments
    /// * `spec` - Window length, FFT length and sample rate
    /// * `config` - Cepstrum and filterbank parameters
    pub fn new(spec: &WindowSpec, config: &FeatureConfig) -> Self {
        Self {
            fft: FftProcessor::new(spec.window_frames, spec.fft_length),
            mel: MelCepstrumExtractor::new(spec.sample_rate, spec.fft_length, config),
            features_per_channel: config.features_per_channel(),
        }
    }

    /// Base features per channel (log energy + cepstrum)
    pub fn features_per_channel(&self) -> usize {
        self.features_per_channel
    }

    /// Extract `[logE, c1..c13]` for every channel of `window`
    ///
    /// # Arguments
    /// * `window` - One preprocessed sample slice per channel
    /// * `labels` - Labels attached to the produced frame
    pub fn extract(&mut self, window: &[&[f64]], labels: &[f64]) -> FeatureFrame {
        let mut features = Vec::with_capacity(window.len() * self.features_per_channel);

        for channel in window {
            features.push(log_energy(channel));
            let spectrum = self.fft.compute_magnitude_spectrum(channel);
            features.extend(self.mel.cepstrum(&spectrum));
        }

        FeatureFrame::new(features, labels.to_vec())
    }
}
