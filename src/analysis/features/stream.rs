// Speech feature stream - windowed audio to derivative-augmented frames

use super::derivatives::{BaseFrameSource, DerivativeAugmenter};
use super::types::FeatureFrame;
use super::WindowFeatureExtractor;
use crate::audio::{FrameReader, WindowConfig, WindowedSignalSource};
use crate::config::FeatureConfig;
use crate::error::PipelineError;

/// Derivative-augmented frames over an audio reader
pub type SpeechFrames<R> = DerivativeAugmenter<SpeechFeatureStream<R>>;

/// Base feature frames (log energy + cepstrum) for each window of a reader
pub struct SpeechFeatureStream<R: FrameReader> {
    windows: WindowedSignalSource<R>,
    extractor: WindowFeatureExtractor,
    labels: Vec<f64>,
}

impl<R: FrameReader> SpeechFeatureStream<R> {
    pub fn open(
        reader: R,
        windows: &WindowConfig,
        features: &FeatureConfig,
        labels: Vec<f64>,
    ) -> Result<Self, PipelineError> {
        let windows = WindowedSignalSource::open(reader, windows, features)?;
        let extractor = WindowFeatureExtractor::new(&windows.spec(), features);
        Ok(Self {
            windows,
            extractor,
            labels,
        })
    }

    pub fn windows(&self) -> &WindowedSignalSource<R> {
        &self.windows
    }
}

impl<R: FrameReader> BaseFrameSource for SpeechFeatureStream<R> {
    fn has_next_frame(&self) -> bool {
        self.windows.has_next_window()
    }

    fn next_frame(&mut self) -> Result<FeatureFrame, PipelineError> {
        let window = self.windows.next_window()?;
        Ok(self.extractor.extract(&window, &self.labels))
    }
}

/// Open the full front end over `reader`: windowing, preprocessing,
/// log energy + MFCC, then derivatives
pub fn open_speech_frames<R: FrameReader>(
    reader: R,
    windows: &WindowConfig,
    features: &FeatureConfig,
    labels: Vec<f64>,
) -> Result<SpeechFrames<R>, PipelineError> {
    let stream = SpeechFeatureStream::open(reader, windows, features, labels)?;
    DerivativeAugmenter::new(stream, features.derivative_half_window)
}
