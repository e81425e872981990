// Audio containers - labeled WAV files run through the speech front end
//
// Also hosts the preprocessing step that turns a labeled audio corpus into
// labeled-example files, so later training runs skip feature extraction.

use std::path::{Path, PathBuf};

use super::discovery::EXAMPLE_EXTENSION;
use super::labeled_file::write_frames;
use super::manifest::LabelManifest;
use super::FrameContainer;
use crate::analysis::features::{open_speech_frames, FeatureFrame, SpeechFrames};
use crate::audio::{WavFrameReader, WindowConfig};
use crate::config::FeatureConfig;
use crate::error::{log_pipeline_error, PipelineError};

/// Container producing derivative-augmented frames from a WAV file
pub struct AudioFrameContainer {
    path: PathBuf,
    label: f64,
    windows: WindowConfig,
    features: FeatureConfig,
    frames: Option<SpeechFrames<WavFrameReader>>,
}

impl AudioFrameContainer {
    /// # Arguments
    /// * `path` - WAV file
    /// * `label` - Vocals label attached to every frame (1.0 = has vocals)
    /// * `windows` - Window table
    /// * `features` - Feature extraction parameters
    pub fn new<P: Into<PathBuf>>(
        path: P,
        label: f64,
        windows: &WindowConfig,
        features: &FeatureConfig,
    ) -> Self {
        Self {
            path: path.into(),
            label,
            windows: windows.clone(),
            features: features.clone(),
            frames: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn label(&self) -> f64 {
        self.label
    }
}

impl FrameContainer for AudioFrameContainer {
    fn name(&self) -> String {
        self.path.display().to_string()
    }

    fn open(&mut self) -> Result<(), PipelineError> {
        let reader = WavFrameReader::open(&self.path)?;
        self.frames = Some(open_speech_frames(
            reader,
            &self.windows,
            &self.features,
            vec![self.label],
        )?);
        Ok(())
    }

    fn has_next(&self) -> bool {
        self.frames.as_ref().is_some_and(|frames| frames.has_next())
    }

    fn next(&mut self) -> Result<FeatureFrame, PipelineError> {
        self.frames.as_mut().ok_or(PipelineError::NotOpen)?.next()
    }

    fn close(&mut self) {
        self.frames = None;
    }
}

/// Preprocess labeled audio into `<dest_dir>/<stem>.mfc` example files
///
/// Files without a manifest label are skipped with a warning; files that
/// cannot be decoded are logged and skipped.
///
/// # Returns
/// Paths of the example files written, in input order
///
/// # Errors
/// Failures to write into `dest_dir`, and `UnsupportedSampleRate` for any
/// file outside the window table.
pub fn preprocess_corpus(
    manifest: &LabelManifest,
    audio_files: &[PathBuf],
    dest_dir: &Path,
    windows: &WindowConfig,
    features: &FeatureConfig,
) -> Result<Vec<PathBuf>, PipelineError> {
    std::fs::create_dir_all(dest_dir)?;
    tracing::info!(
        "[Preprocess] Preprocessing {} audio files into {}",
        audio_files.len(),
        dest_dir.display()
    );

    let mut written = Vec::new();
    for (index, path) in audio_files.iter().enumerate() {
        let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) else {
            tracing::warn!("[Preprocess] Skipping file without a usable name: {}", path.display());
            continue;
        };
        let Some(label) = manifest.label_for(stem) else {
            tracing::warn!("[Preprocess] Label not found for: {}", stem);
            continue;
        };

        tracing::debug!(
            "[Preprocess] Processing ({}/{}) {}",
            index + 1,
            audio_files.len(),
            path.display()
        );

        let mut container = AudioFrameContainer::new(path, label, windows, features);
        let frames = match drain(&mut container) {
            Ok(frames) => frames,
            Err(err @ PipelineError::UnsupportedSampleRate { .. }) => {
                log_pipeline_error(&err, &container.name());
                return Err(err);
            }
            Err(err) => {
                log_pipeline_error(&err, &container.name());
                continue;
            }
        };

        let output = dest_dir.join(format!("{}.{}", stem, EXAMPLE_EXTENSION));
        write_frames(&output, &frames, false)?;
        written.push(output);
    }

    tracing::info!(
        "[Preprocess] Wrote {} example files ({} skipped)",
        written.len(),
        audio_files.len() - written.len()
    );
    Ok(written)
}

fn drain(container: &mut dyn FrameContainer) -> Result<Vec<FeatureFrame>, PipelineError> {
    container.open()?;
    let mut frames = Vec::new();
    let result = loop {
        if !container.has_next() {
            break Ok(());
        }
        match container.next() {
            Ok(frame) => frames.push(frame),
            Err(err) => break Err(err),
        }
    };
    container.close();
    result.map(|()| frames)
}
