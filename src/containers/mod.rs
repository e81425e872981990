// Containers module - sources of labeled feature frames for training
//
// A container is opened by the worker that owns it, drained frame by frame
// and closed again. Failures to open or read a container are reported as
// `PipelineError::DataUnavailable` so the trainer can skip that container
// and keep going.

pub mod audio;
pub mod discovery;
pub mod labeled_file;
pub mod manifest;

pub use audio::{preprocess_corpus, AudioFrameContainer};
pub use discovery::{discover_files, select_random, AUDIO_EXTENSIONS, EXAMPLE_EXTENSION};
pub use labeled_file::{read_frames, write_frames, LabeledFrameFile};
pub use manifest::LabelManifest;

use crate::analysis::features::FeatureFrame;
use crate::error::PipelineError;

/// A resettable sequence of labeled feature frames
pub trait FrameContainer: Send {
    /// Human-readable name used in logs
    fn name(&self) -> String;

    /// Prepare the container for reading from its first frame
    fn open(&mut self) -> Result<(), PipelineError>;

    /// Whether `next` will yield another frame
    fn has_next(&self) -> bool;

    /// Next frame; `NotOpen` if the container was not opened
    fn next(&mut self) -> Result<FeatureFrame, PipelineError>;

    /// Release whatever `open` acquired
    fn close(&mut self);
}

/// In-memory container over a fixed list of frames
#[derive(Debug, Clone)]
pub struct MemoryFrameContainer {
    name: String,
    frames: Vec<FeatureFrame>,
    index: Option<usize>,
}

impl MemoryFrameContainer {
    pub fn new(name: impl Into<String>, frames: Vec<FeatureFrame>) -> Self {
        Self {
            name: name.into(),
            frames,
            index: None,
        }
    }
}

impl FrameContainer for MemoryFrameContainer {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn open(&mut self) -> Result<(), PipelineError> {
        self.index = Some(0);
        Ok(())
    }

    fn has_next(&self) -> bool {
        self.index.is_some_and(|index| index < self.frames.len())
    }

    fn next(&mut self) -> Result<FeatureFrame, PipelineError> {
        let index = self.index.ok_or(PipelineError::NotOpen)?;
        let frame = self.frames.get(index).cloned().ok_or_else(|| {
            PipelineError::unavailable(self.name.clone(), "no frames left")
        })?;
        self.index = Some(index + 1);
        Ok(frame)
    }

    fn close(&mut self) {
        self.index = None;
    }
}
