// Labeled example files - one encoded FeatureFrame per line
//
// Files are written once by the preprocessing step and read whole when a
// worker opens them. Pad frames are stored on disk but the container
// never hands them out.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use super::FrameContainer;
use crate::analysis::features::FeatureFrame;
use crate::error::PipelineError;

/// Write `frames` to `path`, one line each
///
/// # Arguments
/// * `path` - Destination file
/// * `frames` - Frames to encode
/// * `append` - Append to an existing file instead of truncating it
pub fn write_frames<P: AsRef<Path>>(
    path: P,
    frames: &[FeatureFrame],
    append: bool,
) -> Result<(), PipelineError> {
    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .append(append)
        .truncate(!append)
        .open(path.as_ref())?;
    let mut writer = BufWriter::new(file);
    for frame in frames {
        writeln!(writer, "{}", frame)?;
    }
    writer.flush()?;
    Ok(())
}

/// Read every frame stored in `path`
///
/// Blank lines are ignored. A line that fails to decode is reported as
/// `MalformedInput` naming the file and line number.
pub fn read_frames<P: AsRef<Path>>(path: P) -> Result<Vec<FeatureFrame>, PipelineError> {
    let path = path.as_ref();
    let file = File::open(path)
        .map_err(|err| PipelineError::unavailable(path.display().to_string(), err.to_string()))?;

    let mut frames = Vec::new();
    for (number, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let frame = FeatureFrame::from_line(&line).map_err(|err| {
            let reason = match err {
                PipelineError::MalformedInput { reason } => reason,
                other => other.to_string(),
            };
            PipelineError::malformed(format!("{} line {}: {}", path.display(), number + 1, reason))
        })?;
        frames.push(frame);
    }
    Ok(frames)
}

/// Container over a labeled example file
#[derive(Debug)]
pub struct LabeledFrameFile {
    path: PathBuf,
    frames: Option<Vec<FeatureFrame>>,
    index: usize,
}

impl LabeledFrameFile {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            frames: None,
            index: 0,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Move `index` past any pad frames
    fn skip_pads(&mut self) {
        if let Some(frames) = self.frames.as_ref() {
            while frames.get(self.index).is_some_and(FeatureFrame::is_pad) {
                self.index += 1;
            }
        }
    }
}

impl FrameContainer for LabeledFrameFile {
    fn name(&self) -> String {
        self.path.display().to_string()
    }

    fn open(&mut self) -> Result<(), PipelineError> {
        self.frames = Some(read_frames(&self.path)?);
        self.index = 0;
        self.skip_pads();
        Ok(())
    }

    fn has_next(&self) -> bool {
        self.frames
            .as_ref()
            .is_some_and(|frames| self.index < frames.len())
    }

    fn next(&mut self) -> Result<FeatureFrame, PipelineError> {
        let frames = self.frames.as_ref().ok_or(PipelineError::NotOpen)?;
        let frame = frames.get(self.index).cloned().ok_or_else(|| {
            PipelineError::unavailable(self.path.display().to_string(), "no frames left")
        })?;
        self.index += 1;
        self.skip_pads();
        Ok(frame)
    }

    fn close(&mut self) {
        self.frames = None;
        self.index = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_frames() -> Vec<FeatureFrame> {
        vec![
            FeatureFrame::new(vec![0.1, -3.25, 1e-12], vec![1.0]),
            FeatureFrame::new(vec![7.0, 8.5, -0.0], vec![1.0]),
            FeatureFrame::new(vec![1.0 / 3.0, 2.0 / 3.0, 1.0], vec![1.0]),
        ]
    }

    #[test]
    fn test_write_then_read_is_exact() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("song.mfc");
        let frames = sample_frames();

        write_frames(&path, &frames, false).unwrap();
        let read = read_frames(&path).unwrap();

        assert_eq!(read, frames);
    }

    #[test]
    fn test_append_and_truncate() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("song.mfc");
        let frames = sample_frames();

        write_frames(&path, &frames[..1], false).unwrap();
        write_frames(&path, &frames[1..], true).unwrap();
        assert_eq!(read_frames(&path).unwrap(), frames);

        write_frames(&path, &frames[2..], false).unwrap();
        assert_eq!(read_frames(&path).unwrap(), &frames[2..]);
    }

    #[test]
    fn test_container_yields_every_frame() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("song.mfc");
        let frames = sample_frames();
        write_frames(&path, &frames, false).unwrap();

        let mut container = LabeledFrameFile::new(&path);
        container.open().unwrap();
        let mut seen = Vec::new();
        while container.has_next() {
            seen.push(container.next().unwrap());
        }
        container.close();

        assert_eq!(seen, frames);
        assert!(!container.has_next());
    }

    #[test]
    fn test_container_skips_pad_frames() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("padded.mfc");
        let real = sample_frames().remove(1);
        let stored = vec![real.to_pad(), real.clone(), real.to_pad()];
        write_frames(&path, &stored, false).unwrap();
        assert_eq!(read_frames(&path).unwrap(), stored);

        let mut container = LabeledFrameFile::new(&path);
        container.open().unwrap();
        let mut seen = Vec::new();
        while container.has_next() {
            seen.push(container.next().unwrap());
        }
        container.close();

        assert_eq!(seen, vec![real]);
        assert!(seen.iter().all(|frame| !frame.is_pad()));
    }

    #[test]
    fn test_all_pad_file_has_no_frames() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pads.mfc");
        let pad = sample_frames()[0].to_pad();
        write_frames(&path, &[pad.clone(), pad], false).unwrap();

        let mut container = LabeledFrameFile::new(&path);
        container.open().unwrap();
        assert!(!container.has_next());
    }

    #[test]
    fn test_missing_file_is_unavailable() {
        let mut container = LabeledFrameFile::new("/no/such/example.mfc");
        assert!(matches!(
            container.open(),
            Err(PipelineError::DataUnavailable { .. })
        ));
    }

    #[test]
    fn test_bad_line_names_line_number() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.mfc");
        write_frames(&path, &sample_frames()[..1], false).unwrap();
        std::fs::OpenOptions::new()
            .append(true)
            .open(&path)
            .and_then(|mut file| writeln!(file, "not a frame"))
            .unwrap();

        match read_frames(&path) {
            Err(PipelineError::MalformedInput { reason }) => {
                assert!(reason.contains("line 2"), "{}", reason)
            }
            other => panic!("expected malformed input, got {:?}", other),
        }
    }
}
