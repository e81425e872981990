// Frame readers - PCM sources feeding the windowing stage
//
// The windowing stage only needs sequential access to integer sample frames
// plus a "frames remaining" query. `WavFrameReader` provides that on top of
// hound; `MemoryFrameReader` serves synthetic signals in tests and tools.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::error::PipelineError;

/// Sequential reader of de-interleaved integer PCM frames
pub trait FrameReader: Send {
    /// Sample rate in Hz
    fn sample_rate(&self) -> u32;

    /// Number of interleaved channels per frame
    fn channel_count(&self) -> usize;

    /// Total number of frames in the stream
    fn total_frames(&self) -> u64;

    /// Frames not yet returned by `read_frames`
    fn frames_remaining(&self) -> u64;

    /// Read up to `count` frames into `dest[channel][offset..]`
    ///
    /// Returns the number of frames actually read. Zero is not end-of-stream;
    /// callers consult `frames_remaining()` for that.
    fn read_frames(
        &mut self,
        dest: &mut [Vec<i32>],
        offset: usize,
        count: usize,
    ) -> Result<usize, PipelineError>;
}

/// WAV file reader backed by hound
pub struct WavFrameReader {
    reader: hound::WavReader<BufReader<File>>,
    spec: hound::WavSpec,
    total_frames: u64,
    frames_read: u64,
}

impl WavFrameReader {
    /// Open a WAV file for sequential frame reads
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, PipelineError> {
        let path = path.as_ref();
        let reader = hound::WavReader::open(path).map_err(|err| {
            PipelineError::unavailable(path.display().to_string(), err.to_string())
        })?;
        let spec = reader.spec();
        if spec.channels == 0 {
            return Err(PipelineError::malformed(format!(
                "{} declares zero channels",
                path.display()
            )));
        }
        let total_frames = u64::from(reader.duration());

        Ok(Self {
            reader,
            spec,
            total_frames,
            frames_read: 0,
        })
    }
}

impl FrameReader for WavFrameReader {
    fn sample_rate(&self) -> u32 {
        self.spec.sample_rate
    }

    fn channel_count(&self) -> usize {
        usize::from(self.spec.channels)
    }

    fn total_frames(&self) -> u64 {
        self.total_frames
    }

    fn frames_remaining(&self) -> u64 {
        self.total_frames - self.frames_read
    }

    fn read_frames(
        &mut self,
        dest: &mut [Vec<i32>],
        offset: usize,
        count: usize,
    ) -> Result<usize, PipelineError> {
        let channels = self.channel_count();
        let count = count.min(self.frames_remaining() as usize);
        let mut frames = 0usize;

        match self.spec.sample_format {
            hound::SampleFormat::Int => {
                let mut samples = self.reader.samples::<i32>();
                'frames: while frames < count {
                    for channel in dest.iter_mut().take(channels) {
                        match samples.next() {
                            Some(sample) => channel[offset + frames] = sample?,
                            None => break 'frames,
                        }
                    }
                    frames += 1;
                }
            }
            hound::SampleFormat::Float => {
                // Float PCM is rescaled onto the 16-bit integer range.
                let mut samples = self.reader.samples::<f32>();
                'frames: while frames < count {
                    for channel in dest.iter_mut().take(channels) {
                        match samples.next() {
                            Some(sample) => {
                                channel[offset + frames] = (sample? * i16::MAX as f32) as i32
                            }
                            None => break 'frames,
                        }
                    }
                    frames += 1;
                }
            }
        }

        self.frames_read += frames as u64;
        Ok(frames)
    }
}

/// In-memory frame reader over per-channel sample vectors
///
/// `max_frames_per_read` limits each call, and `stalls` makes the first N
/// calls return zero frames, to exercise the windowing stage's re-read loop.
#[derive(Debug, Clone)]
pub struct MemoryFrameReader {
    channels: Vec<Vec<i32>>,
    sample_rate: u32,
    position: usize,
    max_frames_per_read: usize,
    stalls: usize,
}

impl MemoryFrameReader {
    /// Create a reader over `channels` (all channels must be equally long)
    pub fn new(sample_rate: u32, channels: Vec<Vec<i32>>) -> Self {
        Self {
            channels,
            sample_rate,
            position: 0,
            max_frames_per_read: usize::MAX,
            stalls: 0,
        }
    }

    /// Mono convenience constructor
    pub fn mono(sample_rate: u32, samples: Vec<i32>) -> Self {
        Self::new(sample_rate, vec![samples])
    }

    /// Cap how many frames a single `read_frames` call may return
    pub fn with_max_frames_per_read(mut self, max: usize) -> Self {
        self.max_frames_per_read = max.max(1);
        self
    }

    /// Make the next `stalls` reads return zero frames
    pub fn with_stalls(mut self, stalls: usize) -> Self {
        self.stalls = stalls;
        self
    }

    fn len(&self) -> usize {
        self.channels.first().map(Vec::len).unwrap_or(0)
    }
}

impl FrameReader for MemoryFrameReader {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn channel_count(&self) -> usize {
        self.channels.len()
    }

    fn total_frames(&self) -> u64 {
        self.len() as u64
    }

    fn frames_remaining(&self) -> u64 {
        (self.len() - self.position) as u64
    }

    fn read_frames(
        &mut self,
        dest: &mut [Vec<i32>],
        offset: usize,
        count: usize,
    ) -> Result<usize, PipelineError> {
        if self.stalls > 0 {
            self.stalls -= 1;
            return Ok(0);
        }

        let frames = count
            .min(self.max_frames_per_read)
            .min(self.len() - self.position);
        for (source, target) in self.channels.iter().zip(dest.iter_mut()) {
            target[offset..offset + frames]
                .copy_from_slice(&source[self.position..self.position + frames]);
        }
        self.position += frames;
        Ok(frames)
    }
}
