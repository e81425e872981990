// Windowed signal source - overlapping analysis windows over a frame reader
//
// Frames are read in chunks of `window * shift` frames so that chunk
// boundaries line up with both the window and the shift stride. When a chunk
// runs out, the frames still needed by the next window are moved to the
// front of the buffer and the remainder is refilled from the reader. Each
// freshly read region is passed through the `SignalPreprocessor` exactly
// once.
//
// Window starts within a chunk are bounded by `limit`. For a full chunk that
// is every start whose window fits in the buffer. For the last chunk it is
// every start whose window still reaches past the previous window's end into
// real data, so the tail of a file is covered by exactly one zero-padded
// window.

use serde::{Deserialize, Serialize};

use crate::audio::preprocess::SignalPreprocessor;
use crate::audio::reader::FrameReader;
use crate::config::FeatureConfig;
use crate::error::PipelineError;

/// Zero-frame reads tolerated in a row before the reader is declared stalled
const MAX_STALLED_READS: usize = 16;

/// Window geometry for one supported sample rate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowSpec {
    pub sample_rate: u32,
    pub window_frames: usize,
    pub shift_frames: usize,
    pub fft_length: usize,
}

/// Lookup table from sample rate to window geometry
///
/// Defaults follow ETSI ES 201 108 V1.1.3. Rates missing from the table are
/// rejected with [`PipelineError::UnsupportedSampleRate`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowConfig {
    pub entries: Vec<WindowSpec>,
}

impl Default for WindowConfig {
    fn default() -> Self {
        let entry = |sample_rate, window_frames, shift_frames, fft_length| WindowSpec {
            sample_rate,
            window_frames,
            shift_frames,
            fft_length,
        };
        Self {
            entries: vec![
                entry(8_000, 200, 80, 256),
                entry(11_000, 256, 110, 256),
                entry(16_000, 400, 160, 512),
                entry(44_100, 1323, 441, 2048),
            ],
        }
    }
}

impl WindowConfig {
    /// Resolve the window geometry for `sample_rate`
    pub fn lookup(&self, sample_rate: u32) -> Result<WindowSpec, PipelineError> {
        self.entries
            .iter()
            .find(|entry| entry.sample_rate == sample_rate)
            .copied()
            .ok_or(PipelineError::UnsupportedSampleRate { sample_rate })
    }

    /// Window length in frames for `sample_rate`
    pub fn window_size(&self, sample_rate: u32) -> Result<usize, PipelineError> {
        self.lookup(sample_rate).map(|spec| spec.window_frames)
    }

    /// Shift (hop) length in frames for `sample_rate`
    pub fn shift_size(&self, sample_rate: u32) -> Result<usize, PipelineError> {
        self.lookup(sample_rate).map(|spec| spec.shift_frames)
    }

    /// FFT length for `sample_rate`
    pub fn fft_length(&self, sample_rate: u32) -> Result<usize, PipelineError> {
        self.lookup(sample_rate).map(|spec| spec.fft_length)
    }
}

/// Produces overlapping, preprocessed windows from a [`FrameReader`]
pub struct WindowedSignalSource<R: FrameReader> {
    reader: R,
    spec: WindowSpec,
    buffer_frames: usize,
    raw: Vec<Vec<i32>>,
    samples: Vec<Vec<f64>>,
    preprocessor: SignalPreprocessor,
    offset: usize,
    limit: usize,
    chunks_read: usize,
    total_read: u64,
    final_chunk: bool,
}

impl<R: FrameReader> WindowedSignalSource<R> {
    /// Resolve the window geometry for the reader's sample rate and allocate
    /// the chunk buffers
    ///
    /// # Errors
    /// `UnsupportedSampleRate` if the rate is not in `windows`, and
    /// `MalformedInput` if the reader reports no channels.
    pub fn open(
        reader: R,
        windows: &WindowConfig,
        features: &FeatureConfig,
    ) -> Result<Self, PipelineError> {
        let spec = windows.lookup(reader.sample_rate())?;
        let channels = reader.channel_count();
        if channels == 0 {
            return Err(PipelineError::malformed("frame source has no channels"));
        }
        if spec.window_frames == 0 || spec.shift_frames == 0 {
            return Err(PipelineError::malformed(format!(
                "window table entry for {} Hz has a zero window or shift",
                spec.sample_rate
            )));
        }

        let buffer_frames = spec.window_frames * spec.shift_frames;
        tracing::debug!(
            "[Pipeline] Opened {} Hz source: {} channels, {} frames, window={} shift={} buffer={}",
            spec.sample_rate,
            channels,
            reader.total_frames(),
            spec.window_frames,
            spec.shift_frames,
            buffer_frames
        );

        Ok(Self {
            spec,
            buffer_frames,
            raw: vec![vec![0; buffer_frames]; channels],
            samples: vec![vec![0.0; buffer_frames]; channels],
            preprocessor: SignalPreprocessor::from_config(channels, features),
            offset: 0,
            limit: 0,
            chunks_read: 0,
            total_read: 0,
            final_chunk: false,
            reader,
        })
    }

    /// Window length in frames
    pub fn window_size(&self) -> usize {
        self.spec.window_frames
    }

    /// Shift between consecutive windows in frames
    pub fn shift_size(&self) -> usize {
        self.spec.shift_frames
    }

    /// Resolved window geometry
    pub fn spec(&self) -> WindowSpec {
        self.spec
    }

    /// Sample rate of the underlying reader
    pub fn sample_rate(&self) -> u32 {
        self.spec.sample_rate
    }

    /// Channel count of the underlying reader
    pub fn channel_count(&self) -> usize {
        self.samples.len()
    }

    /// Whether another window can be produced
    ///
    /// False once the current chunk has no window start left and either the
    /// whole stream has been read or fewer than one shift of frames remain.
    pub fn has_next_window(&self) -> bool {
        if self.chunks_read == 0 || self.offset < self.limit {
            return true;
        }
        if self.final_chunk {
            return false;
        }
        let read_whole_stream = self.total_read >= self.reader.total_frames();
        let no_shift_left = self.reader.frames_remaining() < self.spec.shift_frames as u64;
        !(read_whole_stream || no_shift_left)
    }

    /// Return the next window (one slice per channel) and advance by one shift
    pub fn next_window(&mut self) -> Result<Vec<&[f64]>, PipelineError> {
        if self.chunks_read == 0 || self.offset >= self.limit {
            if !self.has_next_window() {
                return Err(PipelineError::unavailable(
                    "windowed source",
                    "no windows left in stream",
                ));
            }
            self.next_chunk()?;
        }

        let start = self.offset;
        let end = start + self.spec.window_frames;
        self.offset += self.spec.shift_frames;
        Ok(self
            .samples
            .iter()
            .map(|channel| &channel[start..end])
            .collect())
    }

    /// Refill the buffer, keeping frames that belong to the next window
    fn next_chunk(&mut self) -> Result<(), PipelineError> {
        let spanned = if self.chunks_read == 0 {
            0
        } else {
            self.buffer_frames - self.offset.min(self.buffer_frames)
        };
        if spanned > 0 {
            let keep_from = self.buffer_frames - spanned;
            for channel in &mut self.samples {
                channel.copy_within(keep_from.., 0);
            }
        }

        let read = self.fill_from_reader(spanned, self.buffer_frames - spanned)?;
        let valid_end = spanned + read;
        for channel in &mut self.raw {
            channel[valid_end..].fill(0);
        }
        self.preprocessor
            .process_chunk(&self.raw, &mut self.samples, spanned);

        let window = self.spec.window_frames;
        let shift = self.spec.shift_frames;
        let full_limit = self.buffer_frames - window + 1;
        self.final_chunk = self.reader.frames_remaining() == 0
            || self.total_read >= self.reader.total_frames();
        self.limit = if self.final_chunk {
            let tail_limit = (valid_end + shift).saturating_sub(window);
            let tail_limit = if self.chunks_read == 0 {
                tail_limit.max(1)
            } else {
                tail_limit
            };
            tail_limit.min(full_limit)
        } else {
            full_limit
        };

        tracing::trace!(
            "[Pipeline] Chunk {}: spanned={} read={} limit={} final={}",
            self.chunks_read,
            spanned,
            read,
            self.limit,
            self.final_chunk
        );

        self.offset = 0;
        self.chunks_read += 1;
        Ok(())
    }

    /// Read up to `wanted` frames into the raw buffer at `offset`
    ///
    /// Zero-frame reads are retried while the reader still reports frames
    /// remaining.
    fn fill_from_reader(&mut self, offset: usize, wanted: usize) -> Result<usize, PipelineError> {
        let mut read = 0usize;
        let mut stalls = 0usize;

        while read < wanted {
            let remaining = self.reader.frames_remaining();
            if remaining == 0 {
                break;
            }
            let frames = self
                .reader
                .read_frames(&mut self.raw, offset + read, wanted - read)?;
            if frames == 0 {
                stalls += 1;
                if stalls >= MAX_STALLED_READS {
                    return Err(PipelineError::ReaderStalled { remaining });
                }
                continue;
            }
            stalls = 0;
            read += frames;
        }

        self.total_read += read as u64;
        Ok(read)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::reader::MemoryFrameReader;

    fn open_mono(sample_rate: u32, samples: Vec<i32>) -> WindowedSignalSource<MemoryFrameReader> {
        WindowedSignalSource::open(
            MemoryFrameReader::mono(sample_rate, samples),
            &WindowConfig::default(),
            &FeatureConfig::default(),
        )
        .unwrap()
    }

    fn count_windows<R: FrameReader>(source: &mut WindowedSignalSource<R>) -> usize {
        let mut count = 0;
        while source.has_next_window() {
            source.next_window().unwrap();
            count += 1;
        }
        count
    }

    /// Expected number of windows for `n` frames
    fn expected_windows(n: usize, window: usize, shift: usize) -> usize {
        if n <= window {
            1
        } else {
            1 + (n - window).div_ceil(shift)
        }
    }

    #[test]
    fn test_window_table_values() {
        let config = WindowConfig::default();
        for (rate, window, shift, fft) in [
            (8_000, 200, 80, 256),
            (11_000, 256, 110, 256),
            (16_000, 400, 160, 512),
            (44_100, 1323, 441, 2048),
        ] {
            assert_eq!(config.window_size(rate).unwrap(), window);
            assert_eq!(config.shift_size(rate).unwrap(), shift);
            assert_eq!(config.fft_length(rate).unwrap(), fft);

            let source = open_mono(rate, vec![0; 10]);
            assert_eq!(source.window_size(), window);
            assert_eq!(source.shift_size(), shift);
        }
    }

    #[test]
    fn test_unsupported_sample_rate_is_rejected() {
        for rate in [0, 22_050, 48_000, 16_001] {
            let result = WindowedSignalSource::open(
                MemoryFrameReader::mono(rate, vec![0; 10]),
                &WindowConfig::default(),
                &FeatureConfig::default(),
            );
            assert_eq!(
                result.err(),
                Some(PipelineError::UnsupportedSampleRate { sample_rate: rate })
            );
        }
    }

    #[test]
    fn test_short_file_yields_one_padded_window() {
        let mut source = open_mono(8_000, vec![100; 50]);

        assert!(source.has_next_window());
        let window = source.next_window().unwrap();
        assert_eq!(window.len(), 1);
        assert_eq!(window[0].len(), 200);
        assert!(!source.has_next_window());
    }

    #[test]
    fn test_empty_file_yields_one_window() {
        let mut source = open_mono(8_000, Vec::new());
        assert_eq!(count_windows(&mut source), 1);
    }

    #[test]
    fn test_window_count_within_one_chunk() {
        for n in [200, 201, 280, 281, 1000, 15_000] {
            let mut source = open_mono(8_000, vec![1; n]);
            assert_eq!(
                count_windows(&mut source),
                expected_windows(n, 200, 80),
                "frames = {}",
                n
            );
        }
    }

    #[test]
    fn test_window_count_across_chunks() {
        // 8 kHz chunks hold 16000 frames
        for n in [16_000, 16_040, 20_000, 32_123, 48_000] {
            let mut source = open_mono(8_000, vec![1; n]);
            let count = count_windows(&mut source);
            let expected = expected_windows(n, 200, 80);
            // When the stream ends exactly on a chunk boundary, fewer than one
            // shift of trailing frames is dropped.
            assert!(
                count == expected || count + 1 == expected,
                "frames = {}: got {}, expected {}",
                n,
                count,
                expected
            );
        }
        let mut source = open_mono(8_000, vec![1; 20_000]);
        assert_eq!(count_windows(&mut source), 249);
    }

    #[test]
    fn test_windows_continue_signal_across_chunk_boundary() {
        // Ramp input: the preprocessed signal of a ramp is deterministic, so
        // compare windowed output against a single-pass filter of the stream.
        let n = 40_000;
        let signal: Vec<i32> = (0..n as i32).map(|i| (i % 97) - 48).collect();
        let mut filter = SignalPreprocessor::new(1, 0.999, 0.97);
        let mut filtered = vec![0.0; n];
        filter.process(0, &signal, &mut filtered);

        let mut source = open_mono(8_000, signal);
        let mut start = 0usize;
        while source.has_next_window() {
            let window = source.next_window().unwrap();
            let end = (start + 200).min(n);
            assert_eq!(&window[0][..end - start], &filtered[start..end], "window at {}", start);
            start += 80;
        }
        assert!(start >= n - 200);
    }

    #[test]
    fn test_partial_reads_and_stalls_are_retried() {
        let reader = MemoryFrameReader::mono(8_000, vec![7; 20_000])
            .with_max_frames_per_read(333)
            .with_stalls(3);
        let mut source =
            WindowedSignalSource::open(reader, &WindowConfig::default(), &FeatureConfig::default())
                .unwrap();
        assert_eq!(count_windows(&mut source), 249);
    }

    #[test]
    fn test_persistent_stall_is_an_error() {
        let reader = MemoryFrameReader::mono(8_000, vec![7; 100]).with_stalls(1_000);
        let mut source =
            WindowedSignalSource::open(reader, &WindowConfig::default(), &FeatureConfig::default())
                .unwrap();
        assert!(matches!(
            source.next_window(),
            Err(PipelineError::ReaderStalled { remaining: 100 })
        ));
    }

    #[test]
    fn test_multichannel_windows() {
        let reader = MemoryFrameReader::new(16_000, vec![vec![1; 1000], vec![-1; 1000]]);
        let mut source =
            WindowedSignalSource::open(reader, &WindowConfig::default(), &FeatureConfig::default())
                .unwrap();
        let window = source.next_window().unwrap();
        assert_eq!(window.len(), 2);
        assert_eq!(window[0][0], 1.0);
        assert_eq!(window[1][0], -1.0);
    }
}
