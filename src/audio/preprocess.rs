// Signal preprocessing - DC offset removal and pre-emphasis
//
// Both filters are the ETSI ES 201 108 front-end filters:
//
//   dcof[n]     = x[n] - x[n-1] + 0.999 * dcof[n-1]
//   filtered[n] = dcof[n] - 0.97 * dcof[n-1]
//
// Audio arrives in chunks, so the last raw sample and the last offset-free
// sample of every channel are carried from one chunk to the next.

use crate::config::FeatureConfig;

/// Per-channel stateful DC-offset + pre-emphasis filter
#[derive(Debug, Clone)]
pub struct SignalPreprocessor {
    dc_offset_coefficient: f64,
    pre_emphasis_coefficient: f64,
    prev_raw: Vec<f64>,
    prev_offset_free: Vec<f64>,
}

impl SignalPreprocessor {
    /// Create a preprocessor for `channels` channels with explicit coefficients
    pub fn new(channels: usize, dc_offset_coefficient: f64, pre_emphasis_coefficient: f64) -> Self {
        Self {
            dc_offset_coefficient,
            pre_emphasis_coefficient,
            prev_raw: vec![0.0; channels],
            prev_offset_free: vec![0.0; channels],
        }
    }

    /// Create a preprocessor using the configured coefficients
    pub fn from_config(channels: usize, config: &FeatureConfig) -> Self {
        Self::new(
            channels,
            config.dc_offset_coefficient,
            config.pre_emphasis_coefficient,
        )
    }

    /// Filter a single sample of `channel`, updating that channel's state
    pub fn process_sample(&mut self, channel: usize, raw: f64) -> f64 {
        // Both state values are captured before either is updated; the
        // pre-emphasis stage sees the previous offset-free sample.
        let prev_raw = self.prev_raw[channel];
        let prev_offset_free = self.prev_offset_free[channel];

        let offset_free = raw - prev_raw + self.dc_offset_coefficient * prev_offset_free;

        self.prev_raw[channel] = raw;
        self.prev_offset_free[channel] = offset_free;

        offset_free - self.pre_emphasis_coefficient * prev_offset_free
    }

    /// Filter `raw` into `out` for one channel (slices must be equally long)
    pub fn process(&mut self, channel: usize, raw: &[i32], out: &mut [f64]) {
        for (target, &sample) in out.iter_mut().zip(raw) {
            *target = self.process_sample(channel, f64::from(sample));
        }
    }

    /// Filter every channel of a freshly read chunk from `from` to the end
    pub fn process_chunk(&mut self, raw: &[Vec<i32>], out: &mut [Vec<f64>], from: usize) {
        for (channel, (raw, out)) in raw.iter().zip(out.iter_mut()).enumerate() {
            self.process(channel, &raw[from..], &mut out[from..]);
        }
    }

    /// Number of channels this preprocessor tracks
    pub fn channels(&self) -> usize {
        self.prev_raw.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_zero_signal_stays_zero() {
        let mut pre = SignalPreprocessor::new(2, 0.999, 0.97);
        let raw = vec![vec![0; 64]; 2];
        let mut out = vec![vec![1.0; 64]; 2];

        pre.process_chunk(&raw, &mut out, 0);

        assert!(out.iter().flatten().all(|&v| v == 0.0));
    }

    #[test]
    fn test_first_samples_match_hand_computation() {
        let mut pre = SignalPreprocessor::new(1, 0.999, 0.97);

        // n = 0: dcof = 10, filtered = 10 - 0.97 * 0
        assert_eq!(pre.process_sample(0, 10.0), 10.0);
        // n = 1: dcof = 10 - 10 + 0.999 * 10 = 9.99, filtered = 9.99 - 9.7
        let second = pre.process_sample(0, 10.0);
        assert!((second - (9.99 - 9.7)).abs() < 1e-12);
    }

    #[test]
    fn test_constant_offset_decays() {
        let mut pre = SignalPreprocessor::new(1, 0.999, 0.97);
        let raw = vec![1000; 20_000];
        let mut out = vec![0.0; raw.len()];

        pre.process(0, &raw, &mut out);

        let tail = out[out.len() - 1].abs();
        assert!(tail < 1.0, "DC should be removed, tail sample was {}", tail);
    }

    #[test]
    fn test_state_carries_across_chunks() {
        let signal: Vec<i32> = (0..100).map(|i| ((i * 37) % 23) - 11).collect();

        let mut whole = SignalPreprocessor::new(1, 0.999, 0.97);
        let mut expected = vec![0.0; signal.len()];
        whole.process(0, &signal, &mut expected);

        let mut split = SignalPreprocessor::new(1, 0.999, 0.97);
        let mut actual = vec![0.0; signal.len()];
        let (first, second) = actual.split_at_mut(37);
        split.process(0, &signal[..37], first);
        split.process(0, &signal[37..], second);

        assert_eq!(expected, actual);
    }

    #[test]
    fn test_process_chunk_leaves_spanned_region_untouched() {
        let mut pre = SignalPreprocessor::new(1, 0.999, 0.97);
        let raw = vec![vec![5; 8]];
        let mut out = vec![vec![42.0; 8]];

        pre.process_chunk(&raw, &mut out, 3);

        assert_eq!(&out[0][..3], &[42.0, 42.0, 42.0]);
        assert_eq!(out[0][3], 5.0);
    }
}
