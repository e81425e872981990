// Mel cepstrum module - mel filterbank, log compression and DCT
//
// Filterbank layout follows ETSI ES 201 108: channel boundaries `cbins`
// are spaced uniformly on the mel scale from 64 Hz up to Nyquist, and each
// filter is a pair of linear ramps rising over [cbins[k-1], cbins[k]] and
// falling over (cbins[k], cbins[k+1]]. The top filter has no upper
// boundary, so it only has its rising ramp.
//
// The cepstrum uses the DCT-II basis over the actual channel count, so its
// coefficients differ from features built with a fixed 23-channel basis.

use crate::config::FeatureConfig;

/// Floor applied to every natural logarithm in the front end
pub const LOG_FLOOR: f64 = -50.0;

/// Hz to mel
pub fn mel(frequency: f64) -> f64 {
    2595.0 * (1.0 + frequency / 700.0).log10()
}

/// Mel to Hz
pub fn mel_inverse(mel: f64) -> f64 {
    700.0 * (10f64.powf(mel / 2595.0) - 1.0)
}

/// `ln(x)` floored at -50 (so zero maps to -50, not -inf)
pub fn limited_ln(x: f64) -> f64 {
    x.ln().max(LOG_FLOOR)
}

/// Logarithmic frame energy of one window
///
/// Sums `sample[i] * i^2` over the window (i relative to the window start).
/// Returns 0 when the sum is not positive, otherwise the floored logarithm.
pub fn log_energy(window: &[f64]) -> f64 {
    let sum: f64 = window
        .iter()
        .enumerate()
        .map(|(i, &sample)| sample * (i * i) as f64)
        .sum();

    if sum <= 0.0 || sum.is_nan() {
        0.0
    } else {
        limited_ln(sum)
    }
}

/// Mel-frequency cepstral coefficient extractor for one window geometry
#[derive(Debug, Clone)]
pub struct MelCepstrumExtractor {
    cbins: Vec<usize>,
    num_coefficients: usize,
    offset_coefficient: usize,
}

impl MelCepstrumExtractor {
    /// Build the filterbank boundaries for `sample_rate` and `fft_length`
    pub fn new(sample_rate: u32, fft_length: usize, config: &FeatureConfig) -> Self {
        Self {
            cbins: center_bins(
                f64::from(sample_rate),
                fft_length,
                config.mel_start_hz,
                config.num_mel_channels,
            ),
            num_coefficients: config.num_coefficients,
            offset_coefficient: config.offset_coefficient,
        }
    }

    /// Filterbank boundary bins (`num_mel_channels + 1` entries)
    pub fn center_bins(&self) -> &[usize] {
        &self.cbins
    }

    pub fn num_channels(&self) -> usize {
        self.cbins.len().saturating_sub(1)
    }

    /// Log mel filterbank outputs for a magnitude spectrum
    pub fn log_filterbank(&self, spectrum: &[f64]) -> Vec<f64> {
        let bin = |i: usize| spectrum.get(i).copied().unwrap_or(0.0);
        let channels = self.num_channels();

        (1..=channels)
            .map(|k| {
                let low = self.cbins[k - 1];
                let center = self.cbins[k];
                let mut sum = 0.0;

                let rise = (center - low + 1) as f64;
                for i in low..=center {
                    sum += (i - low + 1) as f64 / rise * bin(i);
                }

                if let Some(&high) = self.cbins.get(k + 1) {
                    let fall = (high - center + 1) as f64;
                    for i in center + 1..=high {
                        sum += (1.0 - (i - center) as f64 / fall) * bin(i);
                    }
                }

                limited_ln(sum)
            })
            .collect()
    }

    /// Cepstral coefficients `offset..offset + num_coefficients` of a
    /// magnitude spectrum
    pub fn cepstrum(&self, spectrum: &[f64]) -> Vec<f64> {
        let log_mel = self.log_filterbank(spectrum);
        let channels = log_mel.len() as f64;

        (self.offset_coefficient..self.offset_coefficient + self.num_coefficients)
            .map(|i| {
                log_mel
                    .iter()
                    .enumerate()
                    .map(|(j, &value)| {
                        value * (std::f64::consts::PI * i as f64 * (j as f64 + 0.5) / channels).cos()
                    })
                    .sum()
            })
            .collect()
    }
}

/// Mel-spaced filterbank boundaries between `start_hz` and Nyquist
fn center_bins(sample_rate: f64, fft_length: usize, start_hz: f64, channels: usize) -> Vec<usize> {
    let mel_start = mel(start_hz);
    let mel_nyquist = mel(sample_rate / 2.0);
    let step = (mel_nyquist - mel_start) / channels as f64;
    let to_bin = |hz: f64| (hz / sample_rate * fft_length as f64).round().max(0.0) as usize;

    let mut cbins: Vec<usize> = (0..=channels)
        .map(|i| {
            if i == 0 {
                to_bin(start_hz)
            } else if i == channels {
                fft_length / 2
            } else {
                to_bin(mel_inverse(mel_start + step * i as f64))
            }
        })
        .collect();

    // Rounding keeps the boundaries ordered, but guard the ramps anyway.
    for i in 1..cbins.len() {
        cbins[i] = cbins[i].max(cbins[i - 1]);
    }
    cbins
}
