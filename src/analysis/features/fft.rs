// FFT module - Hamming-windowed magnitude spectrum
//
// Each analysis window of `window_frames` samples is weighted by a Hamming
// window (ETSI ES 201 108), zero-padded to `fft_length` and transformed.
// The magnitude spectrum feeds the mel filterbank.

use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::sync::Arc;

/// Hamming window coefficients for a window of `length` samples
pub fn hamming_window(length: usize) -> Vec<f64> {
    if length == 1 {
        return vec![1.0];
    }
    let denominator = length as f64 - 1.0;
    (0..length)
        .map(|n| 0.54 - 0.46 * (2.0 * std::f64::consts::PI * n as f64 / denominator).cos())
        .collect()
}

/// FFT processor that computes magnitude spectra from analysis windows
pub struct FftProcessor {
    fft: Arc<dyn Fft<f64>>,
    fft_length: usize,
    /// Hamming window (pre-computed)
    window: Vec<f64>,
    buffer: Vec<Complex<f64>>,
}

impl FftProcessor {
    /// Create a new FFT processor
    ///
    /// # Arguments
    /// * `window_frames` - Analysis window length (Hamming window length)
    /// * `fft_length` - Transform length; windows are zero-padded to it
    pub fn new(window_frames: usize, fft_length: usize) -> Self {
        let fft = FftPlanner::new().plan_fft_forward(fft_length);

        Self {
            fft,
            fft_length,
            window: hamming_window(window_frames),
            buffer: Vec::with_capacity(fft_length),
        }
    }

    pub fn fft_length(&self) -> usize {
        self.fft_length
    }

    /// Compute magnitude spectrum using FFT
    ///
    /// Samples beyond the window length (or beyond `fft_length`) are ignored.
    ///
    /// # Returns
    /// Magnitude spectrum for bins `0..=fft_length / 2`
    pub fn compute_magnitude_spectrum(&mut self, samples: &[f64]) -> Vec<f64> {
        self.buffer.clear();
        self.buffer.extend(
            samples
                .iter()
                .zip(&self.window)
                .take(self.fft_length)
                .map(|(&sample, &weight)| Complex::new(sample * weight, 0.0)),
        );
        self.buffer.resize(self.fft_length, Complex::new(0.0, 0.0));

        self.fft.process(&mut self.buffer);

        self.buffer[..self.fft_length / 2 + 1]
            .iter()
            .map(|c| c.norm())
            .collect()
    }
}
