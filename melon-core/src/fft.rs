//! # Spectrum Analyser Module
//!
//! Builds the byte-scaled [`FrequencySpectrum`] frames the detector consumes
//! from a rolling window of time-domain samples.
//!
//! ## Pipeline
//! - Blackman window over the latest `fft_size` samples
//! - Forward FFT using RustFFT, magnitudes normalised by `fft_size`
//! - Exponential smoothing against the previous frame
//! - Decibel conversion and linear mapping of `[min_db, max_db]` onto `0..=255`

use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::sync::Arc;

use crate::config::CaptureConfig;
use crate::FrequencySpectrum;

/// Turns a stream of mono samples into frequency frames.
///
/// The smoothing state lives in the analyser, so one analyser should serve
/// exactly one session.
pub struct SpectrumAnalyser {
    fft_size: usize,
    min_decibels: f32,
    max_decibels: f32,
    smoothing: f32,
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    samples: Vec<f32>,
    smoothed: Vec<f32>,
    scratch: Vec<Complex<f32>>,
}

impl std::fmt::Debug for SpectrumAnalyser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpectrumAnalyser")
            .field("fft_size", &self.fft_size)
            .field("min_decibels", &self.min_decibels)
            .field("max_decibels", &self.max_decibels)
            .field("smoothing", &self.smoothing)
            .finish_non_exhaustive()
    }
}

impl SpectrumAnalyser {
    /// Creates an analyser; `config` is expected to have passed
    /// [`CaptureConfig::validate`].
    pub fn new(config: &CaptureConfig) -> Self {
        let fft_size = config.fft_size;
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(fft_size);

        Self {
            fft_size,
            min_decibels: config.min_decibels,
            max_decibels: config.max_decibels,
            smoothing: config.smoothing_time_constant,
            fft,
            window: blackman_window(fft_size),
            // Zero-filled so the first frames behave as if preceded by silence.
            samples: vec![0.0; fft_size],
            smoothed: vec![0.0; fft_size / 2],
            scratch: vec![Complex { re: 0.0, im: 0.0 }; fft_size],
        }
    }

    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    /// Number of bins in every produced frame.
    pub fn frequency_bin_count(&self) -> usize {
        self.fft_size / 2
    }

    /// Appends samples, keeping only the most recent `fft_size`.
    pub fn push_samples(&mut self, samples: &[f32]) {
        if samples.len() >= self.fft_size {
            self.samples.clear();
            self.samples
                .extend_from_slice(&samples[samples.len() - self.fft_size..]);
            return;
        }
        self.samples.extend_from_slice(samples);
        let excess = self.samples.len() - self.fft_size;
        self.samples.drain(..excess);
    }

    /// Computes the current frame and advances the smoothing state.
    pub fn frequency_data(&mut self) -> FrequencySpectrum {
        for ((slot, &sample), &w) in self.scratch.iter_mut().zip(&self.samples).zip(&self.window) {
            *slot = Complex { re: sample * w, im: 0.0 };
        }
        self.fft.process(&mut self.scratch);

        let norm = 1.0 / self.fft_size as f32;
        let tau = self.smoothing;
        let min_db = self.min_decibels;
        let range = self.max_decibels - min_db;

        let bins = self
            .smoothed
            .iter_mut()
            .zip(&self.scratch)
            .map(|(previous, bin)| {
                let magnitude = bin.norm() * norm;
                let value = tau * *previous + (1.0 - tau) * magnitude;
                *previous = if value.is_finite() { value } else { 0.0 };
                let db = 20.0 * previous.log10();
                let scaled = (255.0 / range * (db - min_db)).floor();
                scaled.clamp(0.0, 255.0) as u8
            })
            .collect();

        FrequencySpectrum::new(bins)
    }
}

/// Blackman window coefficients (a0 = 0.42, a1 = 0.5, a2 = 0.08).
fn blackman_window(n: usize) -> Vec<f32> {
    const A0: f32 = 0.42;
    const A1: f32 = 0.5;
    const A2: f32 = 0.08;
    let len = n as f32;
    (0..n)
        .map(|i| {
            let x = 2.0 * std::f32::consts::PI * i as f32 / len;
            A0 - A1 * x.cos() + A2 * (2.0 * x).cos()
        })
        .collect()
}

/// Mixes interleaved multi-channel samples down to mono by averaging.
pub fn downmix(data: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return data.to_vec();
    }
    data.chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
        .collect()
}
