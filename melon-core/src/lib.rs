// melon-core/src/lib.rs

//! The core logic for the watermelon thump analyser.
//! This crate is responsible for turning microphone audio into
//! frequency frames, detecting a tap in the 100-300 Hz band and
//! scoring the fruit's ripeness. It is completely headless
//! and contains no GUI code.

pub mod audio;
pub mod config;
pub mod detector;
pub mod error;
pub mod fft;
pub mod ripeness;
pub mod sensitivity;
pub mod session;

pub use config::{AppConfig, CaptureConfig, SessionConfig};
pub use detector::{DetectionWindow, DetectorState, ThumpDetector};
pub use error::ThumpError;
pub use ripeness::{RipenessResult, Verdict};
pub use sensitivity::ThresholdPair;
pub use session::{
    CaptureService, FrameSource, LogSink, NullSink, SessionOutcome, StopToken, VisualizationSink,
};

/// One frequency-domain frame: per-bin magnitudes mapped to `0..=255`.
///
/// Bin `i` covers the frequency `i * sample_rate / fft_size`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FrequencySpectrum {
    bins: Vec<u8>,
}

impl FrequencySpectrum {
    pub fn new(bins: Vec<u8>) -> Self {
        Self { bins }
    }

    pub fn bins(&self) -> &[u8] {
        &self.bins
    }

    pub fn len(&self) -> usize {
        self.bins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bins.is_empty()
    }
}

impl From<Vec<u8>> for FrequencySpectrum {
    fn from(bins: Vec<u8>) -> Self {
        Self::new(bins)
    }
}

/// The fixed shape of every frame a source produces during one session.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpectrumFormat {
    /// Sample rate of the captured audio in Hz.
    pub sample_rate: f64,
    /// FFT length used to build each frame.
    pub fft_size: usize,
}

impl SpectrumFormat {
    pub fn new(sample_rate: f64, fft_size: usize) -> Self {
        Self { sample_rate, fft_size }
    }

    /// Width of a single spectral bin in Hz.
    pub fn bin_width(&self) -> f64 {
        self.sample_rate / self.fft_size as f64
    }
}

/// Emitted once per session, on the first frame that qualifies as a thump.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectionEvent {
    /// Frequency of the strongest bin inside the target band.
    pub base_frequency_hz: f64,
}
