//! # Thump Detection Module
//!
//! Decides, frame by frame, whether the microphone has just heard a tap on
//! the fruit. Analysis is restricted to a 100-300 Hz band; a frame is a
//! thump when the band peak is both loud in absolute terms and stands well
//! clear of the band's average level.
//!
//! ## Lifecycle
//! `Idle -> Listening -> Detected -> Idle`. Everything derived for a session
//! (bin window, thresholds, mass) is computed once in [`ThumpDetector::start`]
//! and never changes until the session ends.

use log::{debug, info, trace};

use crate::config::SessionConfig;
use crate::error::ThumpError;
use crate::ripeness::{self, RipenessResult};
use crate::sensitivity::{self, ThresholdPair};
use crate::{DetectionEvent, FrequencySpectrum, SpectrumFormat};

/// Lower edge of the band a watermelon thump is expected in.
pub const TARGET_BAND_LOW_HZ: f64 = 100.0;

/// Upper edge of the band a watermelon thump is expected in.
pub const TARGET_BAND_HIGH_HZ: f64 = 300.0;

/// Half-open range of bins `[min_index, max_index)` examined each frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DetectionWindow {
    pub min_index: usize,
    pub max_index: usize,
}

impl DetectionWindow {
    /// Maps a frequency band onto bin indices by rounding to the nearest bin.
    pub fn for_band(format: SpectrumFormat, low_hz: f64, high_hz: f64) -> Self {
        let bin_width = format.bin_width();
        Self {
            min_index: hz_to_bin(low_hz, bin_width),
            max_index: hz_to_bin(high_hz, bin_width),
        }
    }

    /// The 100-300 Hz window for the given frame format.
    pub fn target(format: SpectrumFormat) -> Self {
        Self::for_band(format, TARGET_BAND_LOW_HZ, TARGET_BAND_HIGH_HZ)
    }

    /// True when the band collapses to no bins; such a session never detects.
    pub fn is_degenerate(&self) -> bool {
        self.min_index >= self.max_index
    }
}

fn hz_to_bin(hz: f64, bin_width: f64) -> usize {
    let bin = (hz / bin_width).round();
    // `as` saturates: NaN -> 0, +inf -> usize::MAX, which keeps the window guard meaningful.
    if bin.is_sign_negative() { 0 } else { bin as usize }
}

/// Peak and mean level of a frame inside the detection window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BandStats {
    pub peak_amplitude: f64,
    pub peak_index: usize,
    pub average_amplitude: f64,
}

impl BandStats {
    /// Measures `frame` over `window`. Bins past the end of the frame are ignored.
    ///
    /// # Returns
    /// * `Some(stats)` - At least one bin of the window exists in the frame
    /// * `None` - Degenerate window or a frame too short to reach it
    pub fn measure(frame: &FrequencySpectrum, window: DetectionWindow) -> Option<Self> {
        if window.is_degenerate() {
            return None;
        }
        let bins = frame.bins();
        let end = window.max_index.min(bins.len());
        if window.min_index >= end {
            return None;
        }
        let band = &bins[window.min_index..end];

        let mut peak_amplitude = 0u8;
        let mut peak_offset = 0usize;
        let mut sum = 0u64;
        for (offset, &magnitude) in band.iter().enumerate() {
            // Strict comparison so ties keep the lowest bin.
            if offset == 0 || magnitude > peak_amplitude {
                peak_amplitude = magnitude;
                peak_offset = offset;
            }
            sum += u64::from(magnitude);
        }

        Some(Self {
            peak_amplitude: f64::from(peak_amplitude),
            peak_index: window.min_index + peak_offset,
            average_amplitude: sum as f64 / band.len() as f64,
        })
    }

    /// Both conditions must hold: loud enough, and prominent over the band floor.
    pub fn is_thump(&self, thresholds: &ThresholdPair) -> bool {
        self.peak_amplitude > thresholds.absolute_threshold
            && self.peak_amplitude > self.average_amplitude + thresholds.relative_threshold
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectorState {
    Idle,
    Listening,
    Detected,
}

/// Everything one session owns. Immutable once started.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Session {
    pub config: SessionConfig,
    pub format: SpectrumFormat,
    pub window: DetectionWindow,
    pub thresholds: ThresholdPair,
    event: Option<DetectionEvent>,
}

impl Session {
    pub fn event(&self) -> Option<DetectionEvent> {
        self.event
    }
}

/// The tap detector. Holds at most one session at a time.
#[derive(Debug)]
pub struct ThumpDetector {
    state: DetectorState,
    session: Option<Session>,
    last_result: Option<RipenessResult>,
}

impl Default for ThumpDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl ThumpDetector {
    pub fn new() -> Self {
        Self {
            state: DetectorState::Idle,
            session: None,
            last_result: None,
        }
    }

    pub fn state(&self) -> DetectorState {
        self.state
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    /// Result of the most recently completed session, cleared by the next `start`.
    pub fn last_result(&self) -> Option<&RipenessResult> {
        self.last_result.as_ref()
    }

    /// Begins listening for a thump.
    ///
    /// An active session is stopped first; sessions never overlap. On a
    /// validation failure the detector stays Idle and the previous result
    /// is kept.
    ///
    /// # Arguments
    /// * `config` - Mass and sensitivity, sampled now and fixed for the session
    /// * `format` - Sample rate and FFT size of the frames that will follow
    pub fn start(&mut self, config: SessionConfig, format: SpectrumFormat) -> Result<(), ThumpError> {
        if self.state != DetectorState::Idle {
            debug!("Starting a new session while {:?}; stopping the old one", self.state);
            self.stop();
        }
        config.validate()?;

        let window = DetectionWindow::target(format);
        let thresholds = sensitivity::thresholds(config.sensitivity);

        self.last_result = None;
        self.session = Some(Session {
            config,
            format,
            window,
            thresholds,
            event: None,
        });
        self.state = DetectorState::Listening;

        info!(
            "Session started: mass={} kg, sensitivity={}, {} Hz / {} point FFT",
            config.mass_kg, config.sensitivity, format.sample_rate, format.fft_size
        );
        debug!(
            "Detection window bins [{}, {}), thresholds abs={} rel={}",
            window.min_index, window.max_index, thresholds.absolute_threshold, thresholds.relative_threshold
        );
        if window.is_degenerate() {
            debug!("Detection window is empty for this format; no thump can be detected");
        }
        Ok(())
    }

    /// Examines one frame.
    ///
    /// # Returns
    /// * `Some(event)` - The frame is a thump; the detector is now `Detected`
    /// * `None` - No thump yet, or the detector is not listening
    pub fn evaluate(&mut self, frame: &FrequencySpectrum) -> Option<DetectionEvent> {
        if self.state != DetectorState::Listening {
            return None;
        }
        let session = self.session.as_mut()?;

        let stats = BandStats::measure(frame, session.window)?;
        trace!(
            "band peak={} at bin {} avg={:.2}",
            stats.peak_amplitude, stats.peak_index, stats.average_amplitude
        );
        if !stats.is_thump(&session.thresholds) {
            return None;
        }

        let event = DetectionEvent {
            base_frequency_hz: stats.peak_index as f64 * session.format.bin_width(),
        };
        session.event = Some(event);
        self.state = DetectorState::Detected;
        info!(
            "Thump detected at {:.1} Hz (peak {} over avg {:.1})",
            event.base_frequency_hz, stats.peak_amplitude, stats.average_amplitude
        );
        Some(event)
    }

    /// Scores the detected thump and ends the session.
    ///
    /// # Returns
    /// * `Ok(result)` - The detector is back to `Idle` and keeps the result
    /// * `Err(ThumpError::Validation)` - Called when no thump has been detected
    pub fn conclude(&mut self) -> Result<RipenessResult, ThumpError> {
        let event = match (self.state, self.session.and_then(|s| s.event)) {
            (DetectorState::Detected, Some(event)) => event,
            (state, _) => {
                return Err(ThumpError::validation(format!(
                    "no detected thump to score (detector is {state:?})"
                )));
            }
        };
        let mass_kg = self.session.map_or(0.0, |s| s.config.mass_kg);

        let result = ripeness::compute(event.base_frequency_hz, mass_kg);
        self.session = None;
        self.state = DetectorState::Idle;

        let result = result?;
        info!(
            "Session complete: {} (index {:.0}, score {:.1}, {:.1} °Brix)",
            result.verdict, result.ripeness_index, result.ripeness_score, result.sweetness_brix
        );
        self.last_result = Some(result);
        Ok(result)
    }

    /// Abandons the current session. Valid from any state; a no-op when Idle.
    pub fn stop(&mut self) {
        if self.state == DetectorState::Idle {
            return;
        }
        info!("Session stopped while {:?}", self.state);
        self.session = None;
        self.state = DetectorState::Idle;
    }
}
