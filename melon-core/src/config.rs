//! # Configuration Module
//!
//! Session and capture parameters with their defaults, plus loading from a
//! JSON file so the values can be tuned without recompiling.

use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::error::ThumpError;

/// Default mass in kilograms when the user has not weighed the fruit.
pub const DEFAULT_MASS_KG: f64 = 4.5;

/// Default sensitivity dial position.
pub const DEFAULT_SENSITIVITY: f64 = 8.0;

/// Values sampled once when a session starts and held fixed until it ends.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Mass of the fruit in kilograms. Must be > 0.
    pub mass_kg: f64,
    /// Sensitivity dial, `1..=20`. Out-of-range values are clamped, not rejected.
    pub sensitivity: f64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            mass_kg: DEFAULT_MASS_KG,
            sensitivity: DEFAULT_SENSITIVITY,
        }
    }
}

impl SessionConfig {
    pub fn new(mass_kg: f64, sensitivity: f64) -> Self {
        Self { mass_kg, sensitivity }
    }

    pub fn validate(&self) -> Result<(), ThumpError> {
        if !(self.mass_kg.is_finite() && self.mass_kg > 0.0) {
            return Err(ThumpError::validation(format!(
                "mass must be greater than 0 kg, got {}",
                self.mass_kg
            )));
        }
        Ok(())
    }
}

/// Parameters of the audio capture and the analyser that builds frames.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// FFT length. Must be a power of two.
    /// 16384 samples at 44.1kHz = ~2.7 Hz per bin
    pub fft_size: usize,
    /// Magnitude mapped to 0 in a frame.
    pub min_decibels: f32,
    /// Magnitude mapped to 255 in a frame.
    pub max_decibels: f32,
    /// Weight of the previous frame when smoothing, `0.0..=1.0`.
    pub smoothing_time_constant: f32,
    /// Interval between frames handed to the detector.
    pub tick_interval_ms: u64,
    /// Sample rate requested from the input device when it supports it.
    pub preferred_sample_rate: u32,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            fft_size: 16384,
            min_decibels: -70.0,
            max_decibels: -10.0,
            smoothing_time_constant: 0.5,
            tick_interval_ms: 16,
            preferred_sample_rate: 44100,
        }
    }
}

impl CaptureConfig {
    pub fn validate(&self) -> Result<(), ThumpError> {
        if self.fft_size < 32 || !self.fft_size.is_power_of_two() {
            return Err(ThumpError::validation(format!(
                "fft_size must be a power of two >= 32, got {}",
                self.fft_size
            )));
        }
        if !(self.min_decibels < self.max_decibels) {
            return Err(ThumpError::validation(format!(
                "min_decibels ({}) must be below max_decibels ({})",
                self.min_decibels, self.max_decibels
            )));
        }
        if !(0.0..=1.0).contains(&self.smoothing_time_constant) {
            return Err(ThumpError::validation(format!(
                "smoothing_time_constant must be within [0, 1], got {}",
                self.smoothing_time_constant
            )));
        }
        if self.tick_interval_ms == 0 {
            return Err(ThumpError::validation("tick_interval_ms must be non-zero"));
        }
        Ok(())
    }
}

/// Complete application configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub session: SessionConfig,
    pub capture: CaptureConfig,
}

impl AppConfig {
    /// Loads a configuration from a JSON file. Missing fields take their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ThumpError> {
        let path = path.as_ref();
        let mut file = File::open(path)
            .map_err(|e| ThumpError::Config(format!("{}: {e}", path.display())))?;
        let mut data = String::new();
        file.read_to_string(&mut data)
            .map_err(|e| ThumpError::Config(format!("{}: {e}", path.display())))?;
        Self::from_json(&data)
    }

    /// Like [`AppConfig::load`], but an absent file yields the defaults.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, ThumpError> {
        let path = path.as_ref();
        if !path.exists() {
            log::info!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        Self::load(path)
    }

    pub fn from_json(data: &str) -> Result<Self, ThumpError> {
        serde_json::from_str(data).map_err(|e| ThumpError::Config(e.to_string()))
    }
}
