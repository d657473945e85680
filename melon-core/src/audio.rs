//! # Audio Capture Module
//!
//! This module handles real-time microphone capture using CPAL (Cross-Platform Audio Library)
//! and exposes it as a [`FrameSource`]: one analysed frequency frame per scheduling tick.
//!
//! ## Features
//! - Default input device selection
//! - Preferred sample rate with fallback to the device default
//! - Down-mixing of multi-channel input to mono
//! - Non-blocking hand-off from the audio thread to the session thread

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, Sample, SampleFormat, SupportedStreamConfig, SupportedStreamConfigRange};
use crossbeam_channel::{Receiver, Sender, TryRecvError};
use log::{debug, error, info, warn};
use std::time::{Duration, Instant};

use crate::config::CaptureConfig;
use crate::error::ThumpError;
use crate::fft::{self, SpectrumAnalyser};
use crate::session::{CaptureService, FrameSource};
use crate::{FrequencySpectrum, SpectrumFormat};

/// Number of sample chunks the audio thread may queue before chunks are dropped.
const CHUNK_QUEUE_DEPTH: usize = 256;

/// Capture service backed by the default CPAL host.
pub struct CpalCapture {
    host: cpal::Host,
}

impl Default for CpalCapture {
    fn default() -> Self {
        Self::new()
    }
}

impl CpalCapture {
    pub fn new() -> Self {
        Self { host: cpal::default_host() }
    }
}

impl CaptureService for CpalCapture {
    type Source = MicrophoneSource;

    /// Opens the default input device and starts streaming.
    ///
    /// # Returns
    /// * `Ok(source)` - Streaming source, frames paced by `tick_interval_ms`
    /// * `Err(UnsupportedEnvironment)` - No input device on this host
    /// * `Err(PermissionDenied)` - The device refused to open
    /// * `Err(CaptureFailure)` - Any other stream setup failure
    fn start(&mut self, config: &CaptureConfig) -> Result<MicrophoneSource, ThumpError> {
        config.validate()?;

        let device = self.host.default_input_device().ok_or_else(|| {
            ThumpError::UnsupportedEnvironment("no audio input device available".into())
        })?;
        match device.name() {
            Ok(name) => info!("Using audio input device: {name}"),
            Err(e) => debug!("Input device has no readable name: {e}"),
        }

        let supported = select_config(&device, config.preferred_sample_rate)?;
        let sample_format = supported.sample_format();
        let channels = usize::from(supported.channels());
        let sample_rate = supported.sample_rate().0;
        let stream_config: cpal::StreamConfig = supported.config();
        info!("Selected {sample_rate} Hz, {channels} channel(s), {sample_format:?}");

        let (chunk_tx, chunk_rx) = crossbeam_channel::bounded(CHUNK_QUEUE_DEPTH);
        let stream = match sample_format {
            SampleFormat::F32 => build_stream::<f32>(&device, &stream_config, channels, chunk_tx)?,
            SampleFormat::I16 => build_stream::<i16>(&device, &stream_config, channels, chunk_tx)?,
            SampleFormat::U16 => build_stream::<u16>(&device, &stream_config, channels, chunk_tx)?,
            other => {
                return Err(ThumpError::CaptureFailure(format!(
                    "unsupported sample format {other:?}"
                )));
            }
        };
        stream
            .play()
            .map_err(|e| ThumpError::CaptureFailure(format!("could not start stream: {e}")))?;

        Ok(MicrophoneSource {
            stream: Some(stream),
            chunks: chunk_rx,
            ticker: crossbeam_channel::tick(Duration::from_millis(config.tick_interval_ms)),
            analyser: SpectrumAnalyser::new(config),
            format: SpectrumFormat::new(f64::from(sample_rate), config.fft_size),
        })
    }
}

/// A live microphone stream turned into one frequency frame per tick.
pub struct MicrophoneSource {
    stream: Option<cpal::Stream>,
    chunks: Receiver<Vec<f32>>,
    ticker: Receiver<Instant>,
    analyser: SpectrumAnalyser,
    format: SpectrumFormat,
}

impl FrameSource for MicrophoneSource {
    fn format(&self) -> SpectrumFormat {
        self.format
    }

    fn next_frame(&mut self) -> Option<FrequencySpectrum> {
        self.stream.as_ref()?;
        // Suspends the session thread until the next tick.
        self.ticker.recv().ok()?;

        loop {
            match self.chunks.try_recv() {
                Ok(chunk) => self.analyser.push_samples(&chunk),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    warn!("Audio stream stopped delivering samples");
                    return None;
                }
            }
        }
        Some(self.analyser.frequency_data())
    }

    fn stop(&mut self) {
        if let Some(stream) = self.stream.take() {
            if let Err(e) = stream.pause() {
                warn!("Error pausing stream: {e}");
            }
            drop(stream);
            info!("Microphone released");
        }
    }
}

impl Drop for MicrophoneSource {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Picks an input configuration for the requested sample rate.
///
/// Prefers `f32` configurations whose rate range covers `target_rate`, with
/// the fewest channels; otherwise falls back to the device default.
fn select_config(device: &cpal::Device, target_rate: u32) -> Result<SupportedStreamConfig, ThumpError> {
    let ranges = device
        .supported_input_configs()
        .map_err(|e| ThumpError::CaptureFailure(format!("cannot query input configs: {e}")))?
        .collect::<Vec<_>>();

    if let Some(range) = find_supported_config(ranges, target_rate) {
        return Ok(range.with_sample_rate(cpal::SampleRate(target_rate)));
    }

    debug!("No f32 config at {target_rate} Hz; using device default");
    device
        .default_input_config()
        .map_err(|e| ThumpError::CaptureFailure(format!("no usable input config: {e}")))
}

fn find_supported_config(
    configs: Vec<SupportedStreamConfigRange>,
    target_rate: u32,
) -> Option<SupportedStreamConfigRange> {
    configs
        .into_iter()
        .filter(|c| c.sample_format() == SampleFormat::F32)
        .filter(|c| c.min_sample_rate().0 <= target_rate && target_rate <= c.max_sample_rate().0)
        .min_by_key(|c| c.channels())
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    channels: usize,
    sender: Sender<Vec<f32>>,
) -> Result<cpal::Stream, ThumpError>
where
    T: Sample + cpal::SizedSample,
    f32: FromSample<T>,
{
    let stream = device.build_input_stream(
        config,
        move |data: &[T], _: &cpal::InputCallbackInfo| {
            let samples: Vec<f32> = data.iter().map(|&s| s.to_sample::<f32>()).collect();
            // Never block the audio thread; a full queue drops the chunk.
            let _ = sender.try_send(fft::downmix(&samples, channels));
        },
        |err| error!("An error occurred on the audio stream: {err}"),
        None,
    );

    stream.map_err(|e| match e {
        cpal::BuildStreamError::DeviceNotAvailable => {
            ThumpError::PermissionDenied("input device is not available; check microphone access".into())
        }
        other => ThumpError::CaptureFailure(format!("could not open input stream: {other}")),
    })
}
