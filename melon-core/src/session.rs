//! # Session Driver Module
//!
//! Glues a frame source, the detector and a visualisation sink into one
//! listening session.
//!
//! ## Scheduling
//! The driver is single-threaded. Each loop iteration is one scheduling
//! tick: the source blocks until its next frame is due, so the driver is
//! suspended between frames instead of polling. A [`StopToken`] can end the
//! session from anywhere, including from inside a sink callback; it is
//! checked right before every evaluation.

use log::{info, warn};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::config::{CaptureConfig, SessionConfig};
use crate::detector::{BandStats, DetectionWindow, ThumpDetector};
use crate::error::ThumpError;
use crate::ripeness::RipenessResult;
use crate::{FrequencySpectrum, SpectrumFormat};

/// Supplies one frequency frame per scheduling tick for one session.
pub trait FrameSource {
    /// Shape of every frame this source produces.
    fn format(&self) -> SpectrumFormat;

    /// Blocks until the next tick and returns its frame.
    ///
    /// `None` means the source has ended and no more frames will come.
    fn next_frame(&mut self) -> Option<FrequencySpectrum>;

    /// Releases whatever the source holds. Must be idempotent.
    fn stop(&mut self) {}
}

/// Receives every frame the detector sees, for drawing.
///
/// Fire-and-forget: a sink cannot influence detection, and a panicking sink
/// is caught and logged.
pub trait VisualizationSink {
    fn render(&mut self, frame: &FrequencySpectrum, window: DetectionWindow);
}

/// Starts audio capture and hands back a per-session frame source.
pub trait CaptureService {
    type Source: FrameSource;

    fn start(&mut self, config: &CaptureConfig) -> Result<Self::Source, ThumpError>;
}

/// A sink that draws nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl VisualizationSink for NullSink {
    fn render(&mut self, _frame: &FrequencySpectrum, _window: DetectionWindow) {}
}

/// A sink that traces the band peak of every frame.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl VisualizationSink for LogSink {
    fn render(&mut self, frame: &FrequencySpectrum, window: DetectionWindow) {
        if let Some(stats) = BandStats::measure(frame, window) {
            log::trace!(
                "[SPECTRUM] bins [{}, {}) peak {} @ {} avg {:.1}",
                window.min_index,
                window.max_index,
                stats.peak_amplitude,
                stats.peak_index,
                stats.average_amplitude
            );
        }
    }
}

/// Cloneable cancellation flag for a running session.
#[derive(Debug, Clone, Default)]
pub struct StopToken {
    stopped: Arc<AtomicBool>,
}

impl StopToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests the session to end. Idempotent.
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

/// How a session ended.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionOutcome {
    /// A thump was detected and scored.
    Completed(RipenessResult),
    /// The caller stopped the session before a thump arrived.
    Stopped,
    /// The frame source ran dry before a thump arrived.
    SourceEnded,
}

/// Runs one session against an already started frame source.
///
/// There is no timeout: without a qualifying thump the session listens
/// until it is stopped or the source ends. The detector is Idle on return.
///
/// # Arguments
/// * `detector` - Detector to drive; any active session on it is replaced
/// * `config` - Mass and sensitivity for this session
/// * `source` - Frame source, blocking between ticks
/// * `sink` - Visualisation sink, called once per frame
/// * `stop` - Cancellation flag, checked before every evaluation
pub fn listen<F, V>(
    detector: &mut ThumpDetector,
    config: SessionConfig,
    source: &mut F,
    sink: &mut V,
    stop: &StopToken,
) -> Result<SessionOutcome, ThumpError>
where
    F: FrameSource + ?Sized,
    V: VisualizationSink + ?Sized,
{
    detector.start(config, source.format())?;
    let window = match detector.session() {
        Some(session) => session.window,
        None => return Err(ThumpError::validation("detector did not enter a session")),
    };

    loop {
        if stop.is_stopped() {
            detector.stop();
            return Ok(SessionOutcome::Stopped);
        }

        let Some(frame) = source.next_frame() else {
            info!("Frame source ended before a thump was heard");
            detector.stop();
            return Ok(SessionOutcome::SourceEnded);
        };

        let rendered = panic::catch_unwind(AssertUnwindSafe(|| sink.render(&frame, window)));
        if rendered.is_err() {
            warn!("Visualization sink panicked; frame ignored for drawing");
        }

        if stop.is_stopped() {
            detector.stop();
            return Ok(SessionOutcome::Stopped);
        }

        if detector.evaluate(&frame).is_some() {
            let result = detector.conclude()?;
            return Ok(SessionOutcome::Completed(result));
        }
    }
}

/// Validates the session, starts capture, listens, and always releases capture.
///
/// Validation happens before any hardware is touched, so a bad mass never
/// opens the microphone.
pub fn run_session<C, V>(
    capture: &mut C,
    capture_config: &CaptureConfig,
    config: SessionConfig,
    detector: &mut ThumpDetector,
    sink: &mut V,
    stop: &StopToken,
) -> Result<SessionOutcome, ThumpError>
where
    C: CaptureService,
    V: VisualizationSink + ?Sized,
{
    detector.stop();
    config.validate()?;
    capture_config.validate()?;

    let mut source = capture.start(capture_config)?;
    let outcome = listen(detector, config, &mut source, sink, stop);
    source.stop();
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::DetectorState;
    use std::collections::VecDeque;

    struct Scripted {
        frames: VecDeque<FrequencySpectrum>,
        served: usize,
    }

    impl Scripted {
        fn new(frames: Vec<FrequencySpectrum>) -> Self {
            Self { frames: frames.into(), served: 0 }
        }
    }

    impl FrameSource for Scripted {
        fn format(&self) -> SpectrumFormat {
            SpectrumFormat::new(44100.0, 16384)
        }

        fn next_frame(&mut self) -> Option<FrequencySpectrum> {
            let frame = self.frames.pop_front()?;
            self.served += 1;
            Some(frame)
        }
    }

    fn flat(level: u8) -> FrequencySpectrum {
        FrequencySpectrum::new(vec![level; 8192])
    }

    fn thump_at(bin: usize) -> FrequencySpectrum {
        let mut bins = vec![5; 8192];
        bins[bin] = 220;
        FrequencySpectrum::new(bins)
    }

    #[test]
    fn completes_on_first_thump() {
        let mut source = Scripted::new(vec![flat(0), flat(200), thump_at(60), thump_at(90)]);
        let mut detector = ThumpDetector::new();

        let outcome = listen(
            &mut detector,
            SessionConfig::default(),
            &mut source,
            &mut NullSink,
            &StopToken::new(),
        )
        .unwrap();

        match outcome {
            SessionOutcome::Completed(result) => {
                assert_eq!(result.base_frequency_hz, 60.0 * source.format().bin_width());
            }
            other => panic!("unexpected outcome {other:?}"),
        }
        assert_eq!(source.served, 3);
        assert_eq!(detector.state(), DetectorState::Idle);
    }

    #[test]
    fn source_ending_leaves_detector_idle() {
        let mut source = Scripted::new(vec![flat(0), flat(0)]);
        let mut detector = ThumpDetector::new();
        let outcome = listen(
            &mut detector,
            SessionConfig::default(),
            &mut source,
            &mut NullSink,
            &StopToken::new(),
        )
        .unwrap();
        assert_eq!(outcome, SessionOutcome::SourceEnded);
        assert_eq!(detector.state(), DetectorState::Idle);
        assert!(detector.last_result().is_none());
    }

    #[test]
    fn pre_stopped_token_reads_no_frames() {
        let mut source = Scripted::new(vec![thump_at(60)]);
        let mut detector = ThumpDetector::new();
        let stop = StopToken::new();
        stop.stop();
        let outcome = listen(&mut detector, SessionConfig::default(), &mut source, &mut NullSink, &stop)
            .unwrap();
        assert_eq!(outcome, SessionOutcome::Stopped);
        assert_eq!(source.served, 0);
    }

    #[test]
    fn invalid_mass_is_rejected_before_reading() {
        let mut source = Scripted::new(vec![thump_at(60)]);
        let mut detector = ThumpDetector::new();
        let err = listen(
            &mut detector,
            SessionConfig::new(0.0, 8.0),
            &mut source,
            &mut NullSink,
            &StopToken::new(),
        )
        .unwrap_err();
        assert!(matches!(err, ThumpError::Validation(_)));
        assert_eq!(source.served, 0);
        assert_eq!(detector.state(), DetectorState::Idle);
    }

    struct PanickingSink;

    impl VisualizationSink for PanickingSink {
        fn render(&mut self, _frame: &FrequencySpectrum, _window: DetectionWindow) {
            panic!("display went away");
        }
    }

    #[test]
    fn sink_panic_does_not_affect_detection() {
        let mut source = Scripted::new(vec![flat(0), thump_at(60)]);
        let mut detector = ThumpDetector::new();
        let outcome = listen(
            &mut detector,
            SessionConfig::default(),
            &mut source,
            &mut PanickingSink,
            &StopToken::new(),
        )
        .unwrap();
        assert!(matches!(outcome, SessionOutcome::Completed(_)));
    }

    #[test]
    fn stop_token_is_shared_between_clones() {
        let token = StopToken::new();
        let clone = token.clone();
        assert!(!token.is_stopped());
        clone.stop();
        clone.stop();
        assert!(token.is_stopped());
    }
}
