//! # Melon Listen
//!
//! Headless front-end for the thump analyser. Opens the default microphone,
//! waits for one tap on the fruit, then prints the ripeness result.
//!
//! Settings come from `melon.json` in the working directory when present;
//! every field is optional and falls back to its default. `RUST_LOG`
//! controls log verbosity (`trace` also logs every frame's band peak).

use anyhow::{Context, Result};
use log::{error, info};

use melon_core::audio::CpalCapture;
use melon_core::session::{self, LogSink, SessionOutcome, StopToken};
use melon_core::{AppConfig, RipenessResult, ThumpDetector, ThumpError};

const CONFIG_PATH: &str = "melon.json";

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    info!("Starting up...");
    let config = AppConfig::load_or_default(CONFIG_PATH)
        .with_context(|| format!("failed to load {CONFIG_PATH}"))?;

    let mut capture = CpalCapture::new();
    let mut detector = ThumpDetector::new();
    let stop = StopToken::new();

    println!(
        "Listening... tap the melon ({} kg, sensitivity {}).",
        config.session.mass_kg, config.session.sensitivity
    );

    let outcome = session::run_session(
        &mut capture,
        &config.capture,
        config.session,
        &mut detector,
        &mut LogSink,
        &stop,
    );

    match outcome {
        Ok(SessionOutcome::Completed(result)) => {
            print_result(&result)?;
            Ok(())
        }
        Ok(SessionOutcome::Stopped) => {
            println!("Stopped before a tap was heard.");
            Ok(())
        }
        Ok(SessionOutcome::SourceEnded) => {
            println!("The microphone stopped before a tap was heard.");
            Ok(())
        }
        Err(e) => {
            error!("Session failed: {e}");
            eprintln!("{}", user_message(&e));
            Err(e.into())
        }
    }
}

fn print_result(result: &RipenessResult) -> Result<()> {
    println!("Tap frequency : {:.1} Hz", result.base_frequency_hz);
    println!("Verdict       : {}", result.verdict);
    println!("Score         : {:.0} / 100", result.ripeness_score);
    println!("Sweetness     : {:.1} °Brix", result.sweetness_brix);
    println!("{}", serde_json::to_string_pretty(result)?);
    Ok(())
}

fn user_message(error: &ThumpError) -> &'static str {
    match error {
        ThumpError::UnsupportedEnvironment(_) => "No microphone was found on this machine.",
        ThumpError::PermissionDenied(_) => {
            "Microphone access was denied. Allow access and try again."
        }
        ThumpError::CaptureFailure(_) => "The microphone could not be started.",
        ThumpError::Validation(_) => "Check the mass in melon.json: it must be greater than 0 kg.",
        ThumpError::Config(_) => "melon.json could not be read.",
    }
}
