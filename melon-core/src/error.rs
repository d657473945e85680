//! Error type shared by every fallible operation in the crate.
//!
//! All variants are terminal for the attempt that raised them: nothing in
//! the core retries, a caller has to start a new session.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ThumpError {
    /// No capture capability on this machine (no host, no input device).
    #[error("audio capture is not supported here: {0}")]
    UnsupportedEnvironment(String),

    /// The input device refused to open, usually because microphone access was denied.
    #[error("microphone access denied: {0}")]
    PermissionDenied(String),

    /// The capture stream could not be built, started or kept running.
    #[error("audio capture failed: {0}")]
    CaptureFailure(String),

    /// Caller supplied input the session cannot run with.
    #[error("invalid input: {0}")]
    Validation(String),

    /// A configuration file could not be read or parsed.
    #[error("configuration error: {0}")]
    Config(String),
}

impl ThumpError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}
