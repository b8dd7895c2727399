//! Engine error types

use thiserror::Error;

/// Everything that can go wrong while planning or running an encode.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodeError {
    /// The quality selection named an unknown tier or was empty.
    #[error("invalid quality selection: {0}")]
    InvalidSelection(String),

    /// A hardware backend was requested by name but cannot be used.
    #[error("unsupported backend: {0}")]
    UnsupportedBackend(String),

    /// No hardware backend passed the availability probe.
    #[error("no hardware encoder backend is available")]
    NoBackendAvailable,

    /// The encoder process could not be spawned at all.
    #[error("failed to launch encoder: {0}")]
    EncoderLaunch(String),

    /// The encoder ran but exited with a non-zero status. The stderr tail is
    /// kept for diagnostics but left out of the display form.
    #[error("encoder exited with status {code:?}")]
    EncoderExit { code: Option<i32>, stderr: String },

    /// The encoder exited cleanly but the staged output is missing or empty.
    #[error("encoder produced no output: {0}")]
    EncoderOutputMissing(String),

    /// The per-job watchdog expired and the encoder was killed.
    #[error("encoder exceeded the {0}s watchdog and was killed")]
    EncoderTimeout(u64),

    /// The run was cancelled before this job finished.
    #[error("cancelled")]
    Cancelled,
}

impl EncodeError {
    /// Short stable label for structured log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidSelection(_) => "invalid_selection",
            Self::UnsupportedBackend(_) => "unsupported_backend",
            Self::NoBackendAvailable => "no_backend",
            Self::EncoderLaunch(_) => "launch",
            Self::EncoderExit { .. } => "exit",
            Self::EncoderOutputMissing(_) => "output_missing",
            Self::EncoderTimeout(_) => "timeout",
            Self::Cancelled => "cancelled",
        }
    }
}
