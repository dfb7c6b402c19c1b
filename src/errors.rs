use thiserror::Error;

/// Errors raised by the capture-to-container pipeline.
///
/// Every variant is `Clone` so a session can cache its teardown outcome and
/// hand it back from repeated `stop` calls.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecorderError {
    /// Codec, conversion context or output file could not be acquired at start.
    #[error("Resource acquisition error: {0}")]
    ResourceError(String),
    /// The video codec rejected a frame mid-session.
    #[error("Encoding error: {0}")]
    EncodingError(String),
    /// Audio source or audio codec failure. Never fatal to the session.
    #[error("Audio error: {0}")]
    AudioError(String),
    /// The container rejected a packet or could not be finalized.
    #[error("Muxing error: {0}")]
    MuxingError(String),
    /// Lifecycle misuse, e.g. starting while a session is still running.
    #[error("Invalid recorder state: {0}")]
    InvalidState(String),
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl RecorderError {
    /// Fatal errors end the session; audio errors only degrade it.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, RecorderError::AudioError(_))
    }
}
