//! Error types for the proctored session controller.

/// Top-level error type for the proctoring client.
#[derive(Debug, thiserror::Error)]
pub enum ProctorError {
    /// Configuration load/parse/save error.
    #[error("config error: {0}")]
    Config(String),

    /// Session channel (socket) error.
    #[error("channel error: {0}")]
    Channel(String),

    /// Malformed or unexpected wire message.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// A platform capability (camera, speech, secure mode) is unavailable or failed.
    #[error("capability error: {0}")]
    Capability(String),

    /// Session-start / session-end collaborator call failed.
    #[error("backend error: {0}")]
    Backend(String),

    /// Session lifecycle misuse (e.g. starting twice).
    #[error("session error: {0}")]
    Session(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, ProctorError>;
