//! Error types for spotsrc
//!
//! Defines module-specific error types using thiserror for clear error
//! propagation. Synchronous configuration and session errors surface here;
//! asynchronous backend errors (connection loss, streaming failures) are
//! recorded on the session context instead and inspected by the caller.

use crate::backend::BackendError;
use thiserror::Error;

/// Main error type for spotsrc
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration loading or validation errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// URI scheme or location errors
    #[error("Invalid URI: {0}")]
    InvalidUri(String),

    /// Application key material missing or malformed
    #[error("Credential error: {0}")]
    Credentials(String),

    /// Backend session creation errors
    #[error("Session create error: {0}")]
    SessionCreate(String),

    /// Login rejected or failed
    #[error("Login error: {0}")]
    Login(String),

    /// URI did not resolve to a playable track
    #[error("Track resolution error: {0}")]
    TrackResolution(String),

    /// Backend rejected load or play
    #[error("Playback start error: {0}")]
    PlaybackStart(String),

    /// Backend rejected a seek request
    #[error("Seek error: {0}")]
    Seek(String),

    /// Operation invalid in the current lifecycle state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Raw backend error code
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience Result type using spotsrc Error
pub type Result<T> = std::result::Result<T, Error>;
