//! Error types for the preferences client.

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the client service and the sync coordinator.
///
/// Variants carry text rather than source errors so the coordinator can keep
/// a copy in its state and still hand one back to the caller.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// No bearer token in session storage
    #[error("No authentication token found")]
    MissingToken,

    /// Session storage could not be read or written
    #[error("Session storage error: {0}")]
    Session(String),

    /// Server answered with a non-success status
    #[error("HTTP {status}: {status_text}")]
    Http { status: u16, status_text: String },

    /// Request never produced a response
    #[error("Transport error: {0}")]
    Transport(String),

    /// Payload could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            Error::Serialization(e.to_string())
        } else {
            Error::Transport(e.to_string())
        }
    }
}
