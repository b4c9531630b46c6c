//! Error types for threat-ai

use thiserror::Error;

/// The main error type for client operations
#[derive(Error, Debug)]
pub enum Error {
    /// The request never reached the service or the body could not be read
    #[error("Network error: {0}")]
    Transport(String),

    /// The service answered with a non-2xx status
    #[error("{message}")]
    Api { status: u16, message: String },

    /// A response body did not match the expected shape
    #[error("Unexpected response: {0}")]
    Decode(String),

    /// Local precondition failures, raised before any request is made
    #[error("{0}")]
    Validation(String),

    /// A chat message is already waiting for its reply
    #[error("A message is already being sent")]
    SendPending,

    /// Export or feedback referenced a message the registry never saw
    #[error("Message not found: {0}")]
    UnknownMessage(String),

    /// Export or feedback requested before any query result exists
    #[error("No result available yet")]
    NoResult,

    /// I/O errors (downloads, transcript saves)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// True for failures detected locally, which never touch the network
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            Error::Validation(_) | Error::SendPending | Error::UnknownMessage(_) | Error::NoResult
        )
    }
}

/// A specialized Result type for client operations
pub type Result<T> = std::result::Result<T, Error>;

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            Error::Decode(e.to_string())
        } else {
            Error::Transport(e.to_string())
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Decode(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_errors_display_the_service_message_verbatim() {
        let err = Error::Api {
            status: 500,
            message: "LLM timeout".to_string(),
        };
        assert_eq!(err.to_string(), "LLM timeout");
        assert!(!err.is_local());
    }

    #[test]
    fn local_errors_are_flagged() {
        assert!(Error::SendPending.is_local());
        assert!(Error::UnknownMessage("x".into()).is_local());
        assert!(Error::Validation("empty".into()).is_local());
        assert!(!Error::Transport("refused".into()).is_local());
    }
}
