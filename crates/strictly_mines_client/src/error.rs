//! Client error types.
//!
//! [`ActionError`] is what callers of the action API see. [`TransportError`]
//! and [`ConfigError`] carry the location they were raised at, like the
//! rest of the workspace's infrastructure errors.

use derive_more::{Display, Error};
use tracing::instrument;

/// Failure of a request-style action (create, join, move, flag, ready).
///
/// Rejections are reported here and nowhere else. A failed action never
/// touches the held snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Display)]
pub enum ActionError {
    /// The server considered the request malformed (400).
    #[display("Bad request: {message}")]
    BadRequest {
        /// Server-provided reason, or the status text.
        message: String,
    },

    /// The server refused the action under the current rules (403).
    #[display("Action rejected: {message}")]
    Rejected {
        /// Server-provided reason, or the status text.
        message: String,
    },

    /// The game or player does not exist (404).
    #[display("Not found: {message}")]
    NotFound {
        /// Server-provided reason, or the status text.
        message: String,
    },

    /// Any other non-success status.
    #[display("Server error ({status}): {message}")]
    Server {
        /// HTTP status code.
        status: u16,
        /// Server-provided reason, or the status text.
        message: String,
    },

    /// The request never produced a response.
    #[display("Request failed: {message}")]
    Transport {
        /// Underlying client error text.
        message: String,
    },

    /// A success response carried a body that does not decode.
    #[display("Could not decode response: {message}")]
    Decode {
        /// Decoder error text.
        message: String,
    },
}

impl ActionError {
    /// Maps a non-success HTTP status and its body to an error.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            400 => Self::BadRequest { message },
            403 => Self::Rejected { message },
            404 => Self::NotFound { message },
            _ => Self::Server { status, message },
        }
    }

    /// Reclassifies the server's answer to a refused flag toggle.
    ///
    /// The server reports every refused toggle (wrong phase, revealed cell,
    /// someone else's flag) as 404, so on that route `NotFound` means
    /// `Rejected`.
    pub fn for_flag_toggle(self) -> Self {
        match self {
            Self::NotFound { message } => Self::Rejected { message },
            other => other,
        }
    }

    /// Returns true if the server refused the action under its rules.
    ///
    /// Retrying the same request cannot succeed without a state change.
    pub fn is_rule_rejection(&self) -> bool {
        matches!(self, Self::Rejected { .. } | Self::BadRequest { .. })
    }

    /// Returns true for failures that may succeed if simply retried.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport { .. } => true,
            Self::Server { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

impl std::error::Error for ActionError {}

impl From<reqwest::Error> for ActionError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Decode {
                message: err.to_string(),
            }
        } else {
            Self::Transport {
                message: err.to_string(),
            }
        }
    }
}

/// Push-transport error with location tracking.
#[derive(Debug, Clone, Display, Error)]
#[display("Transport error: {} at {}:{}", message, file, line)]
pub struct TransportError {
    /// Error message.
    pub message: String,
    /// Line number where error occurred.
    pub line: u32,
    /// Source file where error occurred.
    pub file: &'static str,
}

impl TransportError {
    /// Creates a new transport error with caller location tracking.
    #[track_caller]
    #[instrument(skip(message))]
    pub fn new(message: impl Into<String>) -> Self {
        let loc = std::panic::Location::caller();
        Self {
            message: message.into(),
            line: loc.line(),
            file: loc.file(),
        }
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for TransportError {
    #[track_caller]
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::new(format!("WebSocket error: {}", err))
    }
}

/// Configuration error with location tracking.
#[derive(Debug, Clone, Display, Error)]
#[display("Config error: {} at {}:{}", message, file, line)]
pub struct ConfigError {
    /// Error message.
    pub message: String,
    /// Line number where error occurred.
    pub line: u32,
    /// Source file where error occurred.
    pub file: &'static str,
}

impl ConfigError {
    /// Creates a new configuration error.
    #[track_caller]
    #[instrument(skip(message))]
    pub fn new(message: impl Into<String>) -> Self {
        let loc = std::panic::Location::caller();
        Self {
            message: message.into(),
            line: loc.line(),
            file: loc.file(),
        }
    }
}
