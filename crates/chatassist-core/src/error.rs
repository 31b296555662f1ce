//! Error taxonomy for the conversation core

use thiserror::Error;

/// Every failure the core can report to a caller.
///
/// None of these are fatal. Each one has a defined recovery: the controller
/// rejects the operation and leaves the session untouched, or (for
/// `RequestFailed`) turns the failure into a fixed assistant reply.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChatError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("completion request failed: {0}")]
    RequestFailed(String),
    #[error("a reply is still pending, wait for it before starting another turn")]
    Busy,
}

/// Payload-free classification of a [`ChatError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidArgument,
    NotFound,
    RequestFailed,
    Busy,
}

impl ChatError {
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn request_failed(message: impl Into<String>) -> Self {
        Self::RequestFailed(message.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ChatError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            ChatError::NotFound(_) => ErrorKind::NotFound,
            ChatError::RequestFailed(_) => ErrorKind::RequestFailed,
            ChatError::Busy => ErrorKind::Busy,
        }
    }
}

impl From<reqwest::Error> for ChatError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ChatError::request_failed(format!("request timed out: {}", err))
        } else {
            ChatError::request_failed(err.to_string())
        }
    }
}
