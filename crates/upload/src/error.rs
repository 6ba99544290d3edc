//! Upload error types.

use resumable_protocol::{ApiError, ProtocolError, StateError};
use resumable_transfer::{PipeError, TransferError};

/// The connection failed or the service answered with an unexpected status.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{}", describe(.status, .message))]
pub struct TransportError {
    /// HTTP status, when the failure was an unexpected reply.
    pub status: Option<u16>,
    pub message: String,
}

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            status: None,
            message: message.into(),
        }
    }

    pub fn with_status(status: u16, message: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            message: message.into(),
        }
    }

    /// Returns `true` if the same request may succeed later.
    ///
    /// Connection failures, 5xx, 308, 408 and 429 qualify. Any other 4xx
    /// (an expired or unknown session answers 404 or 410) will not change
    /// on a retry.
    pub fn is_transient(&self) -> bool {
        match self.status {
            None => true,
            Some(408 | 429) => true,
            Some(status) => !(400..500).contains(&status),
        }
    }
}

fn describe(status: &Option<u16>, message: &str) -> String {
    match status {
        Some(status) => format!("HTTP {status}: {message}"),
        None => message.to_string(),
    }
}

/// Errors produced by an upload session.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("credentials rejected: {0}")]
    Auth(String),

    #[error("resource metadata rejected: {0}")]
    Metadata(ApiError),

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("retry budget exhausted after {attempts} resume attempts, last error: {last_error}")]
    RetryExhausted { attempts: u32, last_error: String },

    #[error("source error: {0}")]
    Source(#[from] TransferError),

    #[error("invalid state record: {0}")]
    State(#[from] StateError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("cancelled")]
    Cancelled,
}

impl UploadError {
    /// Returns `true` if repeating the request may succeed.
    ///
    /// Only transport failures qualify, and only those
    /// [`TransportError::is_transient`] accepts.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transport(e) if e.is_transient())
    }

    /// HTTP status behind the error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Transport(e) => e.status,
            Self::Metadata(e) => Some(e.code),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        Self {
            status: e.status().map(|s| s.as_u16()),
            message: e.to_string(),
        }
    }
}

impl From<reqwest::Error> for UploadError {
    fn from(e: reqwest::Error) -> Self {
        Self::Transport(e.into())
    }
}

impl From<PipeError> for UploadError {
    fn from(e: PipeError) -> Self {
        match e {
            PipeError::Source(io) => Self::Source(TransferError::Io(io)),
            PipeError::ShortSource { expected, read } => {
                Self::Source(TransferError::Io(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    format!("source ended after {read} of {expected} bytes"),
                )))
            }
            PipeError::SinkClosed(_) => {
                Self::Transport(TransportError::new("request body closed by transport"))
            }
        }
    }
}
