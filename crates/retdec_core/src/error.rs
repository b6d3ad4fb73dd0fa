use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Boxed error used for transport failures and consumer callbacks.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// The structured error body returned by the service on **HTTP 400** and **HTTP 422**.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceError {
    /// The HTTP code as reported inside the body.
    #[serde(default)]
    pub code: Option<u16>,
    /// Short, human readable message.
    #[serde(default)]
    pub message: String,
    /// Longer explanation, if the service provides one.
    #[serde(default)]
    pub description: Option<String>,
}

impl std::fmt::Display for ServiceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)?;
        if let Some(description) = &self.description {
            write!(f, " ({description})")?;
        }
        Ok(())
    }
}

#[derive(Error, Debug)]
pub enum DecompilationError {
    /// The service refused the request.
    /// Raised on **HTTP 400 Bad Request** and **HTTP 422 Unprocessable Entity**.
    #[error("API error: HTTP {status} - {error}")]
    Rejected { status: u16, error: ServiceError },

    /// Network failure, connection reset, TLS failure, ...
    #[error("Network error: {0}")]
    Transport(#[source] BoxError),

    /// The service answered with a status the call does not expect.
    #[error("Unhandled HTTP status {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },

    /// The response body could not be mapped onto the expected shape.
    #[error("Binding error: {reason}")]
    Binding { reason: String, body: String },

    /// A link advertised by the service could not be resolved.
    #[error("Invalid link: {0}")]
    InvalidLink(String),

    /// Reading the input artifact failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The job was cancelled while waiting or transferring.
    #[error("Decompilation cancelled")]
    Cancelled,

    /// An error raised by the caller's own [`ResultConsumer`](crate::traits::ResultConsumer).
    #[error("Consumer error: {0}")]
    Consumer(#[source] BoxError),

    /// The background task panicked.
    #[error("Decompilation task panicked: {0}")]
    Panicked(String),
}

impl DecompilationError {
    pub fn transport(err: impl Into<BoxError>) -> Self {
        Self::Transport(err.into())
    }

    pub fn binding(reason: impl Into<String>, body: impl Into<String>) -> Self {
        Self::Binding {
            reason: reason.into(),
            body: body.into(),
        }
    }

    /// The HTTP status attached to the error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Rejected { status, .. } | Self::UnexpectedStatus { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// A string that is not the wire token of any variant.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown {kind} '{token}', expected one of: {expected}")]
pub struct UnknownToken {
    pub kind: &'static str,
    pub token: String,
    pub expected: String,
}
