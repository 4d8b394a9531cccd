use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Upper bound on any backend-provided text that reaches a caller.
pub const MAX_ERROR_MESSAGE_CHARS: usize = 240;

/// Cuts `message` to at most [`MAX_ERROR_MESSAGE_CHARS`] characters, respecting
/// char boundaries, and marks the cut with an ellipsis.
pub(crate) fn bounded(message: &str) -> String {
    let message = message.trim();
    match message.char_indices().nth(MAX_ERROR_MESSAGE_CHARS) {
        Some((cut, _)) => format!("{}…", &message[..cut]),
        None => message.to_string(),
    }
}

/// Input rejected before any analysis work is performed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("input is not valid UTF-8 (invalid byte sequence at offset {offset})")]
    InvalidUtf8 { offset: usize },

    #[error("document is empty or contains only whitespace")]
    Empty,
}

/// The inference stage an [`InferenceError`] originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Classification,
    Summarization,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Classification => f.write_str("classification"),
            Stage::Summarization => f.write_str("summarization"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InferenceErrorKind {
    /// The backend itself raised (tensor op failure, tokenizer error, oversized input).
    Backend,
    /// The backend returned something that violates its contract.
    MalformedOutput,
}

/// A classification or summarization failure. Never retried within a request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{stage} failed: {message}")]
pub struct InferenceError {
    stage: Stage,
    kind: InferenceErrorKind,
    message: String,
}

impl InferenceError {
    /// Wraps a backend failure. Only the outermost error text is kept; the
    /// cause chain stays in the logs.
    pub fn backend(stage: Stage, err: &anyhow::Error) -> Self {
        Self {
            stage,
            kind: InferenceErrorKind::Backend,
            message: bounded(&err.to_string()),
        }
    }

    pub fn malformed(stage: Stage, message: impl AsRef<str>) -> Self {
        Self {
            stage,
            kind: InferenceErrorKind::MalformedOutput,
            message: bounded(message.as_ref()),
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn kind(&self) -> InferenceErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Report artifact assembly or persistence failed; no artifact path exists.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("failed to create output directory {path:?}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to lay out report: {0}")]
    Format(String),

    #[error("failed to write report artifact in {dir:?}: {source}")]
    Write {
        dir: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Mail delivery cannot be attempted with the current configuration.
/// Permanent: retrying without changing configuration will fail the same way.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeliveryConfigError {
    #[error("SMTP credentials (username or password) are not configured")]
    MissingCredentials,

    #[error("sender address {0:?} is not a valid mailbox")]
    InvalidSender(String),

    #[error("SMTP host {host:?} cannot be used: {reason}")]
    InvalidHost { host: String, reason: String },
}

/// Mail delivery was attempted (or prepared) and failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeliveryTransportError {
    #[error("SMTP authentication failed: {0}")]
    Authentication(String),

    #[error("SMTP transport failure: {0}")]
    Transport(String),

    #[error("message could not be assembled: {0}")]
    Message(String),

    #[error("report attachment could not be read: {0}")]
    Attachment(String),
}

impl DeliveryTransportError {
    /// Network-level failures may succeed on a later attempt; bad credentials
    /// or a malformed message will not.
    pub fn is_retryable(&self) -> bool {
        matches!(self, DeliveryTransportError::Transport(_))
    }
}

/// Failure of a whole analysis request. Delivery problems are not part of
/// this type: they never invalidate a produced report.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Inference(#[from] InferenceError),

    #[error(transparent)]
    Render(#[from] RenderError),
}

impl PipelineError {
    /// Sanitized text suitable for the request boundary.
    pub fn user_message(&self) -> String {
        match self {
            PipelineError::Decode(DecodeError::InvalidUtf8 { .. }) => {
                "Failed to decode file. Please ensure it's a plain text (UTF-8) file.".to_string()
            }
            PipelineError::Decode(DecodeError::Empty) => {
                "The uploaded document contains no text to analyze.".to_string()
            }
            PipelineError::Inference(err) => {
                format!("Document analysis failed during {}: {}", err.stage(), err.message())
            }
            // Paths and OS error details stay in the server log.
            PipelineError::Render(_) => "The report could not be generated.".to_string(),
        }
    }
}
