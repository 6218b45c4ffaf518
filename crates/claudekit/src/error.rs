//! Error types.
//!
//! [`ApiError`] is what a [`CompletionProvider`](crate::api::CompletionProvider)
//! returns for a single failed request; it implements
//! [`Classify`] so the retry executor knows which failures are transient.
//! [`Error`] is the crate-level error returned by [`Client`](crate::api::Client),
//! [`ToolRunner::register`](crate::tools::ToolRunner::register) and config
//! loading. Tool failures have their own type,
//! [`ToolError`](crate::tools::ToolError), because they never escape the
//! dispatcher.

use serde::Deserialize;

use crate::api::retry::{Classify, FailureKind, RetryError};

/// Failure of a single completion request.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ApiError {
    /// HTTP 429.
    #[error("rate limited (HTTP {status}): {message}")]
    RateLimited { status: u16, message: String },
    /// HTTP 5xx, including 529 (overloaded).
    #[error("server error (HTTP {status}): {message}")]
    Server { status: u16, message: String },
    /// No response: DNS, connection reset, timeout.
    #[error("connection error: {0}")]
    Connection(String),
    /// Any other non-success status. The request must change before it can succeed.
    #[error("request rejected (HTTP {status}): {message}")]
    Client { status: u16, message: String },
    /// The response body could not be decoded.
    #[error("failed to decode response: {0}")]
    Decode(String),
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(rename = "type", default)]
    kind: String,
    message: String,
}

impl ApiError {
    /// Map a non-success HTTP status and its body to an error.
    ///
    /// The message is taken from the API's `{"error": {"type", "message"}}`
    /// envelope when present, otherwise the raw body is used.
    pub fn from_status(status: u16, body: &str) -> Self {
        let message = match serde_json::from_str::<ErrorEnvelope>(body) {
            Ok(env) if env.error.kind.is_empty() => env.error.message,
            Ok(env) => format!("{}: {}", env.error.kind, env.error.message),
            Err(_) => body.trim().to_string(),
        };
        match status {
            429 => ApiError::RateLimited { status, message },
            500..=599 => ApiError::Server { status, message },
            _ => ApiError::Client { status, message },
        }
    }

    /// HTTP status, when the failure came with one.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::RateLimited { status, .. }
            | ApiError::Server { status, .. }
            | ApiError::Client { status, .. } => Some(*status),
            ApiError::Connection(_) | ApiError::Decode(_) => None,
        }
    }
}

impl Classify for ApiError {
    fn failure_kind(&self) -> FailureKind {
        match self {
            ApiError::RateLimited { .. } => FailureKind::RateLimited,
            ApiError::Server { .. } => FailureKind::ServerError,
            ApiError::Connection(_) => FailureKind::Connection,
            ApiError::Client { .. } => FailureKind::Client,
            ApiError::Decode(_) => FailureKind::Other,
        }
    }
}

/// Crate-level error.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A function without a tool declaration was used where a tool is required.
    #[error("`{name}` is not declared as a tool; wrap it with tool().declare(..)")]
    NotATool { name: String },

    #[error("configuration error: {0}")]
    Config(String),

    /// A request failed with a non-retryable error.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// Every attempt failed with a retryable error.
    #[error("request failed after {attempts} attempts: {last_error}")]
    RetryExhausted {
        attempts: u32,
        #[source]
        last_error: ApiError,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<RetryError<ApiError>> for Error {
    fn from(err: RetryError<ApiError>) -> Self {
        match err {
            RetryError::Exhausted {
                attempts,
                last_error,
            } => Error::RetryExhausted {
                attempts,
                last_error,
            },
            RetryError::Fatal(e) => Error::Api(e),
        }
    }
}

/// Result alias for crate-level operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;
